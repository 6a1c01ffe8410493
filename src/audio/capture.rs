//! Microphone streaming through cpal
//!
//! The cpal callback pushes timestamped PCM into a bounded channel and never
//! blocks; when the writer falls behind, new audio is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Stream, StreamConfig};

use super::device::find_input_device;
use crate::capture::backend::AudioSource;
use crate::errors::DiaryError;
use crate::types::{AudioFormat, AudioFrame, MicrophoneInfo};

/// Callback buffers held before audio is dropped, several seconds' worth
const MAX_BUFFERED_FRAMES: usize = 256;

/// An open microphone stream
///
/// cpal streams cannot leave the thread that built them; open, drain and
/// drop a `MicrophoneCapture` on one thread.
pub struct MicrophoneCapture {
    stream: Stream,
    receiver: crossbeam_channel::Receiver<AudioFrame>,
    running: Arc<AtomicBool>,
    format: AudioFormat,
}

impl MicrophoneCapture {
    /// Build a paused stream of `format` on `microphone`
    pub fn open(microphone: &MicrophoneInfo, format: AudioFormat) -> Result<Self, DiaryError> {
        let device = find_input_device(microphone)?;
        let config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (sender, receiver) = crossbeam_channel::bounded(MAX_BUFFERED_FRAMES);
        let running = Arc::new(AtomicBool::new(false));
        let callback_running = running.clone();
        let started = Instant::now();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if !callback_running.load(Ordering::Relaxed) {
                        return;
                    }
                    let frame = AudioFrame {
                        samples: data.to_vec(),
                        sample_rate: format.sample_rate,
                        channels: format.channels,
                        timestamp: started.elapsed().as_secs_f64(),
                    };
                    if sender.try_send(frame).is_err() {
                        log::trace!("Audio buffer full, dropping samples");
                    }
                },
                |err| log::error!("Microphone stream error: {}", err),
                None,
            )
            .map_err(|e| {
                DiaryError::DeviceUnavailable(format!(
                    "Failed to open '{}' at {:?}: {}",
                    microphone.name, format, e
                ))
            })?;

        Ok(Self {
            stream,
            receiver,
            running,
            format,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl AudioSource for MicrophoneCapture {
    fn start(&mut self) -> Result<(), DiaryError> {
        if self.is_running() {
            return Ok(());
        }
        self.stream
            .play()
            .map_err(|e| DiaryError::CaptureError(format!("Failed to start microphone: {}", e)))?;
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn drain(&mut self) -> Vec<AudioFrame> {
        self.receiver.try_iter().collect()
    }

    fn stop(&mut self) -> Result<(), DiaryError> {
        if !self.is_running() {
            return Ok(());
        }
        self.running.store(false, Ordering::Relaxed);
        self.stream
            .pause()
            .map_err(|e| DiaryError::CaptureError(format!("Failed to stop microphone: {}", e)))
    }

    fn format(&self) -> AudioFormat {
        self.format
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::debug!("Microphone did not stop cleanly: {}", e);
        }
    }
}
