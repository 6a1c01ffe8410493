//! Hardware-free capture backend
//!
//! `SyntheticBackend` stands in for the camera, the microphone and the MP4
//! writer. The sink dumps raw RGB bytes and counts audio, and shared counters
//! let tests assert how many write sessions a flow opened.

use crate::capture::backend::{AudioSource, CaptureBackend, ClipSink, ClipStats, FrameSource};
use crate::errors::DiaryError;
use crate::poster::{PosterDecoder, PosterFrame};
use crate::testing::synthetic_data::{synthetic_audio_frame, synthetic_video_frame};
use crate::types::{AudioFormat, AudioFrame, CameraFormat, CameraFrame, MicrophoneInfo};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Samples per channel in one synthetic audio frame (20 ms at 48 kHz)
const AUDIO_FRAME_SAMPLES: usize = 960;

/// What a [`SyntheticBackend`] has been asked to do so far
#[derive(Debug, Default)]
pub struct BackendCounters {
    cameras_opened: AtomicUsize,
    sinks_created: AtomicUsize,
    sinks_finished: AtomicUsize,
    frames_written: AtomicUsize,
    microphones_opened: AtomicUsize,
    audio_frames_written: AtomicUsize,
    cameras_streaming: AtomicUsize,
    peak_cameras_streaming: AtomicUsize,
}

impl BackendCounters {
    pub fn cameras_opened(&self) -> usize {
        self.cameras_opened.load(Ordering::SeqCst)
    }

    pub fn sinks_created(&self) -> usize {
        self.sinks_created.load(Ordering::SeqCst)
    }

    pub fn sinks_finished(&self) -> usize {
        self.sinks_finished.load(Ordering::SeqCst)
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written.load(Ordering::SeqCst)
    }

    pub fn microphones_opened(&self) -> usize {
        self.microphones_opened.load(Ordering::SeqCst)
    }

    pub fn audio_frames_written(&self) -> usize {
        self.audio_frames_written.load(Ordering::SeqCst)
    }

    /// Cameras whose stream is open right now
    pub fn cameras_streaming(&self) -> usize {
        self.cameras_streaming.load(Ordering::SeqCst)
    }

    /// Most cameras ever streaming at the same time
    pub fn peak_cameras_streaming(&self) -> usize {
        self.peak_cameras_streaming.load(Ordering::SeqCst)
    }

    fn stream_opened(&self) {
        let now = self.cameras_streaming.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_cameras_streaming.fetch_max(now, Ordering::SeqCst);
    }

    fn stream_closed(&self) {
        self.cameras_streaming.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    format: CameraFormat,
    camera_available: bool,
    microphone_available: bool,
    microphone_opens: bool,
    warmup: Duration,
    counters: Arc<BackendCounters>,
}

impl SyntheticBackend {
    /// Small frames at 30fps, camera and microphone present
    pub fn new() -> Self {
        Self {
            format: CameraFormat::new(64, 48, 30.0),
            camera_available: true,
            microphone_available: true,
            microphone_opens: true,
            warmup: Duration::ZERO,
            counters: Arc::new(BackendCounters::default()),
        }
    }

    pub fn with_format(mut self, format: CameraFormat) -> Self {
        self.format = format;
        self
    }

    /// Make `front_camera` fail, as if no camera were attached
    pub fn without_camera(mut self) -> Self {
        self.camera_available = false;
        self
    }

    pub fn without_microphone(mut self) -> Self {
        self.microphone_available = false;
        self
    }

    /// Make each camera take `warmup` to start streaming
    pub fn with_camera_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    /// Report a microphone that then refuses to stream
    pub fn with_silent_microphone(mut self) -> Self {
        self.microphone_opens = false;
        self
    }

    pub fn counters(&self) -> Arc<BackendCounters> {
        self.counters.clone()
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for SyntheticBackend {
    fn front_camera(&self) -> Result<Box<dyn FrameSource>, DiaryError> {
        if !self.camera_available {
            return Err(DiaryError::DeviceUnavailable(
                "no front camera attached".to_string(),
            ));
        }
        self.counters.cameras_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(
            SyntheticCamera::new(self.format.clone())
                .with_warmup(self.warmup)
                .with_counters(self.counters.clone()),
        ))
    }

    fn microphone(&self) -> Result<MicrophoneInfo, DiaryError> {
        if !self.microphone_available {
            return Err(DiaryError::DeviceUnavailable("no microphone".to_string()));
        }
        Ok(MicrophoneInfo {
            id: "synthetic_mic".to_string(),
            name: "Synthetic Microphone".to_string(),
            sample_rate: 48000,
            channels: 2,
        })
    }

    fn open_microphone(&self, microphone: &MicrophoneInfo) -> Result<Box<dyn AudioSource>, DiaryError> {
        if !self.microphone_opens {
            return Err(DiaryError::DeviceUnavailable(format!(
                "{} cannot be opened",
                microphone.name
            )));
        }
        self.counters.microphones_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticMicrophone::new()))
    }

    fn create_sink(
        &self,
        path: &Path,
        format: &CameraFormat,
        audio: Option<AudioFormat>,
    ) -> Result<Box<dyn ClipSink>, DiaryError> {
        let sink = RawClipSink::create(path, format, self.counters.clone())?.with_audio(audio);
        self.counters.sinks_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(sink))
    }
}

/// Camera that paces gradient frames at its configured rate
pub struct SyntheticCamera {
    format: CameraFormat,
    frame_number: u64,
    streaming: bool,
    warmup: Duration,
    counters: Option<Arc<BackendCounters>>,
}

impl SyntheticCamera {
    pub fn new(format: CameraFormat) -> Self {
        Self {
            format,
            frame_number: 0,
            streaming: false,
            warmup: Duration::ZERO,
            counters: None,
        }
    }

    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    /// Report stream opens and closes to `counters`
    pub fn with_counters(mut self, counters: Arc<BackendCounters>) -> Self {
        self.counters = Some(counters);
        self
    }
}

impl FrameSource for SyntheticCamera {
    fn start_stream(&mut self) -> Result<(), DiaryError> {
        if !self.streaming {
            std::thread::sleep(self.warmup);
            self.streaming = true;
            if let Some(counters) = &self.counters {
                counters.stream_opened();
            }
        }
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<CameraFrame, DiaryError> {
        if !self.streaming {
            return Err(DiaryError::CaptureError("stream not started".to_string()));
        }
        std::thread::sleep(Duration::from_secs_f32(1.0 / self.format.fps.max(1.0)));
        let frame = synthetic_video_frame(self.frame_number, self.format.width, self.format.height);
        self.frame_number += 1;
        Ok(frame)
    }

    fn stop_stream(&mut self) -> Result<(), DiaryError> {
        if self.streaming {
            self.streaming = false;
            if let Some(counters) = &self.counters {
                counters.stream_closed();
            }
        }
        Ok(())
    }

    fn device_name(&self) -> String {
        "Synthetic Front Camera".to_string()
    }
}

/// Microphone producing a stereo tone in real time
///
/// Each `drain` returns the 20 ms frames that became due since `start`.
pub struct SyntheticMicrophone {
    started: Option<Instant>,
    frames_emitted: u64,
}

impl SyntheticMicrophone {
    pub fn new() -> Self {
        Self {
            started: None,
            frames_emitted: 0,
        }
    }
}

impl Default for SyntheticMicrophone {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for SyntheticMicrophone {
    fn start(&mut self) -> Result<(), DiaryError> {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        Ok(())
    }

    fn drain(&mut self) -> Vec<AudioFrame> {
        let Some(started) = self.started else {
            return Vec::new();
        };
        let frame_secs = AUDIO_FRAME_SAMPLES as f64 / 48_000.0;
        let due = (started.elapsed().as_secs_f64() / frame_secs) as u64;

        let frames = (self.frames_emitted..due)
            .map(|n| synthetic_audio_frame(n, AUDIO_FRAME_SAMPLES))
            .collect();
        self.frames_emitted = self.frames_emitted.max(due);
        frames
    }

    fn stop(&mut self) -> Result<(), DiaryError> {
        self.started = None;
        Ok(())
    }

    fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

/// Sink writing frames back to back as raw RGB8
///
/// Audio is counted but not stored.
pub struct RawClipSink {
    writer: BufWriter<File>,
    path: PathBuf,
    fps: f32,
    frames: u64,
    bytes: u64,
    audio: Option<AudioFormat>,
    audio_frames: u64,
    counters: Arc<BackendCounters>,
}

impl RawClipSink {
    pub fn create(
        path: &Path,
        format: &CameraFormat,
        counters: Arc<BackendCounters>,
    ) -> Result<Self, DiaryError> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            fps: format.fps,
            frames: 0,
            bytes: 0,
            audio: None,
            audio_frames: 0,
            counters,
        })
    }

    /// Accept audio of `format`; `None` makes the sink video-only
    pub fn with_audio(mut self, format: Option<AudioFormat>) -> Self {
        self.audio = format;
        self
    }
}

impl ClipSink for RawClipSink {
    fn write_frame(&mut self, frame: &CameraFrame) -> Result<(), DiaryError> {
        self.writer.write_all(&frame.data)?;
        self.frames += 1;
        self.bytes += frame.data.len() as u64;
        self.counters.frames_written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write_audio(&mut self, frame: &AudioFrame) -> Result<(), DiaryError> {
        let Some(expected) = self.audio else {
            return Ok(());
        };
        if frame.format() != expected {
            return Err(DiaryError::EncodingError(format!(
                "audio is {:?}, track expects {:?}",
                frame.format(),
                expected
            )));
        }
        self.audio_frames += 1;
        self.counters.audio_frames_written.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<ClipStats, DiaryError> {
        self.writer.flush()?;
        self.counters.sinks_finished.fetch_add(1, Ordering::SeqCst);
        Ok(ClipStats {
            video_frames: self.frames,
            audio_frames: self.audio_frames,
            dropped_frames: 0,
            duration_secs: self.frames as f64 / self.fps.max(1.0) as f64,
            bytes_written: self.bytes,
            output_path: self.path.clone(),
        })
    }
}

/// Poster decoder that never touches the file contents
///
/// Names containing `broken` fail to decode; everything else yields a small
/// grey frame after `delay`.
#[derive(Debug, Clone, Default)]
pub struct FixedPosterDecoder {
    delay: Duration,
}

impl FixedPosterDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl PosterDecoder for FixedPosterDecoder {
    fn decode(&self, path: &Path) -> Result<PosterFrame, DiaryError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        if name.contains("broken") {
            return Err(DiaryError::DecodeError(format!("cannot decode {}", name)));
        }
        Ok(PosterFrame::new(4, 4, vec![128; 4 * 4 * 3]))
    }
}
