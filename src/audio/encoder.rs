//! Opus encoding of microphone PCM for the clip's audio track

use crate::errors::DiaryError;
use crate::types::{AudioFormat, AudioFrame};

/// Samples per channel in one Opus packet: 20 ms at 48 kHz
const FRAME_SAMPLES: usize = 960;

/// OPUS_APPLICATION_AUDIO from opus.h
const APPLICATION_AUDIO: i32 = 2049;

/// Largest packet libopus is asked to produce
const MAX_PACKET_BYTES: usize = 4000;

/// Bitrate of the audio track in bits per second
pub const DEFAULT_AUDIO_BITRATE: u32 = 96_000;

/// One encoded Opus packet
#[derive(Debug, Clone)]
pub struct OpusPacket {
    pub data: Vec<u8>,
    /// Presentation time in seconds from the first sample
    pub timestamp: f64,
}

/// Buffers PCM into 20 ms blocks and encodes each block to Opus
///
/// Owns a raw libopus handle: it may move between threads but must only be
/// used from one at a time, so it is `Send` and not `Sync`.
pub struct OpusEncoder {
    encoder: *mut libopus_sys::OpusEncoder,
    format: AudioFormat,
    pending: Vec<f32>,
    samples_encoded: u64,
}

// SAFETY: the handle is owned exclusively and never shared; libopus encoders
// may be used from any single thread.
unsafe impl Send for OpusEncoder {}

impl OpusEncoder {
    /// Opus takes 48 kHz mono or stereo only; anything else is rejected
    pub fn new(format: AudioFormat, bitrate: u32) -> Result<Self, DiaryError> {
        if format.sample_rate != 48_000 {
            return Err(DiaryError::EncodingError(format!(
                "Opus needs 48000 Hz audio, got {} Hz",
                format.sample_rate
            )));
        }
        if format.channels != 1 && format.channels != 2 {
            return Err(DiaryError::EncodingError(format!(
                "Opus needs mono or stereo audio, got {} channels",
                format.channels
            )));
        }

        let mut error: i32 = 0;
        let encoder = unsafe {
            libopus_sys::opus_encoder_create(
                format.sample_rate as i32,
                i32::from(format.channels),
                APPLICATION_AUDIO,
                &mut error,
            )
        };
        if encoder.is_null() || error != 0 {
            return Err(DiaryError::EncodingError(format!(
                "Failed to create Opus encoder: error code {}",
                error
            )));
        }

        let result = unsafe {
            libopus_sys::opus_encoder_ctl(
                encoder,
                libopus_sys::OPUS_SET_BITRATE_REQUEST as i32,
                bitrate as i32,
            )
        };
        if result != 0 {
            unsafe { libopus_sys::opus_encoder_destroy(encoder) };
            return Err(DiaryError::EncodingError(format!(
                "Failed to set Opus bitrate: error code {}",
                result
            )));
        }

        Ok(Self {
            encoder,
            format,
            pending: Vec::with_capacity(FRAME_SAMPLES * usize::from(format.channels) * 2),
            samples_encoded: 0,
        })
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Queue `frame` and encode every complete 20 ms block
    ///
    /// Returns no packets until a full block has been buffered.
    pub fn encode(&mut self, frame: &AudioFrame) -> Result<Vec<OpusPacket>, DiaryError> {
        if frame.format() != self.format {
            return Err(DiaryError::EncodingError(format!(
                "audio is {:?}, encoder expects {:?}",
                frame.format(),
                self.format
            )));
        }
        self.pending.extend_from_slice(&frame.samples);
        self.encode_pending()
    }

    /// Pad the last partial block with silence and encode it
    pub fn flush(&mut self) -> Result<Vec<OpusPacket>, DiaryError> {
        let block = self.block_len();
        let partial = self.pending.len() % block;
        if partial != 0 {
            self.pending.resize(self.pending.len() + block - partial, 0.0);
        }
        self.encode_pending()
    }

    fn block_len(&self) -> usize {
        FRAME_SAMPLES * usize::from(self.format.channels)
    }

    fn encode_pending(&mut self) -> Result<Vec<OpusPacket>, DiaryError> {
        let block = self.block_len();
        let mut packets = Vec::with_capacity(self.pending.len() / block);

        while self.pending.len() >= block {
            let mut output = vec![0u8; MAX_PACKET_BYTES];
            let len = unsafe {
                libopus_sys::opus_encode_float(
                    self.encoder,
                    self.pending.as_ptr(),
                    FRAME_SAMPLES as i32,
                    output.as_mut_ptr(),
                    output.len() as i32,
                )
            };
            if len < 0 {
                return Err(DiaryError::EncodingError(format!(
                    "Opus encoding failed: error code {}",
                    len
                )));
            }
            output.truncate(len as usize);
            self.pending.drain(..block);

            packets.push(OpusPacket {
                data: output,
                timestamp: self.samples_encoded as f64 / f64::from(self.format.sample_rate),
            });
            self.samples_encoded += FRAME_SAMPLES as u64;
        }

        Ok(packets)
    }
}

impl Drop for OpusEncoder {
    fn drop(&mut self) {
        if !self.encoder.is_null() {
            unsafe { libopus_sys::opus_encoder_destroy(self.encoder) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_audio_frame;

    const STEREO: AudioFormat = AudioFormat {
        sample_rate: 48_000,
        channels: 2,
    };

    #[test]
    fn test_rejects_unsupported_formats() {
        let cd = AudioFormat {
            sample_rate: 44_100,
            channels: 2,
        };
        let surround = AudioFormat {
            sample_rate: 48_000,
            channels: 6,
        };
        assert!(OpusEncoder::new(cd, DEFAULT_AUDIO_BITRATE).is_err());
        assert!(OpusEncoder::new(surround, DEFAULT_AUDIO_BITRATE).is_err());
    }

    #[test]
    fn test_one_packet_per_block() {
        let mut encoder = OpusEncoder::new(STEREO, DEFAULT_AUDIO_BITRATE).unwrap();
        let mut packets = Vec::new();
        for n in 0..5 {
            packets.extend(encoder.encode(&synthetic_audio_frame(n, 960)).unwrap());
        }

        assert_eq!(packets.len(), 5);
        assert!(packets.iter().all(|p| !p.data.is_empty()));
        assert!((packets[1].timestamp - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_partial_block_waits_for_flush() {
        let mut encoder = OpusEncoder::new(STEREO, DEFAULT_AUDIO_BITRATE).unwrap();
        assert!(encoder.encode(&synthetic_audio_frame(0, 100)).unwrap().is_empty());

        let flushed = encoder.flush().unwrap();
        assert_eq!(flushed.len(), 1);
        assert!(encoder.flush().unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_frame_is_rejected() {
        let mono = AudioFormat {
            sample_rate: 48_000,
            channels: 1,
        };
        let mut encoder = OpusEncoder::new(mono, DEFAULT_AUDIO_BITRATE).unwrap();
        assert!(encoder.encode(&synthetic_audio_frame(0, 960)).is_err());
    }
}
