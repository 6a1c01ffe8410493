//! Microphone discovery, capture and Opus encoding
//!
//! Clips carry an Opus track at 48 kHz; microphones are opened at that rate
//! so no resampling is needed.

mod capture;
mod device;
mod encoder;

pub use capture::MicrophoneCapture;
pub use device::{default_microphone, list_microphones};
pub use encoder::{OpusEncoder, OpusPacket, DEFAULT_AUDIO_BITRATE};

use crate::types::{AudioFormat, MicrophoneInfo};

/// Stream format a clip records from `microphone`: 48 kHz, mono or stereo
pub fn track_format(microphone: &MicrophoneInfo) -> AudioFormat {
    AudioFormat {
        sample_rate: 48_000,
        channels: microphone.channels.clamp(1, 2),
    }
}
