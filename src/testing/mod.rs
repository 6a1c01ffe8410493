//! Testing utilities
//!
//! Synthetic frames, audio, MP4 files and a capture backend that needs no
//! hardware.

pub mod backend;
pub mod synthetic_data;

pub use backend::{
    BackendCounters, FixedPosterDecoder, RawClipSink, SyntheticBackend, SyntheticCamera,
    SyntheticMicrophone,
};
pub use synthetic_data::{synthetic_audio_frame, synthetic_mp4, synthetic_video_frame};
