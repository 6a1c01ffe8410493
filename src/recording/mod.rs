//! Clip recording
//!
//! openh264 encodes RGB frames to H.264 and muxide writes them into an MP4
//! container. [`Mp4Recorder`] is the [`ClipSink`](crate::capture::ClipSink)
//! the native backend hands to the capture controller.

mod config;
mod encoder;
mod recorder;

pub use config::{RecordingConfig, RecordingQuality};
pub use encoder::{EncodedFrame, H264Encoder};
pub use recorder::Mp4Recorder;

#[cfg(test)]
mod tests;
