//! Seams between the capture session and the hardware/codec stack

use crate::errors::DiaryError;
use crate::types::{AudioFormat, AudioFrame, CameraFormat, CameraFrame, MicrophoneInfo};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A camera that yields RGB8 frames
pub trait FrameSource: Send {
    /// Open the device stream
    fn start_stream(&mut self) -> Result<(), DiaryError>;

    /// Block until the next frame is available
    fn capture_frame(&mut self) -> Result<CameraFrame, DiaryError>;

    /// Close the device stream
    fn stop_stream(&mut self) -> Result<(), DiaryError>;

    /// Human-readable device name, for logs and session info
    fn device_name(&self) -> String;
}

/// A running microphone
///
/// Not `Send`: the stream is opened, drained and closed on the writer thread.
pub trait AudioSource {
    fn start(&mut self) -> Result<(), DiaryError>;

    /// Everything captured since the last call, without blocking
    fn drain(&mut self) -> Vec<AudioFrame>;

    fn stop(&mut self) -> Result<(), DiaryError>;

    fn format(&self) -> AudioFormat;
}

/// A container file being written
pub trait ClipSink: Send {
    fn write_frame(&mut self, frame: &CameraFrame) -> Result<(), DiaryError>;

    /// Append microphone samples; ignored by sinks opened without audio
    fn write_audio(&mut self, frame: &AudioFrame) -> Result<(), DiaryError>;

    /// Finalize the container and report what was written
    fn finish(self: Box<Self>) -> Result<ClipStats, DiaryError>;
}

/// Everything a capture session needs from the outside world
pub trait CaptureBackend: Send + Sync {
    /// The front-facing camera; mandatory for a session to run
    fn front_camera(&self) -> Result<Box<dyn FrameSource>, DiaryError>;

    /// The default microphone; optional
    fn microphone(&self) -> Result<MicrophoneInfo, DiaryError>;

    /// Open an audio stream on a microphone found by [`CaptureBackend::microphone`]
    fn open_microphone(&self, microphone: &MicrophoneInfo) -> Result<Box<dyn AudioSource>, DiaryError>;

    /// Open a new container file at `path` for frames of the given format,
    /// with an audio track when `audio` is set
    fn create_sink(
        &self,
        path: &Path,
        format: &CameraFormat,
        audio: Option<AudioFormat>,
    ) -> Result<Box<dyn ClipSink>, DiaryError>;
}

/// Statistics for one finished clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipStats {
    pub video_frames: u64,
    /// Audio packets muxed; zero for video-only clips
    #[serde(default)]
    pub audio_frames: u64,
    pub dropped_frames: u64,
    pub duration_secs: f64,
    pub bytes_written: u64,
    pub output_path: PathBuf,
}
