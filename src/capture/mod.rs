//! Camera session, recording and the countdown flow

pub mod backend;
pub mod controller;
pub mod flow;

pub use backend::{AudioSource, CaptureBackend, ClipSink, ClipStats, FrameSource};
pub use controller::{
    attempt_temp_path, CaptureController, RecordingOutcome, SessionInfo, SessionState,
};
pub use flow::{CaptureScreen, CaptureStatus};
