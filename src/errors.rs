use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum DiaryError {
    #[error("Permission denied error: {0}")]
    PermissionDenied(String),
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Capture error: {0}")]
    CaptureError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Decode error: {0}")]
    DecodeError(String),
    #[error("Encoding error: {0}")]
    EncodingError(String),
    #[error("Muxing error: {0}")]
    MuxingError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for DiaryError {
    fn from(error: std::io::Error) -> Self {
        DiaryError::IoError(error.to_string())
    }
}
