use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Operating system the crate was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Windows,
    MacOS,
    Linux,
    Unknown,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOS
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Unknown
        }
    }
}

/// Requested or negotiated capture format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub fps: f32,
    pub format_type: String,
}

impl CameraFormat {
    pub fn new(width: u32, height: u32, fps: f32) -> Self {
        Self {
            width,
            height,
            fps,
            format_type: "RGB8".to_string(),
        }
    }

    /// 1280x720 at 30fps, the default for diary clips
    pub fn hd() -> Self {
        Self::new(1280, 720, 30.0)
    }
}

/// A single RGB8 frame pulled from a camera
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
}

impl CameraFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, device_id: String) -> Self {
        Self {
            data,
            width,
            height,
            format: "RGB8".to_string(),
            device_id,
            timestamp: Utc::now(),
        }
    }
}

/// Camera device as reported by the platform backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDeviceInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_front_facing: bool,
}

impl CameraDeviceInfo {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            description: String::new(),
            is_front_facing: false,
        }
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    pub fn front_facing(mut self, is_front_facing: bool) -> Self {
        self.is_front_facing = is_front_facing;
        self
    }
}

/// Microphone attached to a capture session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicrophoneInfo {
    pub id: String,
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Sample layout of a microphone stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Interleaved f32 PCM from a microphone
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Seconds since the microphone started
    pub timestamp: f64,
}

impl AudioFrame {
    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Samples per channel
    pub fn len_per_channel(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }
}

/// A clip in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub path: PathBuf,
    pub name: String,
    pub created: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}
