//! Recording configuration types

use crate::types::{AudioFormat, CameraFormat};
use serde::{Deserialize, Serialize};

/// Quality presets for diary clips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl RecordingQuality {
    /// Target bitrate in bits per second
    pub fn bitrate(&self) -> u32 {
        match self {
            RecordingQuality::Low => 1_000_000,
            RecordingQuality::Medium => 2_500_000,
            RecordingQuality::High => 5_000_000,
        }
    }

    /// Parse the preset name used in the config file
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "low" => Some(RecordingQuality::Low),
            "medium" => Some(RecordingQuality::Medium),
            "high" => Some(RecordingQuality::High),
            _ => None,
        }
    }
}

/// Parameters of one MP4 clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    pub quality: RecordingQuality,
    /// Write `moov` before `mdat`
    pub fast_start: bool,
    pub title: Option<String>,
    /// Opus track layout; `None` records video only
    pub audio: Option<AudioFormat>,
}

impl RecordingConfig {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self::for_quality(width, height, fps, RecordingQuality::default())
    }

    pub fn for_quality(width: u32, height: u32, fps: f64, quality: RecordingQuality) -> Self {
        Self {
            width,
            height,
            fps,
            bitrate: quality.bitrate(),
            quality,
            fast_start: true,
            title: None,
            audio: None,
        }
    }

    /// Clip settings for frames of `format`
    pub fn for_format(format: &CameraFormat, quality: RecordingQuality) -> Self {
        Self::for_quality(format.width, format.height, format.fps as f64, quality)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_audio(mut self, audio: Option<AudioFormat>) -> Self {
        self.audio = audio;
        self
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self::new(1280, 720, 30.0)
    }
}
