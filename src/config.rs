//! Configuration management for the video diary
//!
//! Covers camera selection, the countdown/recording timing of the capture
//! flow, and where clips are stored. Configuration lives in a TOML file; the
//! layered loader additionally applies `VIDEODIARY__<SECTION>__<KEY>`
//! environment overrides.

use crate::errors::DiaryError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiaryConfig {
    pub camera: CameraConfig,
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
}

/// Camera-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Explicit device index; wins over `device_hint` when set
    pub device_index: Option<u32>,
    /// Case-insensitive substring matched against device names to find the front camera
    pub device_hint: String,
    /// Requested resolution [width, height]
    pub resolution: [u32; 2],
    /// Requested frames per second
    pub fps: u32,
    /// Encoding quality preset (low, medium, high)
    pub quality: String,
}

/// Countdown and recording window of the capture flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Seconds counted down before recording starts
    pub countdown_secs: u32,
    /// Fixed length of every clip in seconds
    pub record_secs: u32,
    /// Scratch file the recorder writes into before the clip is stored
    pub temp_file: Option<String>,
}

/// Clip store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding all clips
    pub directory: String,
    /// Extension of stored clips
    pub extension: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: None,
            device_hint: "front".to_string(),
            resolution: [1280, 720],
            fps: 30,
            quality: "medium".to_string(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            record_secs: 5,
            temp_file: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: "Videos".to_string(),
            extension: "mp4".to_string(),
        }
    }
}

impl CaptureConfig {
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs as u64)
    }

    pub fn record_duration(&self) -> Duration {
        Duration::from_secs(self.record_secs as u64)
    }

    /// Resolved scratch file path
    pub fn temp_path(&self) -> PathBuf {
        match &self.temp_file {
            Some(path) => PathBuf::from(path),
            None => std::env::temp_dir().join("videodiary-temp.mp4"),
        }
    }
}

impl DiaryConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, DiaryError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| DiaryError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: DiaryConfig = toml::from_str(&contents)
            .map_err(|e| DiaryError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load the optional TOML file, then apply `VIDEODIARY__*` environment overrides
    pub fn load_layered<P: AsRef<Path>>(path: P) -> Result<Self, DiaryError> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("VIDEODIARY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| DiaryError::ConfigError(format!("Failed to assemble config: {}", e)))?;

        let config: DiaryConfig = settings
            .try_deserialize()
            .map_err(|e| DiaryError::ConfigError(format!("Invalid configuration: {}", e)))?;

        config.validate().map_err(DiaryError::ConfigError)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), DiaryError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                DiaryError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| DiaryError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| DiaryError::ConfigError(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("videodiary.toml")
    }

    /// Load from default location, falling back to defaults on any error
    pub fn load_or_default() -> Self {
        Self::load_layered(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.camera.resolution[0] == 0 || self.camera.resolution[1] == 0 {
            return Err("Invalid camera resolution".to_string());
        }
        if self.camera.fps == 0 || self.camera.fps > 240 {
            return Err("Invalid camera FPS (must be 1-240)".to_string());
        }
        if !matches!(self.camera.quality.as_str(), "low" | "medium" | "high") {
            return Err(format!(
                "Unknown quality preset '{}' (expected low, medium or high)",
                self.camera.quality
            ));
        }

        if self.capture.countdown_secs > 60 {
            return Err("Countdown must be at most 60 seconds".to_string());
        }
        if self.capture.record_secs == 0 || self.capture.record_secs > 600 {
            return Err("Recording length must be between 1 and 600 seconds".to_string());
        }

        if self.storage.directory.trim().is_empty() {
            return Err("Storage directory must not be empty".to_string());
        }
        if self.storage.extension.is_empty()
            || !self.storage.extension.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err("Clip extension must be non-empty and alphanumeric".to_string());
        }

        Ok(())
    }
}
