//! videodiary: front-camera video diary for Tauri applications
//!
//! Records short clips from the front camera after a countdown, keeps them in
//! a single local directory, and backs a gallery that lists, previews and
//! deletes them.
//!
//! # Features
//! - `camera`: nokhwa camera access
//! - `recording`: H.264/MP4 clips (openh264 + muxide) and poster decoding
//! - `audio`: microphone capture (cpal) and an Opus track in every clip
//! - `plugin`: Tauri plugin with diary commands
//!
//! # Usage
//! ```toml
//! [dependencies]
//! videodiary = { version = "0.1", features = ["plugin", "audio"] }
//! tauri = { version = "2.0", features = ["protocol-asset"] }
//! ```
//!
//! ```rust,ignore
//! fn main() {
//!     tauri::Builder::default()
//!         .plugin(videodiary::init())
//!         .run(tauri::generate_context!())
//!         .expect("error while running tauri application");
//! }
//! ```
//!
//! Without Tauri, drive the screens directly:
//! ```rust,ignore
//! let diary = videodiary::Diary::native(videodiary::DiaryConfig::load_or_default());
//! let camera = diary.open_camera();
//! camera.ready().await;
//! camera.start_countdown();
//! let outcome = camera.wait_for_completed(1).await;
//! ```
pub mod capture;
pub mod config;
pub mod diary;
pub mod errors;
pub mod gallery;
pub mod permissions;
pub mod platform;
pub mod poster;
pub mod storage;
pub mod types;

#[cfg(feature = "recording")]
pub mod recording;

#[cfg(feature = "audio")]
pub mod audio;

#[cfg(feature = "plugin")]
pub mod commands;

// Synthetic backend and data for offline testing
pub mod testing;

pub use capture::{CaptureController, CaptureScreen, CaptureStatus, RecordingOutcome};
pub use config::DiaryConfig;
pub use diary::Diary;
pub use errors::DiaryError;
pub use gallery::{Gallery, GalleryEntry, PosterState};
pub use storage::VideoStore;
pub use types::{
    AudioFormat, AudioFrame, CameraDeviceInfo, CameraFormat, CameraFrame, MicrophoneInfo, Platform,
    VideoRecord,
};

#[cfg(feature = "plugin")]
use tauri::{
    plugin::{Builder, TauriPlugin},
    Manager, Runtime,
};

/// Initialize the video diary plugin with all commands
///
/// Clips are stored under the app data directory.
#[cfg(feature = "plugin")]
pub fn init<R: Runtime>() -> TauriPlugin<R> {
    Builder::new("videodiary")
        .invoke_handler(tauri::generate_handler![
            // Camera screen
            commands::diary::open_camera,
            commands::diary::start_countdown,
            commands::diary::get_capture_status,
            commands::diary::close_camera,
            // Gallery screen
            commands::diary::open_gallery,
            commands::diary::next_poster,
            commands::diary::select_video,
            commands::diary::delete_video,
            commands::diary::close_gallery,
            // Storage and configuration
            commands::diary::get_storage_used,
            commands::diary::get_config,
            // Permission commands
            commands::permissions::request_camera_permission,
            commands::permissions::check_camera_permission_status,
        ])
        .setup(|app, _api| {
            let config = DiaryConfig::load_or_default();
            let root = match app.path().app_data_dir() {
                Ok(dir) => dir.join(&config.storage.directory),
                Err(e) => {
                    log::warn!("No app data directory ({}), storing clips relative to cwd", e);
                    std::path::PathBuf::from(&config.storage.directory)
                }
            };
            app.manage(commands::DiaryState::new(Diary::native_in(config, root)));
            Ok(())
        })
        .build()
}

pub fn current_platform() -> Platform {
    Platform::current()
}

/// Initialize logging; `RUST_LOG` defaults to `videodiary=info`
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "videodiary=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        platform: Platform::current(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub platform: Platform,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_platform_detection() {
        assert_ne!(current_platform(), Platform::Unknown);
    }

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "videodiary");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
    }
}
