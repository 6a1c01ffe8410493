//! Top-level screen of the diary
//!
//! `Diary` owns the configuration, the clip store and the backends, and opens
//! the camera and gallery screens. The store is created here and passed down
//! explicitly; nothing in the crate reaches for a process-wide instance.

use crate::capture::{CaptureBackend, CaptureController, CaptureScreen};
use crate::config::DiaryConfig;
use crate::gallery::Gallery;
use crate::poster::PosterDecoder;
use crate::storage::VideoStore;
use crate::types::CameraFormat;
use std::path::PathBuf;
use std::sync::Arc;

pub struct Diary {
    config: DiaryConfig,
    store: Arc<VideoStore>,
    backend: Arc<dyn CaptureBackend>,
    posters: Arc<dyn PosterDecoder>,
}

impl Diary {
    /// Diary storing clips in `config.storage.directory`
    pub fn new(
        config: DiaryConfig,
        backend: Arc<dyn CaptureBackend>,
        posters: Arc<dyn PosterDecoder>,
    ) -> Self {
        let root = PathBuf::from(&config.storage.directory);
        Self::with_store_root(config, root, backend, posters)
    }

    /// Diary storing clips under an explicit directory
    pub fn with_store_root(
        config: DiaryConfig,
        root: PathBuf,
        backend: Arc<dyn CaptureBackend>,
        posters: Arc<dyn PosterDecoder>,
    ) -> Self {
        let store = VideoStore::new(root).with_extension(config.storage.extension.clone());
        store.ensure_store_exists();
        log::info!("Video diary using store {:?}", store.root());

        Self {
            config,
            store: Arc::new(store),
            backend,
            posters,
        }
    }

    /// Diary on real hardware: nokhwa camera, MP4 clips, openh264 posters
    #[cfg(all(feature = "camera", feature = "recording"))]
    pub fn native(config: DiaryConfig) -> Self {
        let root = PathBuf::from(&config.storage.directory);
        Self::native_in(config, root)
    }

    /// Native diary storing clips under `root`
    #[cfg(all(feature = "camera", feature = "recording"))]
    pub fn native_in(config: DiaryConfig, root: PathBuf) -> Self {
        let backend = Arc::new(crate::platform::NativeBackend::new(config.camera.clone()));
        let posters = Arc::new(crate::poster::H264PosterDecoder::new());
        Self::with_store_root(config, root, backend, posters)
    }

    pub fn config(&self) -> &DiaryConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<VideoStore> {
        self.store.clone()
    }

    /// Controller for a new capture session, not yet configured
    pub fn capture_controller(&self) -> CaptureController {
        let [width, height] = self.config.camera.resolution;
        CaptureController::new(
            self.backend.clone(),
            self.store.clone(),
            self.config.capture.temp_path(),
            CameraFormat::new(width, height, self.config.camera.fps as f32),
        )
    }

    /// Enter the camera screen
    ///
    /// Must be called from within a tokio runtime; session setup continues in
    /// the background (see [`CaptureScreen::ready`]).
    pub fn open_camera(&self) -> CaptureScreen {
        CaptureScreen::open(self.capture_controller(), &self.config.capture)
    }

    /// Enter the camera screen again, leaving `previous` first
    ///
    /// The previous session releases the camera before the new one is
    /// configured, so at most one session holds it.
    pub fn reopen_camera(&self, previous: Option<&CaptureScreen>) -> CaptureScreen {
        if let Some(previous) = previous {
            previous.close();
        }
        self.open_camera()
    }

    /// Enter the gallery; the store is listed once, here
    pub fn open_gallery(&self) -> Gallery {
        Gallery::open(self.store.clone(), self.posters.clone())
    }

    /// Total size of stored clips, e.g. "2.00 MB"
    pub fn storage_used(&self) -> String {
        self.store.used_space()
    }
}
