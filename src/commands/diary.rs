use crate::capture::{CaptureScreen, CaptureStatus, SessionInfo, SessionState};
use crate::config::DiaryConfig;
use crate::diary::Diary;
use crate::gallery::{Gallery, PosterState};
use crate::types::VideoRecord;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tauri::{command, State};

const POSTER_EDGE: u32 = 320;
const POSTER_JPEG_QUALITY: u8 = 80;

/// Plugin-managed state: the diary plus whichever screens are open
pub struct DiaryState {
    diary: Diary,
    camera: Mutex<Option<Arc<CaptureScreen>>>,
    gallery: tokio::sync::Mutex<Option<Gallery>>,
}

impl DiaryState {
    pub fn new(diary: Diary) -> Self {
        Self {
            diary,
            camera: Mutex::new(None),
            gallery: tokio::sync::Mutex::new(None),
        }
    }

    fn camera(&self) -> Result<Arc<CaptureScreen>, String> {
        self.camera
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| "Camera screen is not open".to_string())
    }
}

/// Result of opening the camera screen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSession {
    pub state: SessionState,
    pub info: SessionInfo,
}

/// One decoded poster, ready for an `<img>` tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosterPayload {
    pub index: usize,
    pub path: String,
    /// JPEG bytes; empty when the clip keeps its placeholder
    pub jpeg: Vec<u8>,
}

/// Enter the camera screen, replacing any screen already open
#[command]
pub async fn open_camera(state: State<'_, DiaryState>) -> Result<CameraSession, String> {
    let screen = {
        let mut camera = state.camera.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = camera.take();
        let screen = Arc::new(state.diary.reopen_camera(previous.as_deref()));
        *camera = Some(screen.clone());
        screen
    };

    let session_state = screen.ready().await;
    if session_state != SessionState::Running {
        log::warn!("Camera session not running after setup: {:?}", session_state);
    }
    Ok(CameraSession {
        state: session_state,
        info: screen.controller().session_info(),
    })
}

/// Start the countdown; `false` when a capture is already underway
#[command]
pub async fn start_countdown(state: State<'_, DiaryState>) -> Result<bool, String> {
    Ok(state.camera()?.start_countdown())
}

#[command]
pub async fn get_capture_status(state: State<'_, DiaryState>) -> Result<CaptureStatus, String> {
    Ok(state.camera()?.current_status())
}

#[command]
pub async fn close_camera(state: State<'_, DiaryState>) -> Result<(), String> {
    let screen = state
        .camera
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(screen) = screen {
        screen.close();
    }
    Ok(())
}

/// Enter the gallery and start decoding posters in the background
#[command]
pub async fn open_gallery(state: State<'_, DiaryState>) -> Result<Vec<VideoRecord>, String> {
    let mut gallery = state.diary.open_gallery();
    let requested = gallery.request_posters();
    log::debug!("Requested {} posters", requested);

    let records = gallery
        .entries()
        .iter()
        .map(|e| e.record.clone())
        .collect();
    *state.gallery.lock().await = Some(gallery);
    Ok(records)
}

/// Wait for the next poster; `None` once every poster has been delivered
#[command]
pub async fn next_poster(state: State<'_, DiaryState>) -> Result<Option<PosterPayload>, String> {
    let mut guard = state.gallery.lock().await;
    let gallery = guard.as_mut().ok_or("Gallery is not open")?;

    let Some(path) = gallery.next_poster().await else {
        return Ok(None);
    };
    let Some(index) = gallery.entries().iter().position(|e| e.record.path == path) else {
        return Ok(None);
    };

    let jpeg = match gallery.poster(index) {
        Some(PosterState::Ready(frame)) => frame
            .thumbnail(POSTER_EDGE)
            .and_then(|thumb| thumb.to_jpeg(POSTER_JPEG_QUALITY))
            .unwrap_or_else(|e| {
                log::warn!("Poster encoding failed for {:?}: {}", path, e);
                Vec::new()
            }),
        _ => Vec::new(),
    };

    Ok(Some(PosterPayload {
        index,
        path: path.to_string_lossy().into_owned(),
        jpeg,
    }))
}

/// Path of the clip to play
#[command]
pub async fn select_video(state: State<'_, DiaryState>, index: usize) -> Result<String, String> {
    let guard = state.gallery.lock().await;
    let gallery = guard.as_ref().ok_or("Gallery is not open")?;
    gallery
        .select(index)
        .map(|p| p.to_string_lossy().into_owned())
        .ok_or_else(|| format!("No clip at index {}", index))
}

/// Delete a clip; returns the remaining listing
#[command]
pub async fn delete_video(
    state: State<'_, DiaryState>,
    index: usize,
) -> Result<Vec<VideoRecord>, String> {
    let mut guard = state.gallery.lock().await;
    let gallery = guard.as_mut().ok_or("Gallery is not open")?;
    gallery
        .delete(index)
        .ok_or_else(|| format!("No clip at index {}", index))?;
    Ok(gallery.entries().iter().map(|e| e.record.clone()).collect())
}

#[command]
pub async fn close_gallery(state: State<'_, DiaryState>) -> Result<(), String> {
    if let Some(mut gallery) = state.gallery.lock().await.take() {
        gallery.close();
    }
    Ok(())
}

#[command]
pub async fn get_storage_used(state: State<'_, DiaryState>) -> Result<String, String> {
    Ok(state.diary.storage_used())
}

#[command]
pub async fn get_config(state: State<'_, DiaryState>) -> Result<DiaryConfig, String> {
    Ok(state.diary.config().clone())
}
