//! Capture session and recording control
//!
//! The controller owns the camera for the lifetime of one camera screen. A
//! recording attempt runs on its own writer thread that holds the camera lock
//! while it writes, so two clips can never be written at once. Each attempt
//! writes to its own scratch file, which it copies into the store after
//! releasing the camera. Each attempt ends with exactly one
//! [`RecordingOutcome`] on the receiver returned by
//! [`CaptureController::start_recording`].
//!
//! Locks are always taken camera first, then session state.

use crate::capture::backend::{AudioSource, CaptureBackend, ClipStats, FrameSource};
use crate::errors::DiaryError;
use crate::permissions::{self, PermissionInfo};
use crate::storage::VideoStore;
use crate::types::{CameraFormat, MicrophoneInfo};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Lifecycle of the capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Configuring,
    Running,
    Stopped,
}

/// Devices attached to the running session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub camera: Option<String>,
    pub microphone: Option<MicrophoneInfo>,
}

/// Terminal notification of one recording attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RecordingOutcome {
    Saved {
        attempt: Uuid,
        path: PathBuf,
        stats: ClipStats,
    },
    Failed {
        attempt: Uuid,
        error: DiaryError,
    },
}

impl RecordingOutcome {
    pub fn attempt(&self) -> Uuid {
        match self {
            RecordingOutcome::Saved { attempt, .. } | RecordingOutcome::Failed { attempt, .. } => {
                *attempt
            }
        }
    }

    pub fn saved_path(&self) -> Option<&PathBuf> {
        match self {
            RecordingOutcome::Saved { path, .. } => Some(path),
            RecordingOutcome::Failed { .. } => None,
        }
    }
}

struct Inner {
    state: Mutex<SessionState>,
    source: Mutex<Option<Box<dyn FrameSource>>>,
    info: Mutex<SessionInfo>,
}

/// Owns one capture session and its recordings
pub struct CaptureController {
    backend: Arc<dyn CaptureBackend>,
    store: Arc<VideoStore>,
    temp_path: PathBuf,
    format: CameraFormat,
    inner: Arc<Inner>,
    recording: watch::Sender<bool>,
    active_stop: Mutex<Option<Arc<AtomicBool>>>,
}

impl CaptureController {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        store: Arc<VideoStore>,
        temp_path: PathBuf,
        format: CameraFormat,
    ) -> Self {
        let (recording, _) = watch::channel(false);
        Self {
            backend,
            store,
            temp_path,
            format,
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState::Idle),
                source: Mutex::new(None),
                info: Mutex::new(SessionInfo::default()),
            }),
            recording,
            active_stop: Mutex::new(None),
        }
    }

    /// Query camera authorization without blocking; a denial is only logged
    pub fn request_permission(&self) -> JoinHandle<PermissionInfo> {
        permissions::request_permission_in_background()
    }

    /// Assemble the session in the background
    ///
    /// The front camera is mandatory: if it cannot be attached the failure is
    /// logged and the session stays idle. A missing microphone is tolerated.
    pub fn configure(&self) -> JoinHandle<()> {
        {
            let mut state = lock(&self.inner.state);
            if *state != SessionState::Idle {
                log::debug!("Ignoring configure request in state {:?}", *state);
                return tokio::spawn(async {});
            }
            *state = SessionState::Configuring;
        }

        let inner = self.inner.clone();
        let backend = self.backend.clone();
        tokio::task::spawn_blocking(move || assemble_session(&inner, backend.as_ref()))
    }

    /// Begin writing a new clip
    ///
    /// Returns `None` when a recording is already in progress. A session that
    /// is not running gets an immediate `Failed` outcome. The recording flag
    /// flips before any I/O happens.
    pub fn start_recording(&self) -> Option<oneshot::Receiver<RecordingOutcome>> {
        let mut active_stop = lock(&self.active_stop);
        if *self.recording.borrow() {
            log::debug!("Start requested while already recording; ignoring");
            return None;
        }

        let attempt = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let reply = Arc::new(Mutex::new(Some(tx)));

        let state = self.state();
        if state != SessionState::Running {
            log::error!("Attempt {} rejected: session is {:?}", attempt, state);
            deliver(
                &reply,
                RecordingOutcome::Failed {
                    attempt,
                    error: DiaryError::DeviceUnavailable(
                        "capture session is not running".to_string(),
                    ),
                },
            );
            return Some(rx);
        }
        self.recording.send_replace(true);

        let stop = Arc::new(AtomicBool::new(false));
        *active_stop = Some(stop.clone());
        drop(active_stop);

        let job = WriterJob {
            attempt,
            inner: self.inner.clone(),
            backend: self.backend.clone(),
            store: self.store.clone(),
            temp_path: attempt_temp_path(&self.temp_path, attempt),
            microphone: self.session_info().microphone,
            fps: self.format.fps,
            stop,
        };

        log::info!("Recording attempt {} started", attempt);
        let thread_reply = reply.clone();
        let spawned = std::thread::Builder::new()
            .name("videodiary-writer".to_string())
            .spawn(move || {
                let outcome = run_writer(job);
                deliver(&thread_reply, outcome);
            });

        if let Err(e) = spawned {
            log::error!("Failed to spawn writer for attempt {}: {}", attempt, e);
            lock(&self.active_stop).take();
            self.recording.send_replace(false);
            deliver(
                &reply,
                RecordingOutcome::Failed {
                    attempt,
                    error: DiaryError::CaptureError(format!("spawn failed: {}", e)),
                },
            );
        }

        Some(rx)
    }

    /// Ask the writer to finalize the clip; no-op when not recording
    ///
    /// The recording flag clears immediately, before the file is finished.
    pub fn stop_recording(&self) {
        let mut active_stop = lock(&self.active_stop);
        if !*self.recording.borrow() {
            return;
        }
        if let Some(stop) = active_stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
        self.recording.send_replace(false);
        log::info!("Recording stop requested");
    }

    /// Stop the session and release the camera; idempotent
    pub fn teardown_session(&self) {
        self.stop_recording();

        let mut state = lock(&self.inner.state);
        if *state == SessionState::Stopped {
            return;
        }
        *state = SessionState::Stopped;

        match self.inner.source.try_lock() {
            Ok(mut source) => close_source(&mut source),
            Err(TryLockError::Poisoned(poisoned)) => close_source(&mut poisoned.into_inner()),
            // The writer releases the camera when it sees the stopped state.
            Err(TryLockError::WouldBlock) => {}
        }
        log::info!("Capture session torn down");
    }

    pub fn is_recording(&self) -> bool {
        *self.recording.borrow()
    }

    /// Observable recording flag
    pub fn recording(&self) -> watch::Receiver<bool> {
        self.recording.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.inner.state)
    }

    pub fn session_info(&self) -> SessionInfo {
        lock(&self.inner.info).clone()
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        self.teardown_session();
    }
}

struct WriterJob {
    attempt: Uuid,
    inner: Arc<Inner>,
    backend: Arc<dyn CaptureBackend>,
    store: Arc<VideoStore>,
    temp_path: PathBuf,
    microphone: Option<MicrophoneInfo>,
    fps: f32,
    stop: Arc<AtomicBool>,
}

/// Scratch file of one attempt: the configured name tagged with the attempt id
///
/// `/tmp/diary.mov` becomes `/tmp/diary-<attempt>.mov`, so a new attempt never
/// touches a file an earlier one is still copying into the store.
pub fn attempt_temp_path(base: &Path, attempt: Uuid) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    let name = match base.extension() {
        Some(ext) => format!("{}-{}.{}", stem, attempt.simple(), ext.to_string_lossy()),
        None => format!("{}-{}", stem, attempt.simple()),
    };
    base.with_file_name(name)
}

fn assemble_session(inner: &Inner, backend: &dyn CaptureBackend) {
    let mut camera = match backend.front_camera() {
        Ok(camera) => camera,
        Err(e) => {
            log::error!("Cannot add video input: {}", e);
            reset_to_idle(inner);
            return;
        }
    };

    let microphone = match backend.microphone() {
        Ok(mic) => {
            log::info!("Attached microphone '{}'", mic.name);
            Some(mic)
        }
        Err(e) => {
            log::info!("Continuing without microphone: {}", e);
            None
        }
    };

    if let Err(e) = camera.start_stream() {
        log::error!("Failed to start camera stream: {}", e);
        reset_to_idle(inner);
        return;
    }

    // Same order as the writer: camera first, then state.
    let mut source = lock(&inner.source);
    let mut state = lock(&inner.state);
    if *state == SessionState::Stopped {
        drop(state);
        drop(source);
        if let Err(e) = camera.stop_stream() {
            log::warn!("Failed to stop camera after early teardown: {}", e);
        }
        return;
    }

    let device = camera.device_name();
    *lock(&inner.info) = SessionInfo {
        camera: Some(device.clone()),
        microphone,
    };
    *source = Some(camera);
    *state = SessionState::Running;
    log::info!("Capture session running on '{}'", device);
}

fn reset_to_idle(inner: &Inner) {
    let mut state = lock(&inner.state);
    if *state == SessionState::Configuring {
        *state = SessionState::Idle;
    }
}

fn run_writer(job: WriterJob) -> RecordingOutcome {
    let attempt = job.attempt;
    let written = {
        let mut source = lock(&job.inner.source);
        let result = match source.as_mut() {
            Some(camera) => write_clip(camera.as_mut(), &job),
            None => Err(DiaryError::DeviceUnavailable(
                "capture session is not running".to_string(),
            )),
        };

        // Release the camera while holding the state lock so a concurrent
        // teardown either closes it itself or leaves it to us.
        let state = lock(&job.inner.state);
        if *state == SessionState::Stopped {
            close_source(&mut source);
        }
        drop(source);
        drop(state);
        result
    };

    let outcome = match written {
        Ok(stats) => match job.store.try_save(&stats.output_path) {
            Ok(path) => {
                log::info!(
                    "Attempt {} saved at {:?}: {} frames, {:.2}s",
                    attempt,
                    path,
                    stats.video_frames,
                    stats.duration_secs
                );
                RecordingOutcome::Saved {
                    attempt,
                    path,
                    stats,
                }
            }
            Err(error) => {
                log::error!("Save error for attempt {}: {}", attempt, error);
                RecordingOutcome::Failed { attempt, error }
            }
        },
        Err(error) => {
            log::error!("Recording error for attempt {}: {}", attempt, error);
            RecordingOutcome::Failed { attempt, error }
        }
    };

    remove_temp_file(&job.temp_path);
    outcome
}

fn write_clip(camera: &mut dyn FrameSource, job: &WriterJob) -> Result<ClipStats, DiaryError> {
    remove_temp_file(&job.temp_path);

    // Audio lives on this thread; a microphone that cannot be opened only
    // costs the clip its audio track.
    let mut microphone = job
        .microphone
        .as_ref()
        .and_then(|mic| open_microphone(job.backend.as_ref(), mic));

    // The sink is sized from the first frame the camera actually delivers.
    let first = camera.capture_frame()?;
    let format = CameraFormat::new(first.width, first.height, job.fps);
    let audio = microphone.as_ref().map(|mic| mic.format());
    let mut sink = job.backend.create_sink(&job.temp_path, &format, audio)?;
    sink.write_frame(&first)?;

    while !job.stop.load(Ordering::Relaxed) {
        let frame = camera.capture_frame()?;
        sink.write_frame(&frame)?;
        if let Some(mic) = microphone.as_mut() {
            for samples in mic.drain() {
                sink.write_audio(&samples)?;
            }
        }
    }

    if let Some(mut mic) = microphone {
        if let Err(e) = mic.stop() {
            log::warn!("Failed to stop microphone: {}", e);
        }
        for samples in mic.drain() {
            sink.write_audio(&samples)?;
        }
    }

    sink.finish()
}

fn open_microphone(
    backend: &dyn CaptureBackend,
    microphone: &MicrophoneInfo,
) -> Option<Box<dyn AudioSource>> {
    let opened = backend.open_microphone(microphone).and_then(|mut source| {
        source.start()?;
        Ok(source)
    });
    match opened {
        Ok(source) => Some(source),
        Err(e) => {
            log::warn!("Recording without audio from '{}': {}", microphone.name, e);
            None
        }
    }
}

fn remove_temp_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("Removed temp file {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove temp file {:?}: {}", path, e),
    }
}

fn close_source(source: &mut Option<Box<dyn FrameSource>>) {
    if let Some(mut camera) = source.take() {
        if let Err(e) = camera.stop_stream() {
            log::warn!("Failed to stop camera stream: {}", e);
        }
    }
}

fn deliver(reply: &Mutex<Option<oneshot::Sender<RecordingOutcome>>>, outcome: RecordingOutcome) {
    if let Some(tx) = lock(reply).take() {
        if tx.send(outcome).is_err() {
            log::debug!("Recording outcome dropped: receiver is gone");
        }
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
