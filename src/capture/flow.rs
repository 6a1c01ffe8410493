//! Countdown-then-record sequence behind the camera screen
//!
//! One trigger runs the whole sequence without further input: a one-second
//! countdown, `start_recording`, a fixed recording window, `stop_recording`.
//! The sequence task belongs to the screen; closing the screen aborts it.

use crate::capture::controller::{CaptureController, RecordingOutcome, SessionState};
use crate::config::CaptureConfig;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

/// Everything the camera screen renders
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureStatus {
    /// Seconds left before recording starts, while counting
    pub countdown: Option<u32>,
    pub counting: bool,
    pub recording: bool,
    /// Recordings started by this screen
    pub attempts: u32,
    /// Recordings whose outcome has arrived
    pub completed: u32,
    pub last_outcome: Option<RecordingOutcome>,
}

pub struct CaptureScreen {
    controller: Arc<CaptureController>,
    countdown_secs: u32,
    record_duration: Duration,
    status: Arc<watch::Sender<CaptureStatus>>,
    sequence: Mutex<Option<JoinHandle<()>>>,
    setup: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl CaptureScreen {
    pub fn new(controller: CaptureController, timing: &CaptureConfig) -> Self {
        let (status, _) = watch::channel(CaptureStatus::default());
        Self {
            controller: Arc::new(controller),
            countdown_secs: timing.countdown_secs,
            record_duration: timing.record_duration(),
            status: Arc::new(status),
            sequence: Mutex::new(None),
            setup: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Enter the screen: ask for camera access and assemble the session,
    /// both in the background
    pub fn open(controller: CaptureController, timing: &CaptureConfig) -> Self {
        drop(controller.request_permission());
        let setup = controller.configure();
        let screen = Self::new(controller, timing);
        *screen.setup.lock().unwrap_or_else(PoisonError::into_inner) = Some(setup);
        screen
    }

    /// Wait for session setup started by [`CaptureScreen::open`] to finish
    pub async fn ready(&self) -> SessionState {
        let setup = self
            .setup
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(setup) = setup {
            if let Err(e) = setup.await {
                log::error!("Session setup task failed: {}", e);
            }
        }
        self.controller.state()
    }

    /// Start the countdown
    ///
    /// Returns `false` when the trigger is ignored: the screen is closed, or
    /// the previous countdown has not yet delivered its recording outcome.
    pub fn start_countdown(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }

        let mut sequence = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);
        // A sequence stays busy until its outcome has been recorded, which
        // is after the recording flag clears.
        let pending = sequence.as_ref().is_some_and(|task| !task.is_finished());
        let busy = {
            let status = self.status.borrow();
            status.counting || status.recording
        };
        if pending || busy || self.controller.is_recording() {
            log::debug!("Countdown trigger ignored: capture already in progress");
            return false;
        }

        self.status.send_modify(|s| {
            s.counting = true;
            s.countdown = Some(self.countdown_secs);
        });

        let task = tokio::spawn(run_sequence(
            self.controller.clone(),
            self.status.clone(),
            self.countdown_secs,
            self.record_duration,
        ));
        // Only a finished sequence is ever replaced.
        *sequence = Some(task);
        true
    }

    /// Observable screen status
    pub fn status(&self) -> watch::Receiver<CaptureStatus> {
        self.status.subscribe()
    }

    pub fn current_status(&self) -> CaptureStatus {
        self.status.borrow().clone()
    }

    pub fn controller(&self) -> &CaptureController {
        &self.controller
    }

    /// Wait until `count` recordings have reported an outcome
    pub async fn wait_for_completed(&self, count: u32) -> Option<RecordingOutcome> {
        let mut status = self.status.subscribe();
        let result = status.wait_for(|s| s.completed >= count).await;
        result.ok().and_then(|s| s.last_outcome.clone())
    }

    /// Leave the screen
    ///
    /// Pending timers are cancelled, a recording in progress is stopped (the
    /// clip is still finalized and stored) and the session is torn down.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(task) = self
            .sequence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }

        self.controller.stop_recording();
        self.controller.teardown_session();
        self.status.send_modify(|s| {
            s.counting = false;
            s.countdown = None;
            s.recording = false;
        });
        log::debug!("Camera screen closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for CaptureScreen {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_sequence(
    controller: Arc<CaptureController>,
    status: Arc<watch::Sender<CaptureStatus>>,
    countdown_secs: u32,
    record_duration: Duration,
) {
    let mut remaining = countdown_secs;
    if remaining > 0 {
        let period = Duration::from_secs(1);
        let mut ticks = interval_at(Instant::now() + period, period);
        while remaining > 0 {
            ticks.tick().await;
            remaining -= 1;
            status.send_modify(|s| s.countdown = Some(remaining));
        }
    }

    status.send_modify(|s| {
        s.counting = false;
        s.countdown = None;
    });

    let Some(outcome) = controller.start_recording() else {
        return;
    };
    status.send_modify(|s| {
        s.recording = true;
        s.attempts += 1;
    });

    tokio::time::sleep(record_duration).await;
    controller.stop_recording();
    status.send_modify(|s| s.recording = false);

    match outcome.await {
        Ok(outcome) => status.send_modify(|s| {
            s.completed += 1;
            s.last_outcome = Some(outcome);
        }),
        Err(_) => log::warn!("Recording writer exited without an outcome"),
    }
}
