//! Capture controller and camera screen behavior against the synthetic backend
//!
//! Timing tests run on a paused tokio clock; the writer thread still captures
//! frames in real time.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tokio::time::Instant;
use videodiary::capture::{RecordingOutcome, SessionState};
use videodiary::errors::DiaryError;
use videodiary::testing::{FixedPosterDecoder, SyntheticBackend};
use videodiary::types::CameraFormat;
use videodiary::{CaptureScreen, Diary, DiaryConfig};

fn diary_with(backend: &SyntheticBackend) -> (TempDir, Diary) {
    let dir = tempdir().unwrap();
    let mut config = DiaryConfig::default();
    config.camera.resolution = [64, 48];
    config.capture.temp_file = Some(
        dir.path()
            .join("scratch.raw")
            .to_string_lossy()
            .into_owned(),
    );

    let diary = Diary::with_store_root(
        config,
        dir.path().join("Videos"),
        Arc::new(backend.clone()),
        Arc::new(FixedPosterDecoder::new()),
    );
    (dir, diary)
}

fn stored_clips(root: &Path) -> usize {
    std::fs::read_dir(root.join("Videos")).unwrap().count()
}

fn scratch_files(root: &Path) -> usize {
    std::fs::read_dir(root)
        .unwrap()
        .flatten()
        .filter(|e| e.file_name().to_string_lossy().starts_with("scratch"))
        .count()
}

fn saved_stats(outcome: &RecordingOutcome) -> &videodiary::capture::ClipStats {
    match outcome {
        RecordingOutcome::Saved { stats, .. } => stats,
        RecordingOutcome::Failed { error, .. } => panic!("recording failed: {}", error),
    }
}

#[tokio::test]
async fn test_configure_runs_session() {
    let backend = SyntheticBackend::new();
    let (_dir, diary) = diary_with(&backend);
    let controller = diary.capture_controller();
    assert_eq!(controller.state(), SessionState::Idle);

    controller.configure().await.unwrap();

    assert_eq!(controller.state(), SessionState::Running);
    let info = controller.session_info();
    assert_eq!(info.camera.as_deref(), Some("Synthetic Front Camera"));
    assert!(info.microphone.is_some());
    assert_eq!(backend.counters().cameras_opened(), 1);
}

#[tokio::test]
async fn test_missing_microphone_is_tolerated() {
    let backend = SyntheticBackend::new().without_microphone();
    let (_dir, diary) = diary_with(&backend);
    let controller = diary.capture_controller();

    controller.configure().await.unwrap();

    assert_eq!(controller.state(), SessionState::Running);
    assert!(controller.session_info().microphone.is_none());
}

#[tokio::test]
async fn test_missing_camera_leaves_session_idle() {
    let backend = SyntheticBackend::new().without_camera();
    let (_dir, diary) = diary_with(&backend);
    let controller = diary.capture_controller();

    controller.configure().await.unwrap();
    assert_eq!(controller.state(), SessionState::Idle);

    // A recording without a session still ends with exactly one outcome
    let outcome = controller.start_recording().unwrap().await.unwrap();
    assert!(matches!(
        outcome,
        RecordingOutcome::Failed {
            error: DiaryError::DeviceUnavailable(_),
            ..
        }
    ));
    assert_eq!(backend.counters().sinks_created(), 0);
}

#[tokio::test]
async fn test_stop_when_not_recording_is_noop() {
    let backend = SyntheticBackend::new();
    let (_dir, diary) = diary_with(&backend);
    let controller = diary.capture_controller();
    controller.configure().await.unwrap();

    controller.stop_recording();
    controller.stop_recording();

    assert!(!controller.is_recording());
    assert_eq!(controller.state(), SessionState::Running);
    assert_eq!(backend.counters().sinks_created(), 0);
}

#[tokio::test]
async fn test_double_start_opens_one_write_session() {
    let backend = SyntheticBackend::new();
    let (dir, diary) = diary_with(&backend);
    let controller = diary.capture_controller();
    controller.configure().await.unwrap();

    let first = controller.start_recording();
    let second = controller.start_recording();
    assert!(first.is_some());
    assert!(second.is_none());
    assert!(controller.is_recording());

    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.stop_recording();
    assert!(!controller.is_recording());

    let outcome = first.unwrap().await.unwrap();
    let path = outcome.saved_path().expect("clip should be saved").clone();
    assert!(path.starts_with(dir.path().join("Videos")));

    let counters = backend.counters();
    assert_eq!(counters.sinks_created(), 1);
    assert_eq!(counters.sinks_finished(), 1);
    assert!(counters.frames_written() >= 1);
    assert_eq!(stored_clips(dir.path()), 1);
}

#[tokio::test]
async fn test_recording_flag_flips_immediately() {
    let backend = SyntheticBackend::new();
    let (_dir, diary) = diary_with(&backend);
    let controller = diary.capture_controller();
    controller.configure().await.unwrap();
    let flag = controller.recording();

    let outcome = controller.start_recording().unwrap();
    assert!(*flag.borrow());

    controller.stop_recording();
    assert!(!*flag.borrow());
    assert!(matches!(outcome.await.unwrap(), RecordingOutcome::Saved { .. }));
}

#[tokio::test]
async fn test_teardown_is_idempotent() {
    let backend = SyntheticBackend::new();
    let (_dir, diary) = diary_with(&backend);
    let controller = diary.capture_controller();
    controller.configure().await.unwrap();

    controller.teardown_session();
    controller.teardown_session();
    assert_eq!(controller.state(), SessionState::Stopped);

    // Configure only starts from idle
    controller.configure().await.unwrap();
    assert_eq!(controller.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_teardown_during_recording_still_delivers_outcome() {
    let backend = SyntheticBackend::new();
    let (_dir, diary) = diary_with(&backend);
    let controller = diary.capture_controller();
    controller.configure().await.unwrap();

    let outcome = controller.start_recording().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.teardown_session();

    assert!(matches!(outcome.await.unwrap(), RecordingOutcome::Saved { .. }));
    assert_eq!(controller.state(), SessionState::Stopped);
}

#[tokio::test]
async fn test_successive_attempts_have_distinct_outcomes() {
    let backend = SyntheticBackend::new();
    let (dir, diary) = diary_with(&backend);
    let controller = diary.capture_controller();
    controller.configure().await.unwrap();

    let mut attempts = Vec::new();
    for _ in 0..2 {
        let outcome = controller.start_recording().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.stop_recording();
        attempts.push(outcome.await.unwrap());
    }

    assert_ne!(attempts[0].attempt(), attempts[1].attempt());
    assert_eq!(backend.counters().sinks_created(), 2);
    assert_eq!(stored_clips(dir.path()), 2);
}

#[tokio::test]
async fn test_restart_right_after_stop_keeps_both_clips() {
    let backend = SyntheticBackend::new();
    let (dir, diary) = diary_with(&backend);
    let controller = diary.capture_controller();
    controller.configure().await.unwrap();

    let first = controller.start_recording().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    controller.stop_recording();
    let second = controller.start_recording().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    controller.stop_recording();

    let first = first.await.unwrap();
    let second = second.await.unwrap();
    assert!(saved_stats(&first).video_frames >= 1);
    assert!(saved_stats(&second).video_frames >= 1);
    assert_ne!(first.saved_path(), second.saved_path());
    assert_eq!(stored_clips(dir.path()), 2);
    assert_eq!(backend.counters().sinks_finished(), 2);
    assert_eq!(scratch_files(dir.path()), 0);
}

#[tokio::test]
async fn test_start_while_configuring_fails_fast() {
    let backend = SyntheticBackend::new().with_camera_warmup(Duration::from_millis(300));
    let (dir, diary) = diary_with(&backend);
    let controller = diary.capture_controller();

    let setup = controller.configure();
    assert_eq!(controller.state(), SessionState::Configuring);
    let outcome = controller.start_recording().unwrap().await.unwrap();
    assert!(matches!(
        outcome,
        RecordingOutcome::Failed {
            error: DiaryError::DeviceUnavailable(_),
            ..
        }
    ));
    assert!(!controller.is_recording());

    setup.await.unwrap();
    assert_eq!(controller.state(), SessionState::Running);

    // The session is usable once configured
    let outcome = controller.start_recording().unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.stop_recording();
    saved_stats(&outcome.await.unwrap());
    assert_eq!(stored_clips(dir.path()), 1);
}

#[tokio::test]
async fn test_clip_carries_microphone_audio() {
    let backend = SyntheticBackend::new();
    let (_dir, diary) = diary_with(&backend);
    let controller = diary.capture_controller();
    controller.configure().await.unwrap();

    let outcome = controller.start_recording().unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    controller.stop_recording();

    let outcome = outcome.await.unwrap();
    let stats = saved_stats(&outcome);
    assert!(stats.audio_frames >= 5, "{} audio frames", stats.audio_frames);
    assert_eq!(backend.counters().microphones_opened(), 1);
    assert_eq!(backend.counters().audio_frames_written() as u64, stats.audio_frames);
}

#[tokio::test]
async fn test_clip_is_video_only_without_microphone() {
    for backend in [
        SyntheticBackend::new().without_microphone(),
        SyntheticBackend::new().with_silent_microphone(),
    ] {
        let (dir, diary) = diary_with(&backend);
        let controller = diary.capture_controller();
        controller.configure().await.unwrap();

        let outcome = controller.start_recording().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        controller.stop_recording();

        let outcome = outcome.await.unwrap();
        let stats = saved_stats(&outcome);
        assert!(stats.video_frames >= 1);
        assert_eq!(stats.audio_frames, 0);
        assert_eq!(backend.counters().microphones_opened(), 0);
        assert_eq!(stored_clips(dir.path()), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_countdown_then_fixed_length_recording() {
    let backend = SyntheticBackend::new();
    let (dir, diary) = diary_with(&backend);
    let screen = diary.open_camera();
    assert_eq!(screen.ready().await, SessionState::Running);

    let mut recording = screen.controller().recording();
    let began = Instant::now();
    assert!(screen.start_countdown());
    assert_eq!(screen.current_status().countdown, Some(3));

    let _ = recording.wait_for(|r| *r).await.unwrap();
    let started_after = began.elapsed();
    assert!(started_after >= Duration::from_secs(3), "{:?}", started_after);
    assert!(started_after < Duration::from_secs(4), "{:?}", started_after);

    let _ = recording.wait_for(|r| !*r).await.unwrap();
    let recorded_for = began.elapsed() - started_after;
    assert!(recorded_for >= Duration::from_secs(5), "{:?}", recorded_for);
    assert!(recorded_for < Duration::from_secs(6), "{:?}", recorded_for);

    let outcome = screen.wait_for_completed(1).await.unwrap();
    assert!(matches!(outcome, RecordingOutcome::Saved { .. }));

    let status = screen.current_status();
    assert_eq!(status.attempts, 1);
    assert_eq!(status.completed, 1);
    assert!(!status.counting);
    assert!(!status.recording);
    assert_eq!(backend.counters().sinks_created(), 1);
    assert_eq!(stored_clips(dir.path()), 1);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_ticks_down() {
    let backend = SyntheticBackend::new();
    let (_dir, diary) = diary_with(&backend);
    let screen = diary.open_camera();
    screen.ready().await;

    assert!(screen.start_countdown());
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(screen.current_status().countdown, Some(2));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(screen.current_status().countdown, Some(1));
    assert!(screen.current_status().counting);
    assert!(!screen.controller().is_recording());

    screen.close();
}

#[tokio::test(start_paused = true)]
async fn test_retrigger_during_capture_is_ignored() {
    let backend = SyntheticBackend::new();
    let (_dir, diary) = diary_with(&backend);
    let screen = diary.open_camera();
    screen.ready().await;

    assert!(screen.start_countdown());
    assert!(!screen.start_countdown());

    screen.wait_for_completed(1).await.unwrap();
    let status = screen.current_status();
    assert_eq!(status.attempts, 1);
    assert_eq!(backend.counters().sinks_created(), 1);

    // A finished sequence can be followed by another one
    assert!(screen.start_countdown());
    screen.wait_for_completed(2).await.unwrap();
    assert_eq!(screen.current_status().attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_retrigger_while_outcome_pending_is_ignored() {
    // Half a second per frame keeps the writer busy well after the stop
    let backend = SyntheticBackend::new().with_format(CameraFormat::new(64, 48, 2.0));
    let (dir, diary) = diary_with(&backend);
    let controller = diary.capture_controller();
    controller.configure().await.unwrap();

    let mut timing = diary.config().capture.clone();
    timing.countdown_secs = 0;
    timing.record_secs = 1;
    let screen = CaptureScreen::new(controller, &timing);
    let mut status = screen.status();

    assert!(screen.start_countdown());
    let _ = status
        .wait_for(|s| s.attempts == 1 && !s.recording)
        .await
        .unwrap();
    assert_eq!(screen.current_status().completed, 0);
    assert!(!screen.start_countdown());

    let outcome = screen.wait_for_completed(1).await.unwrap();
    saved_stats(&outcome);
    let current = screen.current_status();
    assert_eq!(current.attempts, 1);
    assert_eq!(current.completed, 1);
    assert_eq!(current.last_outcome.as_ref(), Some(&outcome));

    // Once the outcome is in, the next trigger is accepted
    assert!(screen.start_countdown());
    let second = screen.wait_for_completed(2).await.unwrap();
    assert_ne!(second.attempt(), outcome.attempt());
    assert_eq!(stored_clips(dir.path()), 2);
    screen.close();
}

#[tokio::test(start_paused = true)]
async fn test_close_mid_countdown_never_records() {
    let backend = SyntheticBackend::new();
    let (dir, diary) = diary_with(&backend);
    let screen = diary.open_camera();
    screen.ready().await;

    assert!(screen.start_countdown());
    tokio::time::sleep(Duration::from_millis(1500)).await;
    screen.close();

    tokio::time::sleep(Duration::from_secs(10)).await;

    let status = screen.current_status();
    assert_eq!(status.attempts, 0);
    assert!(!status.counting);
    assert_eq!(status.countdown, None);
    assert!(!screen.controller().is_recording());
    assert_eq!(screen.controller().state(), SessionState::Stopped);
    assert_eq!(backend.counters().sinks_created(), 0);
    assert_eq!(stored_clips(dir.path()), 0);

    assert!(screen.is_closed());
    assert!(!screen.start_countdown());
}

#[tokio::test]
async fn test_screen_without_camera_reports_failure() {
    let backend = SyntheticBackend::new().without_camera();
    let (dir, diary) = diary_with(&backend);
    let screen = diary.open_camera();
    assert_eq!(screen.ready().await, SessionState::Idle);

    let mut config = diary.config().capture.clone();
    config.countdown_secs = 0;
    config.record_secs = 0;
    let controller = diary.capture_controller();
    let quick = CaptureScreen::new(controller, &config);

    assert!(quick.start_countdown());
    let outcome = quick.wait_for_completed(1).await.unwrap();
    assert!(matches!(outcome, RecordingOutcome::Failed { .. }));
    assert_eq!(stored_clips(dir.path()), 0);
}
