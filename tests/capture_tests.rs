//! Capture thread lifecycle and the render side of the shared face state


use avatar_face_capture::{
    app::AvatarApp,
    binding::ParameterSource,
    capture::{run_capture_loop, CaptureOptions, CaptureSession, SharedFaceState},
    config::Config,
    parameters::{Channel, ParameterVector},
    rig::{Rig, StandaloneRig},
    tracker::LandmarkTracker,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use test_helpers::{
    rotation_y, scripted_tracker, wait_until, CountingSource, Counters, EmptySource, FailingSource, FakeDetector,
    LiveConfidence, ScriptedEngine, UnpluggedSource,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn quick_options() -> CaptureOptions {
    CaptureOptions {
        detection_backoff: Duration::from_millis(5),
        tracking_delay: Duration::ZERO,
    }
}

fn quick_config() -> Config {
    let mut config = Config::default();
    config.detection.backoff_ms = 5;
    config
}

#[test]
fn test_session_publishes_samples() {
    let shared = Arc::new(SharedFaceState::new());
    let (tracker, counters) = scripted_tracker(true, vec![], 0.9);
    let (source, released) = CountingSource::new();

    let session = CaptureSession::start(source, tracker, Arc::clone(&shared), quick_options()).unwrap();
    assert!(wait_until(TIMEOUT, || shared.snapshot().samples_published >= 5));
    assert!(session.is_running());
    assert!(shared.detected_sample().is_some());
    assert_eq!(counters.detect_calls(), 1);

    session.stop().unwrap();
    assert!(released.load(Ordering::SeqCst));
    assert!(shared.detected_sample().is_none());
}

#[test]
fn test_stop_interrupts_backoff() {
    let shared = Arc::new(SharedFaceState::new());
    let (tracker, _) = scripted_tracker(false, vec![], 0.9);
    let (source, _) = CountingSource::new();
    let options = CaptureOptions {
        detection_backoff: Duration::from_secs(30),
        tracking_delay: Duration::ZERO,
    };

    let session = CaptureSession::start(source, tracker, Arc::clone(&shared), options).unwrap();
    assert!(wait_until(TIMEOUT, || shared.snapshot().frames_processed >= 1));

    let start = Instant::now();
    session.stop().unwrap();
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_empty_frames_are_counted() {
    let shared = Arc::new(SharedFaceState::new());
    let (tracker, counters) = scripted_tracker(true, vec![], 0.9);

    let session = CaptureSession::start(EmptySource, tracker, Arc::clone(&shared), quick_options()).unwrap();
    assert!(wait_until(TIMEOUT, || shared.snapshot().frames_empty >= 3));
    session.stop().unwrap();

    let state = shared.snapshot();
    assert!(state.frame_empty);
    assert!(!state.detected);
    assert_eq!(state.frames_processed, 0);
    assert_eq!(counters.detect_calls(), 0);
}

#[test]
fn test_read_errors_do_not_end_the_loop() {
    let shared = Arc::new(SharedFaceState::new());
    let (tracker, _) = scripted_tracker(true, vec![], 0.9);

    let session = CaptureSession::start(FailingSource, tracker, Arc::clone(&shared), quick_options()).unwrap();
    assert!(wait_until(TIMEOUT, || shared.snapshot().frames_empty >= 3));
    assert!(session.is_running());
    session.stop().unwrap();
}

#[test]
fn test_empty_reads_are_paced() {
    let shared = Arc::new(SharedFaceState::new());
    let (tracker, _) = scripted_tracker(true, vec![], 0.9);
    let reads = Arc::new(AtomicUsize::new(0));

    let session = CaptureSession::start(
        UnpluggedSource(Arc::clone(&reads)),
        tracker,
        Arc::clone(&shared),
        quick_options(),
    )
    .unwrap();
    thread::sleep(Duration::from_millis(100));
    session.stop().unwrap();

    // At most one read per empty-frame wait
    let reads = reads.load(Ordering::SeqCst);
    assert!(reads >= 1);
    assert!(reads < 80, "{reads} reads in 100 ms");
    assert_eq!(shared.snapshot().frames_empty, reads as u64);
}

#[test]
fn test_low_confidence_is_not_published() {
    let shared = Arc::new(SharedFaceState::new());
    let (tracker, _) = scripted_tracker(true, vec![], 0.2);
    let (source, _) = CountingSource::new();

    let session = CaptureSession::start(source, tracker, Arc::clone(&shared), quick_options()).unwrap();
    assert!(wait_until(TIMEOUT, || shared.snapshot().frames_processed >= 3));
    session.stop().unwrap();

    let state = shared.snapshot();
    assert!(!state.detected);
    assert_eq!(state.samples_published, 0);
    assert!(state.latest.is_none());
}

#[test]
fn test_lost_face_keeps_last_sample_hidden() {
    let shared = Arc::new(SharedFaceState::new());
    let (tracker, _) = scripted_tracker(true, vec![0.9; 3], 0.1);
    let (source, _) = CountingSource::new();

    let session = CaptureSession::start(source, tracker, Arc::clone(&shared), quick_options()).unwrap();
    assert!(wait_until(TIMEOUT, || shared.snapshot().frames_processed >= 6));

    let state = shared.snapshot();
    assert_eq!(state.samples_published, 3);
    assert!(!state.detected);
    assert!(state.latest.is_some());
    assert!(shared.detected_sample().is_none());
    session.stop().unwrap();
}

#[test]
fn test_drop_joins_and_releases_source() {
    let shared = Arc::new(SharedFaceState::new());
    let (tracker, _) = scripted_tracker(true, vec![], 0.9);
    let (source, released) = CountingSource::new();

    let session = CaptureSession::start(source, tracker, Arc::clone(&shared), quick_options()).unwrap();
    assert!(wait_until(TIMEOUT, || shared.snapshot().frames_processed >= 1));
    drop(session);
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn test_loop_exits_when_sender_dropped() {
    let shared = SharedFaceState::new();
    let (tracker, _) = scripted_tracker(true, vec![], 0.9);
    let (source, released) = CountingSource::new();
    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);

    thread::scope(|s| {
        let (shared, stop_rx) = (&shared, &stop_rx);
        let handle = s.spawn(move || run_capture_loop(source, tracker, shared, quick_options(), stop_rx));
        assert!(wait_until(TIMEOUT, || shared.snapshot().samples_published >= 2));
        drop(stop_tx);
        handle.join().unwrap();
    });

    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn test_capture_binds_face_and_close_rebinds_sliders() {
    let mut app = AvatarApp::new(quick_config());
    app.load_model(Box::new(StandaloneRig::with_default_parameters()));

    let counters = Counters::default();
    let tracker = LandmarkTracker::new(
        FakeDetector::new(true, &counters),
        ScriptedEngine::new(vec![], 0.9, &counters).with_rotation(rotation_y(15.0)),
    );
    let (source, released) = CountingSource::new();
    app.start_capture(source, tracker).unwrap();
    assert!(app.is_capturing());

    let channels = *app.channel_index();
    for (channel, index) in channels.iter() {
        assert_eq!(app.bindings().source_of(index), Some(ParameterSource::FaceCapture(channel)));
    }

    assert!(wait_until(TIMEOUT, || app.face_state().detected));
    for _ in 0..120 {
        app.update(1.0 / 60.0);
    }
    let angle_x = channels.get(Channel::AngleX).unwrap();
    let mouth = channels.get(Channel::MouthOpenY).unwrap();
    let rig = app.rig().unwrap();
    assert!((rig.parameter_value(angle_x).unwrap() - 15.0).abs() < 0.1);
    assert!((rig.parameter_value(mouth).unwrap() - 6.5 / 10.5).abs() < 1e-3);

    app.close_camera().unwrap();
    assert!(!app.is_capturing());
    assert!(released.load(Ordering::SeqCst));
    for (index, source) in app.bindings().iter() {
        assert_eq!(source, ParameterSource::ManualGui(index));
    }

    // Without capture the optimized vector holds its last values
    let frozen = *app.parameters();
    for _ in 0..10 {
        app.update(0.1);
    }
    assert_eq!(*app.parameters(), frozen);
}

#[test]
fn test_stale_sample_is_not_applied() {
    let mut app = AvatarApp::new(quick_config());
    app.load_model(Box::new(StandaloneRig::with_default_parameters()));

    let counters = Counters::default();
    let tracker = LandmarkTracker::new(
        FakeDetector::new(true, &counters),
        ScriptedEngine::new(vec![0.9; 2], 0.1, &counters).with_rotation(rotation_y(20.0)),
    );
    let (source, _) = CountingSource::new();
    app.start_capture(source, tracker).unwrap();

    assert!(wait_until(TIMEOUT, || {
        let state = app.face_state();
        state.samples_published == 2 && !state.detected
    }));
    for _ in 0..30 {
        app.update(1.0 / 60.0);
    }
    assert_eq!(*app.parameters(), ParameterVector::new());
    app.close_camera().unwrap();
}

#[test]
fn test_lost_face_freezes_expression_while_capturing() {
    let mut app = AvatarApp::new(quick_config());
    app.load_model(Box::new(StandaloneRig::with_default_parameters()));

    let counters = Counters::default();
    let confidence = LiveConfidence::new(0.9);
    let tracker = LandmarkTracker::new(
        FakeDetector::new(true, &counters),
        ScriptedEngine::new(vec![], 0.9, &counters)
            .with_rotation(rotation_y(20.0))
            .with_live_confidence(&confidence),
    );
    let (source, _) = CountingSource::new();
    app.start_capture(source, tracker).unwrap();

    assert!(wait_until(TIMEOUT, || app.face_state().detected));
    for _ in 0..60 {
        app.update(1.0 / 60.0);
    }

    confidence.set(0.5);
    assert!(wait_until(TIMEOUT, || !app.face_state().detected));
    assert!(app.is_capturing());

    let frozen = *app.parameters();
    assert_ne!(frozen, ParameterVector::new());
    assert!(frozen.get(Channel::AngleX) > 10.0);
    for _ in 0..30 {
        app.update(1.0 / 60.0);
    }
    assert_eq!(*app.parameters(), frozen);

    let angle_x = app.channel_index().get(Channel::AngleX).unwrap();
    let shown = app.rig().unwrap().parameter_value(angle_x).unwrap();
    assert!((shown - frozen.get(Channel::AngleX)).abs() < 1e-5);

    app.close_camera().unwrap();
}

#[test]
fn test_restart_releases_previous_source() {
    let mut app = AvatarApp::new(quick_config());

    let (tracker, _) = scripted_tracker(true, vec![], 0.9);
    let (first, first_released) = CountingSource::new();
    app.start_capture(first, tracker).unwrap();

    let (tracker, _) = scripted_tracker(true, vec![], 0.9);
    let (second, second_released) = CountingSource::new();
    app.start_capture(second, tracker).unwrap();

    assert!(first_released.load(Ordering::SeqCst));
    assert!(!second_released.load(Ordering::SeqCst));

    app.close_camera().unwrap();
    assert!(second_released.load(Ordering::SeqCst));
}

#[test]
fn test_close_without_camera_is_noop() {
    let mut app = AvatarApp::new(Config::default());
    assert!(app.close_camera().is_ok());
    assert!(!app.is_capturing());
}
