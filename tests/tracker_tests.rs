//! Detect-then-track state machine driven by scripted backends


use avatar_face_capture::tracker::{LandmarkTracker, TrackOutcome, TrackingMode};
use test_helpers::{
    collapsed_face, rotation_y, scripted_tracker, Counters, FakeDetector, ScriptedEngine,
};

#[test]
fn test_starts_in_detection() {
    let (tracker, _) = scripted_tracker(true, vec![], 0.9);
    assert_eq!(tracker.mode(), TrackingMode::Detecting);
    assert!(tracker.landmarks().is_none());
}

#[test]
fn test_sustained_confidence_keeps_tracking() {
    let (mut tracker, counters) = scripted_tracker(true, vec![], 0.9);

    for frame in 0..20 {
        let outcome = tracker.step(&frame).unwrap();
        assert!(matches!(outcome, TrackOutcome::Updated(_)), "frame {frame}: {outcome:?}");
        assert_eq!(tracker.mode(), TrackingMode::Tracking);
    }

    assert_eq!(counters.detect_calls(), 1);
    assert_eq!(counters.align_calls(), 1);
    assert_eq!(counters.track_calls(), 19);
    assert!(tracker.landmarks().is_some());
}

#[test]
fn test_single_low_confidence_frame_falls_back() {
    let (mut tracker, counters) = scripted_tracker(true, vec![0.9, 0.9, 0.3, 0.9], 0.9);

    tracker.step(&0).unwrap();
    tracker.step(&1).unwrap();
    assert_eq!(tracker.mode(), TrackingMode::Tracking);

    let outcome = tracker.step(&2).unwrap();
    assert_eq!(outcome, TrackOutcome::Rejected { confidence: 0.3 });
    assert_eq!(tracker.mode(), TrackingMode::Detecting);
    assert!(tracker.landmarks().is_none());

    // Next frame goes through the detector again
    assert!(matches!(tracker.step(&3).unwrap(), TrackOutcome::Updated(_)));
    assert_eq!(counters.detect_calls(), 2);
    assert_eq!(tracker.mode(), TrackingMode::Tracking);
}

#[test]
fn test_threshold_is_exclusive() {
    let (mut tracker, _) = scripted_tracker(true, vec![0.5], 0.9);
    assert_eq!(tracker.step(&0).unwrap(), TrackOutcome::Rejected { confidence: 0.5 });
    assert_eq!(tracker.mode(), TrackingMode::Detecting);
}

#[test]
fn test_custom_threshold() {
    let counters = Counters::default();
    let mut tracker = LandmarkTracker::new(
        FakeDetector::new(true, &counters),
        ScriptedEngine::new(vec![0.6], 0.6, &counters),
    )
    .with_confidence_threshold(0.7);

    assert!(matches!(tracker.step(&0).unwrap(), TrackOutcome::Rejected { .. }));
}

#[test]
fn test_nan_confidence_is_rejected() {
    let (mut tracker, _) = scripted_tracker(true, vec![f32::NAN], 0.9);
    assert!(matches!(tracker.step(&0).unwrap(), TrackOutcome::Rejected { .. }));
    assert_eq!(tracker.mode(), TrackingMode::Detecting);
}

#[test]
fn test_missing_landmarks_are_rejected() {
    let (mut tracker, _) = scripted_tracker(true, vec![0.9, -1.0], 0.9);
    tracker.step(&0).unwrap();
    assert_eq!(tracker.step(&1).unwrap(), TrackOutcome::Rejected { confidence: 0.0 });
    assert_eq!(tracker.mode(), TrackingMode::Detecting);
}

#[test]
fn test_no_face_skips_alignment() {
    let (mut tracker, counters) = scripted_tracker(false, vec![], 0.9);

    for frame in 0..3 {
        assert_eq!(tracker.step(&frame).unwrap(), TrackOutcome::NoFace);
    }
    assert_eq!(tracker.mode(), TrackingMode::Detecting);
    assert_eq!(counters.detect_calls(), 3);
    assert_eq!(counters.align_calls(), 0);
}

#[test]
fn test_degenerate_landmarks_reset_tracking() {
    let counters = Counters::default();
    let mut tracker = LandmarkTracker::new(
        FakeDetector::new(true, &counters),
        ScriptedEngine::new(vec![], 0.95, &counters).with_landmarks(collapsed_face()),
    );

    assert_eq!(tracker.step(&0).unwrap(), TrackOutcome::Degenerate);
    assert_eq!(tracker.mode(), TrackingMode::Detecting);
}

#[test]
fn test_engine_error_resets_and_propagates() {
    let counters = Counters::default();
    let mut tracker = LandmarkTracker::new(
        FakeDetector::new(true, &counters),
        ScriptedEngine::new(vec![], 0.9, &counters).failing_on(2),
    );

    tracker.step(&0).unwrap();
    tracker.step(&1).unwrap();
    assert!(tracker.step(&2).is_err());
    assert_eq!(tracker.mode(), TrackingMode::Detecting);

    assert!(matches!(tracker.step(&3).unwrap(), TrackOutcome::Updated(_)));
    assert_eq!(counters.detect_calls(), 2);
}

#[test]
fn test_sample_carries_pose_and_metrics() {
    let counters = Counters::default();
    let mut tracker = LandmarkTracker::new(
        FakeDetector::new(true, &counters),
        ScriptedEngine::new(vec![], 0.8, &counters).with_rotation(rotation_y(20.0)),
    );

    let TrackOutcome::Updated(sample) = tracker.step(&0).unwrap() else {
        panic!("expected a sample");
    };
    assert_eq!(sample.confidence, 0.8);
    assert!((sample.pose.angle_x() - 20.0).abs() < 1e-4);
    assert!((sample.metrics.mouth_open_y - 10.0).abs() < 1e-4);
    assert_eq!(sample.metrics.dist_scale, 1.0);
    assert_eq!(tracker.landmarks(), Some(&sample.landmarks));
}

#[test]
fn test_reset_returns_to_detection() {
    let (mut tracker, counters) = scripted_tracker(true, vec![], 0.9);
    tracker.step(&0).unwrap();
    tracker.reset();

    assert_eq!(tracker.mode(), TrackingMode::Detecting);
    tracker.step(&1).unwrap();
    assert_eq!(counters.detect_calls(), 2);
}
