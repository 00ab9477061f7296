//! Remapping face samples into the optimized parameter vector


use avatar_face_capture::{
    config::{ChannelBounds, SmoothingConfig},
    cursor_control::PointerSample,
    geometry::{feature_metrics, HeadPose},
    parameters::{Channel, ParameterVector},
    smoothing::ParameterRemapper,
    tracker::FaceSample,
};
use nalgebra::Matrix3;
use test_helpers::{rotation_x, rotation_y, synthetic_face, FaceShape};

const DT: f32 = 1.0 / 60.0;

fn sample(shape: &FaceShape, rotation: Matrix3<f64>) -> FaceSample {
    let landmarks = synthetic_face(shape);
    FaceSample {
        metrics: feature_metrics(&landmarks).unwrap(),
        pose: HeadPose::from_rotation(rotation),
        landmarks,
        confidence: 0.9,
    }
}

fn neutral_sample() -> FaceSample {
    sample(&FaceShape::default(), Matrix3::identity())
}

fn settle(remapper: &ParameterRemapper, sample: &FaceSample, ticks: usize) -> ParameterVector {
    let mut vector = ParameterVector::new();
    for _ in 0..ticks {
        remapper.update(&mut vector, sample, DT);
    }
    vector
}

fn assert_close(actual: f32, expected: f32) {
    assert!((actual - expected).abs() < 1e-3, "expected {expected}, got {actual}");
}

#[test]
fn test_angle_converges_monotonically() {
    let remapper = ParameterRemapper::default();
    let sample = sample(&FaceShape::default(), rotation_y(15.0));
    let target = sample.pose.angle_x();
    let mut vector = ParameterVector::new();

    let mut last_error = f32::INFINITY;
    for _ in 0..240 {
        remapper.update(&mut vector, &sample, DT);
        let error = (vector.get(Channel::AngleX) - target).abs();
        assert!(error <= last_error);
        last_error = error;
    }
    assert!(last_error < 1e-3);
}

#[test]
fn test_angle_y_gain_and_body_follow() {
    let remapper = ParameterRemapper::default();
    let sample = sample(&FaceShape::default(), rotation_x(10.0));
    let mut vector = ParameterVector::new();

    for _ in 0..300 {
        remapper.update(&mut vector, &sample, DT);
        assert_close(vector.get(Channel::BodyAngleY), vector.get(Channel::AngleY) * 0.25);
        assert_close(vector.get(Channel::BodyAngleX), vector.get(Channel::AngleX) * 0.2);
    }
    assert_close(vector.get(Channel::AngleY), -13.0);
}

#[test]
fn test_mouth_targets() {
    let vector = settle(&ParameterRemapper::default(), &neutral_sample(), 120);
    assert_close(vector.get(Channel::MouthOpenY), 6.5 / 10.5);
    assert_close(vector.get(Channel::MouthForm), 0.5);
}

#[test]
fn test_distance_scale_shrinks_mouth() {
    let near = sample(
        &FaceShape {
            nose_height: 100.0,
            ..FaceShape::default()
        },
        Matrix3::identity(),
    );
    let vector = settle(&ParameterRemapper::default(), &near, 120);
    assert_close(vector.get(Channel::MouthOpenY), (7.5 - 3.5) / 10.5);
}

#[test]
fn test_equalized_eyes_match() {
    let winking = sample(
        &FaceShape {
            left_eye_open: 6.0,
            right_eye_open: 9.0,
            ..FaceShape::default()
        },
        Matrix3::identity(),
    );
    let remapper = ParameterRemapper::default();
    let mut vector = ParameterVector::new();
    for _ in 0..120 {
        remapper.update(&mut vector, &winking, DT);
        assert_eq!(vector.get(Channel::EyeLOpen), vector.get(Channel::EyeROpen));
    }
    assert_close(vector.get(Channel::EyeLOpen), 1.2);
}

#[test]
fn test_independent_eyes() {
    let winking = sample(
        &FaceShape {
            left_eye_open: 6.0,
            right_eye_open: 9.0,
            ..FaceShape::default()
        },
        Matrix3::identity(),
    );
    let mut remapper = ParameterRemapper::default();
    remapper.set_equalize_eyes(false);
    let vector = settle(&remapper, &winking, 120);

    assert_close(vector.get(Channel::EyeLOpen), 0.7);
    assert_close(vector.get(Channel::EyeROpen), 1.7);
}

#[test]
fn test_eye_smile_follows_eye_form() {
    let looking_up = sample(&FaceShape::default(), rotation_x(10.0));
    let remapper = ParameterRemapper::default();
    let mut vector = ParameterVector::new();
    for _ in 0..300 {
        remapper.update(&mut vector, &looking_up, DT);
        assert_eq!(vector.get(Channel::EyeLSmile), vector.get(Channel::EyeForm));
        assert_eq!(vector.get(Channel::EyeRSmile), vector.get(Channel::EyeForm));
    }
    assert_close(vector.get(Channel::EyeForm), 7.0 / 30.0);
}

#[test]
fn test_raised_brows_keep_neutral_form() {
    let vector = settle(&ParameterRemapper::default(), &neutral_sample(), 300);

    assert_close(vector.get(Channel::BrowLY), 0.5);
    assert_eq!(vector.get(Channel::BrowRY), vector.get(Channel::BrowLY));
    assert_eq!(vector.get(Channel::BrowLForm), 0.0);
    assert_eq!(vector.get(Channel::BrowRAngle), 0.0);
}

#[test]
fn test_lowered_brows_frown() {
    let frowning = sample(
        &FaceShape {
            brow_distance: 41.0,
            ..FaceShape::default()
        },
        Matrix3::identity(),
    );
    let vector = settle(&ParameterRemapper::default(), &frowning, 300);

    assert_close(vector.get(Channel::BrowLY), -0.5);
    for channel in [Channel::BrowLForm, Channel::BrowRForm, Channel::BrowLAngle, Channel::BrowRAngle] {
        assert_eq!(vector.get(channel), vector.get(Channel::BrowLY).min(0.0));
    }
}

#[test]
fn test_configured_bounds() {
    let remapper = ParameterRemapper::new(SmoothingConfig {
        mouth_open: ChannelBounds::new(0.0, 20.0),
        ..SmoothingConfig::default()
    });
    let vector = settle(&remapper, &neutral_sample(), 120);
    assert_close(vector.get(Channel::MouthOpenY), 0.5);
}

#[test]
fn test_long_frame_lands_on_targets() {
    let remapper = ParameterRemapper::default();
    let mut vector = ParameterVector::new();
    remapper.update(&mut vector, &sample(&FaceShape::default(), rotation_y(15.0)), 1.0);

    assert_close(vector.get(Channel::AngleX), 15.0);
    assert_close(vector.get(Channel::MouthForm), 0.5);
}

#[test]
fn test_eyeballs_follow_pointer() {
    let remapper = ParameterRemapper::default();
    let mut vector = ParameterVector::new();

    let corner = PointerSample {
        x: 1920,
        y: 0,
        screen_width: 1920,
        screen_height: 1080,
    };
    remapper.update_eyeballs(&mut vector, &corner);
    assert_close(vector.get(Channel::EyeBallX), 1.0);
    assert_close(vector.get(Channel::EyeBallY), 1.0);

    let centre = PointerSample {
        x: 960,
        y: 540,
        ..corner
    };
    remapper.update_eyeballs(&mut vector, &centre);
    assert_close(vector.get(Channel::EyeBallX), 0.0);
    assert_close(vector.get(Channel::EyeBallY), 0.0);
}

#[test]
fn test_eyeballs_ignore_empty_screen() {
    let remapper = ParameterRemapper::default();
    let mut vector = ParameterVector::new();
    vector.set(Channel::EyeBallX, 0.4);

    let pointer = PointerSample {
        x: 10,
        y: 10,
        screen_width: 0,
        screen_height: 0,
    };
    remapper.update_eyeballs(&mut vector, &pointer);
    assert_eq!(vector.get(Channel::EyeBallX), 0.4);
}
