//! Head pose and facial feature metrics derived from landmark geometry.
//!
//! Every function in this module is pure: it reads a [`LandmarkSet`] or a
//! rotation matrix and returns a value. Landmarks follow the 49-point layout:
//!
//! | indices | feature |
//! |---------|---------|
//! | 0-4     | left eyebrow |
//! | 5-9     | right eyebrow |
//! | 10-13   | nose bridge (10 is the top) |
//! | 14-18   | nose base (16 is the centre) |
//! | 19-24   | left eye |
//! | 25-30   | right eye |
//! | 31-42   | outer lip (31 and 37 are the corners) |
//! | 43-45   | inner upper lip (44 is the centre) |
//! | 46-48   | inner lower lip (47 is the centre) |

use crate::{
    constants::{MAX_DIST_SCALE, MIN_DIST_SCALE, NUM_LANDMARKS, REFERENCE_NOSE_HEIGHT},
    Error, Result,
};
use nalgebra::{distance, Matrix3, Point2};

/// Landmark indices used by the metrics
pub mod layout {
    /// Centre of the left eyebrow
    pub const LEFT_BROW_CENTER: usize = 2;
    /// Centre of the right eyebrow
    pub const RIGHT_BROW_CENTER: usize = 7;
    /// Top of the nose bridge
    pub const NOSE_TOP: usize = 10;
    /// Centre of the nose base
    pub const NOSE_BASE: usize = 16;
    /// Left eye as (corner, top 1, top 2, corner, bottom 2, bottom 1)
    pub const LEFT_EYE: [usize; 6] = [19, 20, 21, 22, 23, 24];
    /// Right eye, same ordering as [`LEFT_EYE`]
    pub const RIGHT_EYE: [usize; 6] = [25, 26, 27, 28, 29, 30];
    /// Left mouth corner
    pub const MOUTH_LEFT: usize = 31;
    /// Right mouth corner
    pub const MOUTH_RIGHT: usize = 37;
    /// Centre of the inner upper lip
    pub const MOUTH_TOP: usize = 44;
    /// Centre of the inner lower lip
    pub const MOUTH_BOTTOM: usize = 47;
}

/// Ordered set of facial landmarks in the 49-point layout
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point2<f32>>,
}

impl LandmarkSet {
    /// Wrap a point list
    ///
    /// # Errors
    ///
    /// Returns an error if the list does not hold exactly 49 points
    pub fn new(points: Vec<Point2<f32>>) -> Result<Self> {
        if points.len() != NUM_LANDMARKS {
            return Err(Error::InvalidInput(format!(
                "Expected {} landmarks, got {}",
                NUM_LANDMARKS,
                points.len()
            )));
        }
        Ok(Self { points })
    }

    /// All points in layout order
    #[must_use]
    pub fn points(&self) -> &[Point2<f32>] {
        &self.points
    }

    /// Point at a layout index
    #[must_use]
    pub fn point(&self, index: usize) -> Point2<f32> {
        self.points[index]
    }

    /// Axis-aligned bounds as (min x, min y, max x, max y)
    #[must_use]
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        self.points.iter().fold(
            (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), p| (min_x.min(p.x), min_y.min(p.y), max_x.max(p.x), max_y.max(p.y)),
        )
    }

    /// True when every coordinate is finite
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.points.iter().all(|p| p.x.is_finite() && p.y.is_finite())
    }

    fn dist(&self, a: usize, b: usize) -> f32 {
        distance(&self.points[a], &self.points[b])
    }
}

/// Raw Euler angles in degrees, as produced by the decomposition
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    /// Rotation about the x axis
    pub pitch: f64,
    /// Rotation about the y axis
    pub yaw: f64,
    /// Rotation about the z axis
    pub roll: f64,
}

/// Head rotation plus its decomposed angles
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPose {
    /// Head rotation matrix
    pub rotation: Matrix3<f64>,
    /// Decomposed angles
    pub euler: EulerAngles,
}

impl HeadPose {
    /// Decompose a rotation matrix into a pose
    #[must_use]
    pub fn from_rotation(rotation: Matrix3<f64>) -> Self {
        Self {
            rotation,
            euler: estimate_head_pose(&rotation),
        }
    }

    /// Screen-space horizontal head turn
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn angle_x(&self) -> f32 {
        self.euler.yaw as f32
    }

    /// Screen-space vertical head tilt
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn angle_y(&self) -> f32 {
        -self.euler.pitch as f32
    }

    /// Screen-space head roll
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn angle_z(&self) -> f32 {
        -self.euler.roll as f32
    }
}

/// Scalar facial measurements for one landmark set
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureMetrics {
    /// Left eye aspect ratio
    pub left_ear: f32,
    /// Right eye aspect ratio
    pub right_ear: f32,
    /// Mean of both eye aspect ratios
    pub ear: f32,
    /// Inner lip gap
    pub mouth_open_y: f32,
    /// Mouth corner to corner distance
    pub mouth_form: f32,
    /// Left eyebrow to nose top distance
    pub eye_brow_l_y: f32,
    /// Right eyebrow to nose top distance
    pub eye_brow_r_y: f32,
    /// Subject distance compensation factor
    pub dist_scale: f32,
}

/// Distance-based features before eye ratios are added
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureDistances {
    /// Inner lip gap
    pub mouth_open_y: f32,
    /// Mouth corner to corner distance
    pub mouth_form: f32,
    /// Left eyebrow to nose top distance
    pub eye_brow_l_y: f32,
    /// Right eyebrow to nose top distance
    pub eye_brow_r_y: f32,
    /// Subject distance compensation factor
    pub dist_scale: f32,
}

/// Decompose a rotation matrix into pitch, yaw and roll
///
/// The matrix is treated as the left 3×3 block of a projection matrix with
/// zero translation and factored by Givens rotations about x, y and z
/// (`M = Rz(roll) · Ry(yaw) · Rx(pitch)` for a pure rotation).
#[must_use]
pub fn estimate_head_pose(rotation: &Matrix3<f64>) -> EulerAngles {
    let (c, s) = givens(rotation[(2, 2)], rotation[(2, 1)]);
    let qx = Matrix3::new(1.0, 0.0, 0.0, 0.0, c, s, 0.0, -s, c);
    let m = rotation * qx;
    let pitch = s.atan2(c);

    let (c, s) = givens(m[(2, 2)], -m[(2, 0)]);
    let qy = Matrix3::new(c, 0.0, -s, 0.0, 1.0, 0.0, s, 0.0, c);
    let m = m * qy;
    let yaw = s.atan2(c);

    let (c, s) = givens(m[(1, 1)], m[(1, 0)]);
    let roll = s.atan2(c);

    EulerAngles {
        pitch: pitch.to_degrees(),
        yaw: yaw.to_degrees(),
        roll: roll.to_degrees(),
    }
}

fn givens(c: f64, s: f64) -> (f64, f64) {
    let z = 1.0 / (c * c + s * s + f64::EPSILON).sqrt();
    (c * z, s * z)
}

/// Eye aspect ratio for both eyes as (left, right)
///
/// `EAR = (v1 + v2) / (2 h)`. A zero horizontal distance yields a
/// non-finite ratio; use [`feature_metrics`] for a checked result.
#[must_use]
pub fn eye_aspect_ratio(landmarks: &LandmarkSet) -> (f32, f32) {
    (
        single_eye_ratio(landmarks, &layout::LEFT_EYE),
        single_eye_ratio(landmarks, &layout::RIGHT_EYE),
    )
}

fn single_eye_ratio(landmarks: &LandmarkSet, eye: &[usize; 6]) -> f32 {
    let v1 = landmarks.dist(eye[1], eye[5]);
    let v2 = landmarks.dist(eye[2], eye[4]);
    let h = landmarks.dist(eye[0], eye[3]);
    (v1 + v2) / (2.0 * h)
}

/// Fold a nose-height ratio into the distance scale
///
/// A face closer than the reference (ratio above 1) shrinks the scale, a
/// farther one grows it up to 1.5. The result never drops below zero.
#[must_use]
pub fn fold_distance_scale(ratio: f32) -> f32 {
    let folded = if ratio > 1.0 {
        1.0 - (ratio - 1.0)
    } else if ratio < 1.0 {
        (1.0 + (1.0 - ratio)).min(MAX_DIST_SCALE)
    } else {
        1.0
    };
    folded.max(MIN_DIST_SCALE)
}

/// Distance features between fixed landmark pairs
#[must_use]
pub fn feature_distances(landmarks: &LandmarkSet) -> FeatureDistances {
    let nose_height = landmarks.dist(layout::NOSE_TOP, layout::NOSE_BASE);
    FeatureDistances {
        mouth_open_y: landmarks.dist(layout::MOUTH_TOP, layout::MOUTH_BOTTOM),
        mouth_form: landmarks.dist(layout::MOUTH_LEFT, layout::MOUTH_RIGHT),
        eye_brow_l_y: landmarks.dist(layout::LEFT_BROW_CENTER, layout::NOSE_TOP),
        eye_brow_r_y: landmarks.dist(layout::RIGHT_BROW_CENTER, layout::NOSE_TOP),
        dist_scale: fold_distance_scale(nose_height / REFERENCE_NOSE_HEIGHT),
    }
}

/// All feature metrics for a landmark set
///
/// # Errors
///
/// Returns [`Error::DegenerateGeometry`] if a coordinate is not finite, an
/// eye or the nose has collapsed to zero length, or a ratio is not finite.
pub fn feature_metrics(landmarks: &LandmarkSet) -> Result<FeatureMetrics> {
    if !landmarks.is_finite() {
        return Err(Error::DegenerateGeometry("non-finite landmark coordinate".to_string()));
    }

    for (name, eye) in [("left eye", &layout::LEFT_EYE), ("right eye", &layout::RIGHT_EYE)] {
        if landmarks.dist(eye[0], eye[3]) <= 0.0 {
            return Err(Error::DegenerateGeometry(format!("{name} has zero width")));
        }
    }
    if landmarks.dist(layout::NOSE_TOP, layout::NOSE_BASE) <= 0.0 {
        return Err(Error::DegenerateGeometry("nose has zero height".to_string()));
    }

    let (left_ear, right_ear) = eye_aspect_ratio(landmarks);
    let distances = feature_distances(landmarks);
    let metrics = FeatureMetrics {
        left_ear,
        right_ear,
        ear: (left_ear + right_ear) / 2.0,
        mouth_open_y: distances.mouth_open_y,
        mouth_form: distances.mouth_form,
        eye_brow_l_y: distances.eye_brow_l_y,
        eye_brow_r_y: distances.eye_brow_r_y,
        dist_scale: distances.dist_scale,
    };

    if !metrics.ear.is_finite() {
        return Err(Error::DegenerateGeometry("eye aspect ratio is not finite".to_string()));
    }
    Ok(metrics)
}
