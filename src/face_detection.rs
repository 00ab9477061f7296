//! Face regions and the Haar cascade detector that finds them.

use crate::{
    geometry::LandmarkSet,
    tracker::FaceRegionDetector,
    utils::safe_cast::f32_to_i32_clamp,
    Error, Result,
};
use nalgebra::Point2;
use opencv::{
    core::{Mat, Rect, Size, Vector},
    imgproc,
    objdetect::CascadeClassifier,
    prelude::*,
};
use std::path::Path;

/// Axis-aligned face region in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaceRegion {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl FaceRegion {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Bounding region of a landmark set
    #[must_use]
    pub fn from_landmarks(landmarks: &LandmarkSet) -> Self {
        let (min_x, min_y, max_x, max_y) = landmarks.bounds();
        let x = f32_to_i32_clamp(min_x.floor(), i32::MIN / 2, i32::MAX / 2);
        let y = f32_to_i32_clamp(min_y.floor(), i32::MIN / 2, i32::MAX / 2);
        let right = f32_to_i32_clamp(max_x.ceil(), i32::MIN / 2, i32::MAX / 2);
        let bottom = f32_to_i32_clamp(max_y.ceil(), i32::MIN / 2, i32::MAX / 2);
        Self::new(x, y, (right - x).max(0), (bottom - y).max(0))
    }

    /// Area in square pixels
    #[must_use]
    pub fn area(&self) -> i64 {
        i64::from(self.width.max(0)) * i64::from(self.height.max(0))
    }

    /// True if the point lies inside the region
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn contains(&self, point: Point2<f32>) -> bool {
        point.x >= self.x as f32
            && point.y >= self.y as f32
            && point.x <= (self.x + self.width) as f32
            && point.y <= (self.y + self.height) as f32
    }

    /// Overlapping area with another region
    #[must_use]
    pub fn intersection_area(&self, other: &Self) -> i64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right <= left || bottom <= top {
            return 0;
        }
        i64::from(right - left) * i64::from(bottom - top)
    }

    /// Intersection over union
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union <= 0 {
            return 0.0;
        }
        intersection as f32 / union as f32
    }

    /// Fraction of this region covered by `other`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coverage_by(&self, other: &Self) -> f32 {
        let area = self.area();
        if area <= 0 {
            return 0.0;
        }
        self.intersection_area(other) as f32 / area as f32
    }

    /// `OpenCV` rectangle with the same geometry
    #[must_use]
    pub fn to_rect(self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

impl From<Rect> for FaceRegion {
    fn from(rect: Rect) -> Self {
        Self::new(rect.x, rect.y, rect.width, rect.height)
    }
}

/// Sliding-window face detector backed by an `OpenCV` Haar cascade
pub struct HaarFaceDetector {
    classifier: CascadeClassifier,
    scale_step: f64,
    min_neighbors: i32,
    min_face_size: i32,
}

impl HaarFaceDetector {
    /// Load a cascade from its XML file
    ///
    /// A larger `min_face_size` skips small, distant faces and lowers the
    /// false positive rate.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not valid UTF-8 or the cascade is empty
    pub fn new<P: AsRef<Path>>(cascade_path: P, scale_step: f64, min_neighbors: i32, min_face_size: i32) -> Result<Self> {
        let path = cascade_path.as_ref();
        log::info!("Loading face cascade: {}", path.display());

        let path_str = path
            .to_str()
            .ok_or_else(|| Error::InvalidInput(format!("Cascade path is not UTF-8: {}", path.display())))?;
        let classifier = CascadeClassifier::new(path_str)?;
        if classifier.empty()? {
            return Err(Error::ModelError(format!("Face cascade is empty: {}", path.display())));
        }

        Ok(Self {
            classifier,
            scale_step,
            min_neighbors,
            min_face_size,
        })
    }
}

impl FaceRegionDetector<Mat> for HaarFaceDetector {
    fn detect_first(&mut self, frame: &Mat) -> Result<Option<FaceRegion>> {
        let mut gray = Mat::default();
        imgproc::cvt_color(frame, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;

        let mut faces = Vector::<Rect>::new();
        self.classifier.detect_multi_scale(
            &gray,
            &mut faces,
            self.scale_step,
            self.min_neighbors,
            0,
            Size::new(self.min_face_size, self.min_face_size),
            Size::default(),
        )?;

        Ok(faces.iter().next().map(FaceRegion::from))
    }
}
