//! Landmark engine backed by a 68-point `ONNX` landmark model.
//!
//! The model points are reduced to the 49-point tracking layout by dropping
//! the jaw line and the two inner lip corners.

use crate::{
    constants::{NUM_LANDMARKS, NUM_MODEL_LANDMARKS},
    face_detection::FaceRegion,
    geometry::LandmarkSet,
    pose_estimation::PoseEstimator,
    tracker::{Alignment, LandmarkEngine},
    utils::{refine_region, safe_cast::usize_to_i32},
    Error, Result,
};
use nalgebra::{Matrix3, Point2};
use ndarray::{Array4, CowArray};
use opencv::{
    core::{Mat, Point3f, Size, Vec3f, CV_32F},
    imgproc::{self, InterpolationFlags},
    prelude::*,
};
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Default landmark detector input size
const DEFAULT_LANDMARK_INPUT_SIZE: i32 = 128;

/// Model point index for each point of the tracking layout
pub const MODEL_TO_LAYOUT: [usize; NUM_LANDMARKS] = [
    17, 18, 19, 20, 21, 22, 23, 24, 25, 26, // brows
    27, 28, 29, 30, 31, 32, 33, 34, 35, // nose
    36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, // eyes
    48, 49, 50, 51, 52, 53, 54, 55, 56, 57, 58, 59, // outer lip
    61, 62, 63, 65, 66, 67, // inner lip
];

/// Reduce 68 model points to the tracking layout
///
/// # Errors
///
/// Returns an error if `model_points` does not hold 68 points
pub fn to_layout(model_points: &[Point2<f32>]) -> Result<LandmarkSet> {
    if model_points.len() != NUM_MODEL_LANDMARKS {
        return Err(Error::ModelValidationError(format!(
            "Expected {} model landmarks, got {}",
            NUM_MODEL_LANDMARKS,
            model_points.len()
        )));
    }
    LandmarkSet::new(MODEL_TO_LAYOUT.iter().map(|&i| model_points[i]).collect())
}

/// Fraction of landmarks that fall inside a region
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn inside_fraction(landmarks: &LandmarkSet, region: &FaceRegion) -> f32 {
    let inside = landmarks.points().iter().filter(|p| region.contains(**p)).count();
    inside as f32 / NUM_LANDMARKS as f32
}

/// Facial landmark detector using `ONNX` Runtime
pub struct MarkDetector {
    session: Session,
    input_size: i32,
}

impl MarkDetector {
    /// Create a new landmark detector from an `ONNX` model file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ONNX model file cannot be loaded
    /// - The ONNX runtime environment cannot be created
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        log::info!("Initializing MarkDetector with model: {}", model_path.as_ref().display());
        let environment = Arc::new(
            Environment::builder()
                .with_name("mark_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        if session.inputs.is_empty() || session.outputs.is_empty() {
            return Err(Error::ModelError("Landmark model has no inputs or outputs".to_string()));
        }

        Ok(Self {
            session,
            input_size: DEFAULT_LANDMARK_INPUT_SIZE,
        })
    }

    /// Detect 68 landmarks in a cropped face image, in crop pixels
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails
    pub fn detect(&self, face_image: &Mat) -> Result<Vec<Point2<f32>>> {
        let input = self.preprocess(face_image)?;
        let marks = self.forward(input)?;
        #[allow(clippy::cast_precision_loss)]
        let (width, height) = (face_image.cols() as f32, face_image.rows() as f32);
        Ok(self.postprocess(&marks, width, height))
    }

    /// Resize to the model input and convert to normalized RGB, NHWC
    #[allow(clippy::cast_sign_loss)]
    fn preprocess(&self, image: &Mat) -> Result<Array4<f32>> {
        let size = self.input_size as usize;
        let channels = 3;

        let mut resized = Mat::default();
        imgproc::resize(
            image,
            &mut resized,
            Size::new(self.input_size, self.input_size),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut rgb_image = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb_image, imgproc::COLOR_BGR2RGB, 0)?;

        let mut float_image = Mat::default();
        rgb_image.convert_to(&mut float_image, CV_32F, 1.0 / 255.0, 0.0)?;

        let mut data = Vec::with_capacity(size * size * channels);
        for row in 0..size {
            for col in 0..size {
                let pixel = float_image.at_2d::<Vec3f>(usize_to_i32(row)?, usize_to_i32(col)?)?;
                data.extend_from_slice(&pixel.0);
            }
        }

        Array4::from_shape_vec((1, size, size, channels), data)
            .map_err(|e| Error::ModelError(format!("Failed to create input tensor: {e}")))
    }

    fn forward(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let cow_array = CowArray::from(input.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;
        let marks_output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| Error::ModelError("No output from landmark model".to_string()))?;

        let marks_tensor = marks_output.try_extract::<f32>()?;
        let marks_view = marks_tensor.view();
        Ok(marks_view.iter().copied().collect())
    }

    /// Scale model output from input size to crop size
    #[allow(clippy::cast_precision_loss)]
    fn postprocess(&self, marks: &[f32], face_width: f32, face_height: f32) -> Vec<Point2<f32>> {
        let input_size = self.input_size as f32;
        marks
            .chunks_exact(2)
            .take(NUM_MODEL_LANDMARKS)
            .map(|xy| Point2::new(xy[0] * face_width / input_size, xy[1] * face_height / input_size))
            .collect()
    }
}

/// [`LandmarkEngine`] over `OpenCV` frames using [`MarkDetector`] and [`PoseEstimator`]
///
/// Confidence is a geometric consistency score in `[0, 1]`:
/// - after detection, the share of landmarks inside the crop times the share
///   of the landmark box covered by the detected face region
/// - while tracking, the share of landmarks inside the crop times the
///   overlap between the previous and the new landmark boxes
pub struct OnnxLandmarkEngine {
    marks: MarkDetector,
    model_points: Vec<Point3f>,
    pose: Option<PoseEstimator>,
    frame_size: (i32, i32),
    face_box_shift: f32,
    tracking_box_shift: f32,
}

impl OnnxLandmarkEngine {
    /// Load the landmark model and the 3D face model
    ///
    /// # Errors
    ///
    /// Returns an error if either model cannot be loaded
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        landmark_model: P,
        face_model_3d: Q,
        face_box_shift: f32,
        tracking_box_shift: f32,
    ) -> Result<Self> {
        Ok(Self {
            marks: MarkDetector::new(landmark_model)?,
            model_points: PoseEstimator::load_model_points(face_model_3d)?,
            pose: None,
            frame_size: (0, 0),
            face_box_shift,
            tracking_box_shift,
        })
    }

    /// Run the landmark model on a crop around `region`
    ///
    /// Returns the landmarks in frame pixels and the crop used.
    fn locate(&self, frame: &Mat, region: FaceRegion, shift: f32) -> Result<Option<(LandmarkSet, FaceRegion)>> {
        let crop = refine_region(region, frame.cols(), frame.rows(), shift);
        if crop.width <= 0 || crop.height <= 0 {
            return Ok(None);
        }

        let roi = Mat::roi(frame, crop.to_rect())?;
        let face = roi.try_clone()?;
        let points = self.marks.detect(&face)?;
        if points.len() != NUM_MODEL_LANDMARKS {
            log::debug!("Landmark model returned {} points", points.len());
            return Ok(None);
        }

        #[allow(clippy::cast_precision_loss)]
        let offset = (crop.x as f32, crop.y as f32);
        let in_frame: Vec<Point2<f32>> = points
            .iter()
            .map(|p| Point2::new(p.x + offset.0, p.y + offset.1))
            .collect();
        Ok(Some((to_layout(&in_frame)?, crop)))
    }
}

impl LandmarkEngine<Mat> for OnnxLandmarkEngine {
    fn align(&mut self, frame: &Mat, region: &FaceRegion) -> Result<Option<Alignment>> {
        let Some((landmarks, crop)) = self.locate(frame, *region, self.face_box_shift)? else {
            return Ok(None);
        };
        let coverage = FaceRegion::from_landmarks(&landmarks).coverage_by(region);
        let confidence = inside_fraction(&landmarks, &crop) * coverage;
        Ok(Some(Alignment { landmarks, confidence }))
    }

    fn track(&mut self, frame: &Mat, previous: &LandmarkSet) -> Result<Option<Alignment>> {
        let previous_box = FaceRegion::from_landmarks(previous);
        let Some((landmarks, crop)) = self.locate(frame, previous_box, self.tracking_box_shift)? else {
            return Ok(None);
        };
        let overlap = previous_box.iou(&FaceRegion::from_landmarks(&landmarks));
        let confidence = inside_fraction(&landmarks, &crop) * overlap;
        Ok(Some(Alignment { landmarks, confidence }))
    }

    fn head_rotation(&mut self, frame: &Mat, landmarks: &LandmarkSet) -> Result<Matrix3<f64>> {
        let size = (frame.cols(), frame.rows());
        if self.pose.is_none() || self.frame_size != size {
            self.pose = Some(PoseEstimator::new(&self.model_points, size.0, size.1)?);
            self.frame_size = size;
        }
        match &self.pose {
            Some(pose) => pose.estimate_rotation(landmarks),
            None => Err(Error::ModelError("Pose estimator not initialized".to_string())),
        }
    }
}
