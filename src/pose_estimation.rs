use crate::{
    constants::{MODEL_POINTS_TOTAL_VALUES, NUM_LANDMARKS, NUM_MODEL_LANDMARKS},
    geometry::LandmarkSet,
    mark_detection::MODEL_TO_LAYOUT,
    utils::safe_cast::usize_to_i32,
    Error, Result,
};
use nalgebra::Matrix3;
use opencv::{
    calib3d,
    core::{Mat, Point2f, Point3f, Vector, CV_64F},
    prelude::*,
};
use std::fs;
use std::path::Path;

/// Head rotation solver using the `PnP` algorithm against a 3D face model
pub struct PoseEstimator {
    model_points: Vector<Point3f>,
    camera_matrix: Mat,
    dist_coeffs: Mat,
}

impl PoseEstimator {
    /// Create an estimator for frames of the given size
    ///
    /// The camera is approximated with focal length equal to the frame
    /// width, principal point at the frame centre and no lens distortion.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `model_points` does not hold one point per tracked landmark
    /// - `OpenCV` matrix construction fails
    pub fn new(model_points: &[Point3f], image_width: i32, image_height: i32) -> Result<Self> {
        if model_points.len() != NUM_LANDMARKS {
            return Err(Error::ModelValidationError(format!(
                "Expected {} model points, got {}",
                NUM_LANDMARKS,
                model_points.len()
            )));
        }
        log::debug!("Initializing PoseEstimator for {image_width}x{image_height} frames");

        let focal_length = f64::from(image_width);
        let center = (f64::from(image_width) / 2.0, f64::from(image_height) / 2.0);
        let camera_matrix = Mat::from_slice_2d(&[
            [focal_length, 0.0, center.0],
            [0.0, focal_length, center.1],
            [0.0, 0.0, 1.0],
        ])?;
        let dist_coeffs = Mat::zeros(4, 1, CV_64F)?.to_mat()?;

        Ok(Self {
            model_points: model_points.iter().copied().collect(),
            camera_matrix,
            dist_coeffs,
        })
    }

    /// Read the 68-point model file and keep the tracked subset
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or has the wrong number of values
    pub fn load_model_points<P: AsRef<Path>>(model_path: P) -> Result<Vec<Point3f>> {
        log::info!("Loading 3D face model: {}", model_path.as_ref().display());
        let content = fs::read_to_string(model_path)?;
        let points = Self::parse_model_points(&content)?;
        Ok(MODEL_TO_LAYOUT.iter().map(|&i| points[i]).collect())
    }

    /// Head rotation for a landmark set
    ///
    /// # Errors
    ///
    /// Returns an error if the solver fails or its output cannot be read
    pub fn estimate_rotation(&self, landmarks: &LandmarkSet) -> Result<Matrix3<f64>> {
        let image_points: Vector<Point2f> = landmarks.points().iter().map(|p| Point2f::new(p.x, p.y)).collect();

        let mut rvec = Mat::default();
        let mut tvec = Mat::default();
        let solved = calib3d::solve_pnp(
            &self.model_points,
            &image_points,
            &self.camera_matrix,
            &self.dist_coeffs,
            &mut rvec,
            &mut tvec,
            false,
            calib3d::SOLVEPNP_ITERATIVE,
        )?;
        if !solved {
            return Err(Error::DegenerateGeometry("PnP solver did not converge".to_string()));
        }

        let mut rotation_matrix = Mat::default();
        calib3d::rodrigues(&rvec, &mut rotation_matrix, &mut Mat::default())?;

        let mut rotation = Matrix3::zeros();
        for row in 0..3 {
            for col in 0..3 {
                rotation[(row, col)] = *rotation_matrix.at_2d::<f64>(usize_to_i32(row)?, usize_to_i32(col)?)?;
            }
        }
        Ok(rotation)
    }

    /// Parse 3D model points from text, one value per line in x, y, z order
    fn parse_model_points(content: &str) -> Result<Vec<Point3f>> {
        let values: Vec<f32> = content
            .lines()
            .filter_map(|line| line.trim().parse::<f32>().ok())
            .collect();

        if values.len() != MODEL_POINTS_TOTAL_VALUES {
            return Err(Error::ModelValidationError(format!(
                "Expected {} coordinate values ({} points × 3), got {}",
                MODEL_POINTS_TOTAL_VALUES,
                NUM_MODEL_LANDMARKS,
                values.len()
            )));
        }

        Ok(values
            .chunks_exact(3)
            .map(|xyz| Point3f::new(xyz[0], xyz[1], xyz[2]))
            .collect())
    }
}
