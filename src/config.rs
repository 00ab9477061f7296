//! Configuration management for the face capture pipeline

use crate::{constants::*, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera configuration
    pub camera: CameraConfig,

    /// Face region detector configuration
    pub detection: DetectionConfig,

    /// Landmark tracking configuration
    pub tracking: TrackingConfig,

    /// Smoothing and remapping configuration
    pub smoothing: SmoothingConfig,

    /// Render loop configuration
    pub render: RenderConfig,

    /// Model file paths
    pub models: ModelConfig,
}

/// Camera configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera device index
    pub device: i32,

    /// Extra wait after each accepted frame, in milliseconds
    pub capture_delay_ms: u64,
}

/// Haar cascade parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Pyramid scale step (> 1.0)
    pub scale_step: f64,

    /// Neighbouring candidates required to keep a detection
    pub min_neighbors: i32,

    /// Smallest face side in pixels
    pub min_face_size: i32,

    /// Wait after a frame without a face, in milliseconds
    pub backoff_ms: u64,
}

/// Landmark tracking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Landmarks scored at or below this are discarded (0.0-1.0)
    pub confidence_threshold: f32,

    /// Expansion of the detected face box before landmark alignment
    pub face_box_shift: f32,

    /// Expansion of the previous landmark box while tracking
    pub tracking_box_shift: f32,
}

/// Normalization range for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelBounds {
    pub lower: f32,
    pub upper: f32,
}

impl ChannelBounds {
    #[must_use]
    pub const fn new(lower: f32, upper: f32) -> Self {
        Self { lower, upper }
    }
}

/// Smoothing rates, gains and normalization bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Slow lerp rate in 1/s
    pub rate_slow: f32,

    /// Medium lerp rate in 1/s
    pub rate_medium: f32,

    /// Fast lerp rate in 1/s
    pub rate_fast: f32,

    /// Multiplier applied to raw AngleY
    pub angle_y_gain: f32,

    /// Body angle as a fraction of the smoothed head angle
    pub body_angle_x_factor: f32,
    pub body_angle_y_factor: f32,
    pub body_angle_z_factor: f32,

    /// Eye aspect ratio range
    pub eye_open: ChannelBounds,

    /// Inner lip gap range, in scaled pixels
    pub mouth_open: ChannelBounds,

    /// Mouth width range, in scaled pixels
    pub mouth_form: ChannelBounds,

    /// AngleY range mapped onto eye form
    pub eye_form: ChannelBounds,

    /// Eyebrow to nose distance range, in scaled pixels
    pub brow_y: ChannelBounds,

    /// Drive both eyes from the average eye aspect ratio
    pub equalize_eyes: bool,

    /// Drive the eyeballs from the desktop pointer
    pub eyeball_follow_cursor: bool,
}

/// Render loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Target framerate
    pub target_fps: u32,

    /// Seconds between status log lines, 0 to disable
    pub status_interval_secs: u64,
}

/// Model file paths configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the Haar cascade XML file
    pub face_cascade: PathBuf,

    /// Path to facial landmarks ONNX model
    pub face_landmarks: PathBuf,

    /// Path to 3D face model points
    pub face_model_3d: PathBuf,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: 0,
            capture_delay_ms: 0,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            scale_step: DEFAULT_DETECTION_SCALE_STEP,
            min_neighbors: DEFAULT_DETECTION_MIN_NEIGHBORS,
            min_face_size: DEFAULT_DETECTION_MIN_FACE,
            backoff_ms: DEFAULT_DETECTION_BACKOFF_MS,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            face_box_shift: FACE_BOX_SHIFT,
            tracking_box_shift: TRACKING_BOX_SHIFT,
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            rate_slow: DEFAULT_RATE_SLOW,
            rate_medium: DEFAULT_RATE_MEDIUM,
            rate_fast: DEFAULT_RATE_FAST,
            angle_y_gain: DEFAULT_ANGLE_Y_GAIN,
            body_angle_x_factor: DEFAULT_BODY_ANGLE_X_FACTOR,
            body_angle_y_factor: DEFAULT_BODY_ANGLE_Y_FACTOR,
            body_angle_z_factor: DEFAULT_BODY_ANGLE_Z_FACTOR,
            eye_open: ChannelBounds::new(0.13, 0.23),
            mouth_open: ChannelBounds::new(3.5, 14.0),
            mouth_form: ChannelBounds::new(71.0, 85.0),
            eye_form: ChannelBounds::new(-20.0, 10.0),
            brow_y: ChannelBounds::new(45.0, 53.0),
            equalize_eyes: true,
            eyeball_follow_cursor: true,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            status_interval_secs: 2,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            face_cascade: PathBuf::from("assets/haarcascade_frontalface_alt2.xml"),
            face_landmarks: PathBuf::from("assets/face_landmarks.onnx"),
            face_model_3d: PathBuf::from("assets/model.txt"),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] naming the first invalid value
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.tracking.confidence_threshold) {
            return Err(Error::ConfigError(
                "Confidence threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.detection.scale_step <= 1.0 {
            return Err(Error::ConfigError("Detection scale step must be greater than 1.0".to_string()));
        }
        if self.detection.min_face_size <= 0 {
            return Err(Error::ConfigError("Minimum face size must be greater than 0".to_string()));
        }
        if self.detection.min_neighbors < 0 {
            return Err(Error::ConfigError("Minimum neighbours must not be negative".to_string()));
        }

        let s = &self.smoothing;
        for (name, rate) in [("slow", s.rate_slow), ("medium", s.rate_medium), ("fast", s.rate_fast)] {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(Error::ConfigError(format!("Smoothing rate '{name}' must be greater than 0")));
            }
        }
        for (name, bounds) in [
            ("eye_open", s.eye_open),
            ("mouth_open", s.mouth_open),
            ("mouth_form", s.mouth_form),
            ("eye_form", s.eye_form),
            ("brow_y", s.brow_y),
        ] {
            if !(bounds.upper > bounds.lower) {
                return Err(Error::ConfigError(format!(
                    "Bounds '{name}' must have upper greater than lower"
                )));
            }
        }

        if self.render.target_fps == 0 {
            return Err(Error::ConfigError("Target FPS must be greater than 0".to_string()));
        }

        Ok(())
    }

    /// Check that every model file exists
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] naming the first missing file
    pub fn check_model_files(&self) -> Result<()> {
        for (name, path) in [
            ("Face cascade", &self.models.face_cascade),
            ("Face landmarks model", &self.models.face_landmarks),
            ("3D face model", &self.models.face_model_3d),
        ] {
            if !path.exists() {
                return Err(Error::ConfigError(format!("{name} not found: {}", path.display())));
            }
        }
        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Avatar Face Capture Configuration

camera:
  device: 0
  capture_delay_ms: 0

# Haar cascade face detector
detection:
  scale_step: 1.2
  min_neighbors: 2
  min_face_size: 150
  backoff_ms: 100

tracking:
  confidence_threshold: 0.5
  face_box_shift: 0.2
  tracking_box_shift: 0.35

# Rates are in 1/s, bounds in scaled pixels unless noted
smoothing:
  rate_slow: 5.0
  rate_medium: 10.0
  rate_fast: 15.0
  angle_y_gain: 1.3
  body_angle_x_factor: 0.2
  body_angle_y_factor: 0.25
  body_angle_z_factor: 0.2
  eye_open: { lower: 0.13, upper: 0.23 }
  mouth_open: { lower: 3.5, upper: 14.0 }
  mouth_form: { lower: 71.0, upper: 85.0 }
  eye_form: { lower: -20.0, upper: 10.0 }
  brow_y: { lower: 45.0, upper: 53.0 }
  equalize_eyes: true
  eyeball_follow_cursor: true

render:
  target_fps: 60
  status_interval_secs: 2

models:
  face_cascade: "assets/haarcascade_frontalface_alt2.xml"
  face_landmarks: "assets/face_landmarks.onnx"
  face_model_3d: "assets/model.txt"
"#;
