//! Constants used throughout the pipeline

/// Number of points in the tracked landmark layout
pub const NUM_LANDMARKS: usize = 49;

/// Number of points produced by the 68-point landmark model
pub const NUM_MODEL_LANDMARKS: usize = 68;

/// Total number of 3D model coordinates (68 points × 3 dimensions)
pub const MODEL_POINTS_TOTAL_VALUES: usize = 204;

/// Nose height in pixels that maps to a distance scale of exactly 1.0
pub const REFERENCE_NOSE_HEIGHT: f32 = 80.0;

/// Upper bound of the folded distance scale
pub const MAX_DIST_SCALE: f32 = 1.5;

/// Lower bound of the folded distance scale
pub const MIN_DIST_SCALE: f32 = 0.0;

/// Landmarks scored at or below this are discarded
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Wait after a frame with no face before detecting again
pub const DEFAULT_DETECTION_BACKOFF_MS: u64 = 100;

/// Pause after a read that produced no frame
pub const EMPTY_FRAME_WAIT_MS: u64 = 2;

/// Haar cascade pyramid scale step
pub const DEFAULT_DETECTION_SCALE_STEP: f64 = 1.2;

/// Haar cascade neighbour count required to keep a candidate
pub const DEFAULT_DETECTION_MIN_NEIGHBORS: i32 = 2;

/// Smallest face side, in pixels, the cascade will report
pub const DEFAULT_DETECTION_MIN_FACE: i32 = 150;

/// Render loop frame rate cap
pub const DEFAULT_TARGET_FPS: u32 = 60;

/// Lerp rates per speed class, in 1/s
pub const DEFAULT_RATE_SLOW: f32 = 5.0;
pub const DEFAULT_RATE_MEDIUM: f32 = 10.0;
pub const DEFAULT_RATE_FAST: f32 = 15.0;

/// Multiplier applied to raw AngleY before smoothing
pub const DEFAULT_ANGLE_Y_GAIN: f32 = 1.3;

/// Body angle as a fraction of head angle
pub const DEFAULT_BODY_ANGLE_X_FACTOR: f32 = 0.2;
pub const DEFAULT_BODY_ANGLE_Y_FACTOR: f32 = 0.25;
pub const DEFAULT_BODY_ANGLE_Z_FACTOR: f32 = 0.2;

/// Face box expansion used to crop the landmark model input
pub const FACE_BOX_SHIFT: f32 = 0.2;

/// Landmark box expansion used to crop while tracking
///
/// The landmark box has no forehead or jaw, so it grows more than a
/// detected face box.
pub const TRACKING_BOX_SHIFT: f32 = 0.35;
