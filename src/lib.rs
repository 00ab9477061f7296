//! Webcam face tracking that drives 2D avatar rig parameters in real time.
//!
//! The pipeline consists of:
//! 1. A capture thread reading camera frames
//! 2. A detect-then-track landmark state machine (Haar cascade + `ONNX` landmarks)
//! 3. Head pose and facial feature metrics from the landmark geometry
//! 4. Frame-rate independent smoothing into an optimized parameter vector
//! 5. A binding table that feeds face or slider values into the rig each tick
//!
//! # Examples
//!
//! ## Metrics from landmarks
//!
//! ```no_run
//! use avatar_face_capture::geometry::{feature_metrics, LandmarkSet};
//! use nalgebra::Point2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let points = vec![Point2::new(0.0, 0.0); 49];
//! let landmarks = LandmarkSet::new(points)?;
//! let metrics = feature_metrics(&landmarks)?;
//! println!("EAR {:.2}, mouth open {:.1}", metrics.ear, metrics.mouth_open_y);
//! # Ok(())
//! # }
//! ```
//!
//! ## Driving a rig
//!
//! ```no_run
//! use avatar_face_capture::{app::AvatarApp, config::Config, rig::StandaloneRig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut app = AvatarApp::new(Config::default());
//! app.load_model(Box::new(StandaloneRig::with_default_parameters()));
//! app.open_camera()?;
//! app.run(Some(600))?;
//! # Ok(())
//! # }
//! ```

/// Head pose and facial feature metrics
pub mod geometry;

/// Detect-then-track landmark state machine
pub mod tracker;

/// Haar cascade face region detection
pub mod face_detection;

/// `ONNX` facial landmark model and landmark engine
pub mod mark_detection;

/// Head rotation using the `PnP` algorithm
pub mod pose_estimation;

/// Camera frame sources
pub mod camera;

/// Parameter channels and the optimized parameter vector
pub mod parameters;

/// Smoothing and remapping of metrics into parameters
pub mod smoothing;

/// Rig parameter binding registry
pub mod binding;

/// Rig collaborator interface
pub mod rig;

/// Capture thread and shared face state
pub mod capture;

/// Render frame rate cap
pub mod frame_limiter;

/// Application context
pub mod app;

/// Desktop pointer queries for X11 systems
pub mod cursor_control;

/// Region helpers and safe casts
pub mod utils;

/// Error types and result handling
pub mod error;

/// Constants used throughout the pipeline
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
