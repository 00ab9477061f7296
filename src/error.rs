//! Error types for the face capture pipeline.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// `ONNX` Runtime inference failed
    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::OrtError),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Camera could not be opened or produced no frame
    #[error("Camera error: {0}")]
    Camera(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model loading or inference error
    #[error("Model error: {0}")]
    ModelError(String),

    /// Model validation error (wrong number of points, etc.)
    #[error("Model validation error: {0}")]
    ModelValidationError(String),

    /// Landmark geometry has a zero or non-finite denominator
    #[error("Degenerate landmark geometry: {0}")]
    DegenerateGeometry(String),

    /// Rig parameter binding error
    #[error("Binding error: {0}")]
    Binding(String),

    /// Capture thread could not be started or joined
    #[error("Capture thread error: {0}")]
    CaptureThread(String),

    /// Pointer query failed
    #[error("Cursor control error: {0}")]
    CursorControl(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
