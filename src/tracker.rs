//! Detect-then-track landmark state machine.
//!
//! The tracker is in one of two modes. In [`TrackingMode::Detecting`] it
//! looks for a face region and aligns landmarks inside it; in
//! [`TrackingMode::Tracking`] it follows the previous landmarks without
//! running the detector. A result is accepted only when its confidence
//! is above the threshold; anything else drops back to detection.

use crate::{
    constants::DEFAULT_CONFIDENCE_THRESHOLD,
    face_detection::FaceRegion,
    geometry::{feature_metrics, FeatureMetrics, HeadPose, LandmarkSet},
    Result,
};
use nalgebra::Matrix3;

/// Finds the first face region in a frame
pub trait FaceRegionDetector<F> {
    /// First detected region, or `None` when the frame has no face
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    fn detect_first(&mut self, frame: &F) -> Result<Option<FaceRegion>>;
}

/// Landmark alignment and tracking backend
///
/// `Ok(None)` from [`align`](Self::align) or [`track`](Self::track) means the
/// backend produced no landmarks for this frame.
pub trait LandmarkEngine<F> {
    /// Fit landmarks inside a detected region
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    fn align(&mut self, frame: &F, region: &FaceRegion) -> Result<Option<Alignment>>;

    /// Follow landmarks from the previous frame
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails
    fn track(&mut self, frame: &F, previous: &LandmarkSet) -> Result<Option<Alignment>>;

    /// Head rotation for accepted landmarks
    ///
    /// # Errors
    ///
    /// Returns an error if the rotation cannot be solved
    fn head_rotation(&mut self, frame: &F, landmarks: &LandmarkSet) -> Result<Matrix3<f64>>;
}

/// Landmarks plus the backend's confidence in them
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub landmarks: LandmarkSet,
    pub confidence: f32,
}

/// Current tracker mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingMode {
    #[default]
    Detecting,
    Tracking,
}

/// One accepted face observation
#[derive(Debug, Clone, PartialEq)]
pub struct FaceSample {
    pub landmarks: LandmarkSet,
    pub pose: HeadPose,
    pub metrics: FeatureMetrics,
    pub confidence: f32,
}

/// Result of one tracker step
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    /// Landmarks accepted and measured
    Updated(FaceSample),
    /// Detector found no face
    NoFace,
    /// Landmarks missing or confidence at or below the threshold
    Rejected { confidence: f32 },
    /// Landmarks accepted but their geometry could not be measured
    Degenerate,
}

/// Face landmark tracker over frames of type `F`
pub struct LandmarkTracker<D, E> {
    detector: D,
    engine: E,
    mode: TrackingMode,
    landmarks: Option<LandmarkSet>,
    confidence_threshold: f32,
}

impl<D, E> LandmarkTracker<D, E> {
    /// Create a tracker in detection mode with the default threshold
    pub fn new(detector: D, engine: E) -> Self {
        Self {
            detector,
            engine,
            mode: TrackingMode::Detecting,
            landmarks: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    /// Set the acceptance threshold
    #[must_use]
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    #[must_use]
    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    /// Last accepted landmarks, if still tracking
    #[must_use]
    pub fn landmarks(&self) -> Option<&LandmarkSet> {
        self.landmarks.as_ref()
    }

    /// Drop tracked state and return to detection
    pub fn reset(&mut self) {
        self.mode = TrackingMode::Detecting;
        self.landmarks = None;
    }

    /// Process one frame
    ///
    /// Backend errors reset the tracker to detection before being returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the detector or landmark engine fails
    pub fn step<F>(&mut self, frame: &F) -> Result<TrackOutcome>
    where
        D: FaceRegionDetector<F>,
        E: LandmarkEngine<F>,
    {
        let outcome = self.try_step(frame);
        if !matches!(outcome, Ok(TrackOutcome::Updated(_))) {
            if self.mode == TrackingMode::Tracking {
                log::info!("Face lost, returning to detection");
            }
            self.reset();
        }
        outcome
    }

    fn try_step<F>(&mut self, frame: &F) -> Result<TrackOutcome>
    where
        D: FaceRegionDetector<F>,
        E: LandmarkEngine<F>,
    {
        let alignment = match (self.mode, self.landmarks.as_ref()) {
            (TrackingMode::Tracking, Some(previous)) => self.engine.track(frame, previous)?,
            _ => match self.detector.detect_first(frame)? {
                Some(region) => self.engine.align(frame, &region)?,
                None => return Ok(TrackOutcome::NoFace),
            },
        };

        let Some(Alignment { landmarks, confidence }) = alignment else {
            return Ok(TrackOutcome::Rejected { confidence: 0.0 });
        };
        // NaN fails this comparison too
        if !(confidence > self.confidence_threshold) {
            log::debug!("Landmarks rejected with confidence {confidence:.3}");
            return Ok(TrackOutcome::Rejected { confidence });
        }

        let metrics = match feature_metrics(&landmarks) {
            Ok(metrics) => metrics,
            Err(e) => {
                log::debug!("Skipping frame: {e}");
                return Ok(TrackOutcome::Degenerate);
            }
        };
        let rotation = self.engine.head_rotation(frame, &landmarks)?;

        if self.mode == TrackingMode::Detecting {
            log::info!("Face acquired (confidence {confidence:.2})");
        }
        self.mode = TrackingMode::Tracking;
        self.landmarks = Some(landmarks.clone());

        Ok(TrackOutcome::Updated(FaceSample {
            landmarks,
            pose: HeadPose::from_rotation(rotation),
            metrics,
            confidence,
        }))
    }
}
