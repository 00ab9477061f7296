//! Application context tying capture, remapping, binding and the rig together.
//!
//! [`AvatarApp`] is owned by the render thread. Camera open and close and
//! model load and unload are the only points where bindings change.

use crate::{
    binding::{BindingTable, ManualParameters},
    camera::{FrameSource, OpenCvCamera},
    capture::{CaptureOptions, CaptureSession, FaceState, SharedFaceState},
    config::Config,
    cursor_control::PointerSource,
    face_detection::HaarFaceDetector,
    frame_limiter::FrameLimiter,
    mark_detection::OnnxLandmarkEngine,
    parameters::{Channel, ChannelIndex, ParameterVector},
    rig::Rig,
    smoothing::ParameterRemapper,
    tracker::{FaceRegionDetector, LandmarkEngine, LandmarkTracker},
    Result,
};
use log::{debug, info};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Face capture to rig pipeline
pub struct AvatarApp {
    config: Config,
    rig: Option<Box<dyn Rig>>,
    channels: ChannelIndex,
    bindings: BindingTable,
    manual: ManualParameters,
    remapper: ParameterRemapper,
    parameters: ParameterVector,
    shared: Arc<SharedFaceState>,
    capture: Option<CaptureSession>,
    pointer: Option<Box<dyn PointerSource>>,
}

impl AvatarApp {
    #[must_use]
    pub fn new(config: Config) -> Self {
        info!("Initializing avatar face capture");
        Self {
            remapper: ParameterRemapper::new(config.smoothing.clone()),
            config,
            rig: None,
            channels: ChannelIndex::default(),
            bindings: BindingTable::new(),
            manual: ManualParameters::default(),
            parameters: ParameterVector::new(),
            shared: Arc::new(SharedFaceState::new()),
            capture: None,
            pointer: None,
        }
    }

    /// Use `pointer` to drive the eyeballs
    #[must_use]
    pub fn with_pointer(mut self, pointer: Box<dyn PointerSource>) -> Self {
        self.pointer = Some(pointer);
        self
    }

    /// Replace the rig, rebuilding every binding for it
    ///
    /// Every rig parameter is bound to its manual slider; matched channels
    /// are then rebound to face capture if the camera is open.
    pub fn load_model(&mut self, rig: Box<dyn Rig>) {
        self.bindings.clear();
        self.channels = ChannelIndex::from_names(rig.parameter_names());
        self.manual = ManualParameters::from_rig(rig.as_ref());
        self.bindings.bind_all_with_gui(rig.parameter_count());
        info!(
            "Model loaded: {} parameters, {} face channels matched",
            rig.parameter_count(),
            self.channels.matched()
        );
        for channel in Channel::ALL {
            if self.channels.get(channel).is_none() {
                debug!("Rig has no parameter for {channel}");
            }
        }

        if self.capture.is_some() {
            self.bindings.bind_defaults_with_face(&self.channels);
        }
        self.rig = Some(rig);
    }

    /// Remove the rig and every binding
    pub fn unload_model(&mut self) -> Option<Box<dyn Rig>> {
        self.bindings.clear();
        self.channels = ChannelIndex::default();
        self.manual = ManualParameters::default();
        self.rig.take()
    }

    /// Open the configured camera and start tracking on a capture thread
    ///
    /// # Errors
    ///
    /// Returns an error if a model or the camera cannot be opened
    pub fn open_camera(&mut self) -> Result<()> {
        let d = &self.config.detection;
        let t = &self.config.tracking;
        let m = &self.config.models;

        let detector = HaarFaceDetector::new(&m.face_cascade, d.scale_step, d.min_neighbors, d.min_face_size)?;
        let engine = OnnxLandmarkEngine::new(&m.face_landmarks, &m.face_model_3d, t.face_box_shift, t.tracking_box_shift)?;
        let tracker = LandmarkTracker::new(detector, engine).with_confidence_threshold(t.confidence_threshold);

        let camera = OpenCvCamera::open(self.config.camera.device)?;
        self.start_capture(camera, tracker)
    }

    /// Start tracking frames from `source` on a capture thread
    ///
    /// A running capture is closed first. Matched channels are bound to
    /// face capture.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture thread cannot be started
    pub fn start_capture<S, D, E>(&mut self, source: S, tracker: LandmarkTracker<D, E>) -> Result<()>
    where
        S: FrameSource + Send + 'static,
        D: FaceRegionDetector<S::Frame> + Send + 'static,
        E: LandmarkEngine<S::Frame> + Send + 'static,
    {
        self.close_camera()?;

        let options = CaptureOptions {
            detection_backoff: Duration::from_millis(self.config.detection.backoff_ms),
            tracking_delay: Duration::from_millis(self.config.camera.capture_delay_ms),
        };
        self.capture = Some(CaptureSession::start(source, tracker, Arc::clone(&self.shared), options)?);

        if self.rig.is_some() {
            self.bindings.bind_defaults_with_face(&self.channels);
        }
        Ok(())
    }

    /// Stop the capture thread and hand matched channels back to the sliders
    ///
    /// # Errors
    ///
    /// Returns an error if the capture thread panicked
    pub fn close_camera(&mut self) -> Result<()> {
        let Some(session) = self.capture.take() else {
            return Ok(());
        };
        let stopped = session.stop();
        if self.rig.is_some() {
            self.bindings.bind_defaults_with_gui(&self.channels);
        }
        info!("Camera closed");
        stopped
    }

    /// True while a capture session exists
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Advance one render tick
    ///
    /// While capturing with a detected face the parameter vector moves
    /// toward the latest sample; otherwise it holds its values. Bound values
    /// are then written into the rig before the rig animates.
    pub fn update(&mut self, delta_time: f32) {
        if self.capture.is_some() {
            if let Some(sample) = self.shared.detected_sample() {
                self.remapper.update(&mut self.parameters, &sample, delta_time);
                self.follow_pointer();
            }
        }

        if let Some(rig) = self.rig.as_deref_mut() {
            self.bindings.apply(rig, &self.parameters, &self.manual);
            rig.update(delta_time);
        }
    }

    fn follow_pointer(&mut self) {
        if !self.remapper.config().eyeball_follow_cursor {
            return;
        }
        if let Some(pointer) = self.pointer.as_mut() {
            match pointer.sample() {
                Ok(sample) => self.remapper.update_eyeballs(&mut self.parameters, &sample),
                Err(e) => debug!("Pointer query failed: {e}"),
            }
        }
    }

    /// Run the render loop at the configured frame rate
    ///
    /// Runs `max_frames` ticks, or forever when `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the capture thread cannot be stopped cleanly
    pub fn run(&mut self, max_frames: Option<u64>) -> Result<()> {
        let mut limiter = FrameLimiter::new(self.config.render.target_fps);
        let status_interval = Duration::from_secs(self.config.render.status_interval_secs);
        let mut last_status = Instant::now();
        let mut frames = 0u64;

        info!("Entering render loop at {} FPS", self.config.render.target_fps);
        while max_frames.map_or(true, |max| frames < max) {
            let delta_time = limiter.wait();
            self.update(delta_time);
            frames += 1;

            if !status_interval.is_zero() && last_status.elapsed() >= status_interval {
                self.log_status();
                last_status = Instant::now();
            }
        }
        info!("Render loop finished after {frames} frames");

        self.close_camera()
    }

    fn log_status(&self) {
        let state = self.shared.snapshot();
        let p = &self.parameters;
        info!(
            "face {} | angle ({:.1}, {:.1}, {:.1}) mouth {:.2} eyes ({:.2}, {:.2}) | capture {:.1} FPS, {} frames, {} empty",
            if state.detected { "tracked" } else { "lost" },
            p.get(Channel::AngleX),
            p.get(Channel::AngleY),
            p.get(Channel::AngleZ),
            p.get(Channel::MouthOpenY),
            p.get(Channel::EyeLOpen),
            p.get(Channel::EyeROpen),
            state.detection_fps,
            state.frames_processed,
            state.frames_empty,
        );
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current optimized parameter vector
    #[must_use]
    pub fn parameters(&self) -> &ParameterVector {
        &self.parameters
    }

    #[must_use]
    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    #[must_use]
    pub fn channel_index(&self) -> &ChannelIndex {
        &self.channels
    }

    /// Manual slider values
    pub fn manual_mut(&mut self) -> &mut ManualParameters {
        &mut self.manual
    }

    #[must_use]
    pub fn rig(&self) -> Option<&dyn Rig> {
        self.rig.as_deref()
    }

    /// Copy of the capture thread's face state
    #[must_use]
    pub fn face_state(&self) -> FaceState {
        self.shared.snapshot()
    }

    pub fn set_equalize_eyes(&mut self, enabled: bool) {
        self.remapper.set_equalize_eyes(enabled);
    }

    pub fn set_eyeball_follow_cursor(&mut self, enabled: bool) {
        self.remapper.set_eyeball_follow_cursor(enabled);
    }
}
