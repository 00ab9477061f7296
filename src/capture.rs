//! Capture thread and the face state it shares with the render thread.
//!
//! The capture thread owns the frame source and the tracker. It publishes
//! each accepted [`FaceSample`] into a [`SharedFaceState`]; the render thread
//! takes a copy under the same lock. Stopping closes a channel, which both
//! ends the loop at its next iteration and wakes any backoff wait.

use crate::{
    camera::FrameSource,
    constants::EMPTY_FRAME_WAIT_MS,
    tracker::{FaceRegionDetector, FaceSample, LandmarkEngine, LandmarkTracker, TrackOutcome},
    Error, Result,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Face state visible to the render thread
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceState {
    /// Last accepted sample
    pub latest: Option<FaceSample>,
    /// True while the last processed frame produced an accepted sample
    pub detected: bool,
    /// True if the last read returned no frame
    pub frame_empty: bool,
    /// Frames read and run through the tracker
    pub frames_processed: u64,
    /// Reads that returned no frame or failed
    pub frames_empty: u64,
    /// Accepted samples
    pub samples_published: u64,
    /// Frames processed per second, measured over about one second
    pub detection_fps: f32,
}

/// Lock-guarded [`FaceState`]
#[derive(Debug, Default)]
pub struct SharedFaceState {
    inner: Mutex<FaceState>,
}

impl SharedFaceState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FaceState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store an accepted sample
    pub fn publish(&self, sample: FaceSample) {
        let mut state = self.lock();
        state.latest = Some(sample);
        state.detected = true;
        state.frame_empty = false;
        state.frames_processed += 1;
        state.samples_published += 1;
    }

    /// Record a processed frame without an accepted sample
    pub fn mark_lost(&self) {
        let mut state = self.lock();
        state.detected = false;
        state.frame_empty = false;
        state.frames_processed += 1;
    }

    /// Record a read that produced no frame
    pub fn record_empty_frame(&self) {
        let mut state = self.lock();
        state.frame_empty = true;
        state.frames_empty += 1;
    }

    fn set_detection_fps(&self, fps: f32) {
        self.lock().detection_fps = fps;
    }

    /// Forget the face, keeping the counters
    pub fn clear_detection(&self) {
        let mut state = self.lock();
        state.detected = false;
        state.latest = None;
    }

    /// Copy of the whole state
    #[must_use]
    pub fn snapshot(&self) -> FaceState {
        self.lock().clone()
    }

    /// Latest sample, only while the face is detected
    #[must_use]
    pub fn detected_sample(&self) -> Option<FaceSample> {
        let state = self.lock();
        if state.detected {
            state.latest.clone()
        } else {
            None
        }
    }
}

/// Capture loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Wait after a frame without a face
    pub detection_backoff: Duration,
    /// Wait after an accepted frame
    pub tracking_delay: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            detection_backoff: Duration::from_millis(crate::constants::DEFAULT_DETECTION_BACKOFF_MS),
            tracking_delay: Duration::ZERO,
        }
    }
}

/// Running capture thread
pub struct CaptureSession {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    shared: Arc<SharedFaceState>,
}

impl CaptureSession {
    /// Spawn the capture thread
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureThread`] if the thread cannot be spawned
    pub fn start<S, D, E>(
        source: S,
        tracker: LandmarkTracker<D, E>,
        shared: Arc<SharedFaceState>,
        options: CaptureOptions,
    ) -> Result<Self>
    where
        S: FrameSource + Send + 'static,
        D: FaceRegionDetector<S::Frame> + Send + 'static,
        E: LandmarkEngine<S::Frame> + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let thread_state = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("face-capture".to_string())
            .spawn(move || run_capture_loop(source, tracker, &thread_state, options, &stop_rx))
            .map_err(|e| Error::CaptureThread(format!("Failed to spawn capture thread: {e}")))?;
        info!("Face capture thread created");

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            shared,
        })
    }

    /// True until the capture loop has exited
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Shared state this session publishes into
    #[must_use]
    pub fn shared(&self) -> &Arc<SharedFaceState> {
        &self.shared
    }

    /// Stop the thread and wait for it; the frame source is released on exit
    ///
    /// # Errors
    ///
    /// Returns [`Error::CaptureThread`] if the thread panicked
    pub fn stop(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        // Closing the channel is the stop signal
        drop(self.stop_tx.take());
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        info!("Stopping face capture thread");
        let joined = handle.join();
        self.shared.clear_detection();
        joined.map_err(|_| Error::CaptureThread("Capture thread panicked".to_string()))
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("{e}");
        }
    }
}

fn stop_requested(stop: &Receiver<()>) -> bool {
    !matches!(stop.try_recv(), Err(TryRecvError::Empty))
}

/// Sleep for `wait` unless stopped first; true if stopped
fn wait_or_stop(stop: &Receiver<()>, wait: Duration) -> bool {
    if wait.is_zero() {
        return false;
    }
    !matches!(stop.recv_timeout(wait), Err(RecvTimeoutError::Timeout))
}

/// Drive the tracker until `stop` is closed or sent to
///
/// Read failures are treated as empty frames and never end the loop. Each
/// empty read is followed by a short wait so a dead device does not spin.
pub fn run_capture_loop<S, D, E>(
    mut source: S,
    mut tracker: LandmarkTracker<D, E>,
    shared: &SharedFaceState,
    options: CaptureOptions,
    stop: &Receiver<()>,
) where
    S: FrameSource,
    D: FaceRegionDetector<S::Frame>,
    E: LandmarkEngine<S::Frame>,
{
    info!("Face capture loop started");
    let empty_wait = Duration::from_millis(EMPTY_FRAME_WAIT_MS);
    let mut window_start = Instant::now();
    let mut window_frames = 0u32;

    while !stop_requested(stop) {
        let frame = match source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                shared.record_empty_frame();
                if wait_or_stop(stop, empty_wait) {
                    break;
                }
                continue;
            }
            Err(e) => {
                debug!("Frame read failed: {e}");
                shared.record_empty_frame();
                if wait_or_stop(stop, empty_wait) {
                    break;
                }
                continue;
            }
        };

        let wait = match tracker.step(&frame) {
            Ok(TrackOutcome::Updated(sample)) => {
                shared.publish(sample);
                options.tracking_delay
            }
            Ok(TrackOutcome::NoFace) => {
                shared.mark_lost();
                options.detection_backoff
            }
            Ok(TrackOutcome::Rejected { .. } | TrackOutcome::Degenerate) => {
                shared.mark_lost();
                Duration::ZERO
            }
            Err(e) => {
                warn!("Tracking failed: {e}");
                shared.mark_lost();
                options.detection_backoff
            }
        };

        window_frames += 1;
        let elapsed = window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            #[allow(clippy::cast_precision_loss)]
            let fps = window_frames as f32 / elapsed.as_secs_f32();
            shared.set_detection_fps(fps);
            window_start = Instant::now();
            window_frames = 0;
        }

        if wait_or_stop(stop, wait) {
            break;
        }
    }

    drop(source);
    info!("Face capture loop stopped");
}
