//! Camera frame sources.

use crate::{Error, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture},
};

/// Blocking source of camera frames
pub trait FrameSource {
    /// Frame type handed to the tracker
    type Frame;

    /// Read the next frame, `None` if the device returned an empty frame
    ///
    /// # Errors
    ///
    /// Returns an error if the device read fails
    fn read_frame(&mut self) -> Result<Option<Self::Frame>>;
}

/// `OpenCV` video capture device producing BGR frames
pub struct OpenCvCamera {
    capture: VideoCapture,
    device: i32,
    frame_size: (i32, i32),
}

impl OpenCvCamera {
    /// Open a camera by device index
    ///
    /// A device that opens but cannot deliver a first frame counts as a
    /// failed open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Camera`] if the device cannot be opened or read
    pub fn open(device: i32) -> Result<Self> {
        log::info!("Opening camera {device}");
        let mut capture = VideoCapture::new(device, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(Error::Camera(format!("Failed to open camera {device}")));
        }

        // Keep only the newest frame queued
        capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0)?;

        let mut frame = Mat::default();
        if !capture.read(&mut frame)? || frame.empty() {
            capture.release()?;
            return Err(Error::Camera(format!("Camera {device} opened but produced no frame")));
        }
        let frame_size = (frame.cols(), frame.rows());
        log::info!("Camera {device} opened at {}x{}", frame_size.0, frame_size.1);

        Ok(Self {
            capture,
            device,
            frame_size,
        })
    }

    #[must_use]
    pub const fn device(&self) -> i32 {
        self.device
    }

    /// Size of the first frame read after opening
    #[must_use]
    pub const fn frame_size(&self) -> (i32, i32) {
        self.frame_size
    }
}

impl FrameSource for OpenCvCamera {
    type Frame = Mat;

    fn read_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

impl Drop for OpenCvCamera {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            log::warn!("Failed to release camera {}: {e}", self.device);
        } else {
            log::info!("Camera {} released", self.device);
        }
    }
}
