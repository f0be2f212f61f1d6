//! Exclusive ownership of the capture device.

use anyhow::{Context, Result};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture},
};

use crate::error::SetupError;

/// Source of BGR frames for the loop.
///
/// `read` returns `Ok(false)` when no frame was available this time round;
/// callers treat that as transient. `release` must be safe to call more than
/// once and implementors must also release on drop.
pub trait FrameSource {
    fn read(&mut self, frame: &mut Mat) -> Result<bool>;
    fn release(&mut self) -> Result<()>;
}

pub struct Camera {
    capture: VideoCapture,
    index: i32,
    released: bool,
}

impl Camera {
    pub fn open(index: i32) -> Result<Self, SetupError> {
        let unavailable = |source| SetupError::CameraUnavailable { index, source };

        let capture =
            VideoCapture::new(index, videoio::CAP_ANY).map_err(|e| unavailable(Some(e)))?;
        if !capture.is_opened().map_err(|e| unavailable(Some(e)))? {
            return Err(unavailable(None));
        }

        Ok(Self {
            capture,
            index,
            released: false,
        })
    }

    /// Best-effort; the driver may pick something else.
    pub fn request_resolution(&mut self, width: Option<u32>, height: Option<u32>) {
        if let Some(width) = width {
            if !matches!(
                self.capture.set(videoio::CAP_PROP_FRAME_WIDTH, width as f64),
                Ok(true)
            ) {
                tracing::warn!("Failed to set capture width={width}");
            }
        }
        if let Some(height) = height {
            if !matches!(
                self.capture.set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64),
                Ok(true)
            ) {
                tracing::warn!("Failed to set capture height={height}");
            }
        }
    }

    /// Resolution the driver actually settled on.
    pub fn resolution(&self) -> Result<(u32, u32)> {
        let width = self
            .capture
            .get(videoio::CAP_PROP_FRAME_WIDTH)
            .context("failed to read capture width")?;
        let height = self
            .capture
            .get(videoio::CAP_PROP_FRAME_HEIGHT)
            .context("failed to read capture height")?;
        Ok((width as u32, height as u32))
    }

    pub fn index(&self) -> i32 {
        self.index
    }
}

impl FrameSource for Camera {
    fn read(&mut self, frame: &mut Mat) -> Result<bool> {
        let grabbed = self
            .capture
            .read(frame)
            .with_context(|| format!("failed to read from camera {}", self.index))?;
        Ok(grabbed && !frame.empty())
    }

    fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.capture
            .release()
            .with_context(|| format!("failed to release camera {}", self.index))?;
        tracing::debug!("Released camera {}", self.index);
        Ok(())
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("{e:#}");
        }
    }
}
