//! The capture, detect, render loop.

use std::fmt;
use std::time::Duration;

use anyhow::{Result, anyhow};
use opencv::{
    core::{Mat, Rect},
    prelude::*,
};

use crate::{
    annotate::{self, Overlay},
    camera::FrameSource,
    cascade::Detector,
    display::{Command, Display},
    error::SetupError,
};

/// Widest frame the loop will scale to before detection.
pub const MAX_RESIZE_WIDTH: u32 = 16_384;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub overlay: Overlay,
    /// Width frames are scaled to before detection; 0 keeps native size.
    pub resize_width: u32,
    /// Bounded key wait per displayed frame.
    pub key_wait: Duration,
    /// Pause after a frame failed to arrive.
    pub retry_wait: Duration,
    /// Consecutive missed frames before giving up; 0 never gives up.
    pub max_missed: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            overlay: Overlay::default(),
            resize_width: 500,
            key_wait: Duration::from_millis(1),
            retry_wait: Duration::from_millis(50),
            max_missed: 0,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.resize_width > MAX_RESIZE_WIDTH {
            return Err(SetupError::InvalidParams(format!(
                "resize width must be at most {MAX_RESIZE_WIDTH} (got {})",
                self.resize_width
            )));
        }
        Ok(())
    }
}

/// What happened over the whole run. `detected` only ever goes false → true.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub positive_frames: u64,
    pub detections: u64,
    pub missed_frames: u64,
}

impl SessionSummary {
    pub fn detected(&self) -> bool {
        self.positive_frames > 0
    }

    fn record(&mut self, rects: &[Rect]) {
        self.frames += 1;
        if !rects.is_empty() {
            self.positive_frames += 1;
            self.detections += rects.len() as u64;
        }
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detected() {
            f.write_str("weapon detected")
        } else {
            f.write_str("no weapon detected during session")
        }
    }
}

#[derive(Debug)]
pub enum StopReason {
    QuitKey,
    WindowClosed,
    Failed(anyhow::Error),
}

#[derive(Debug)]
pub struct SessionReport {
    pub summary: SessionSummary,
    pub stop: StopReason,
}

impl SessionReport {
    /// Turns a failed stop into an error once the summary has been reported.
    pub fn into_result(self) -> Result<SessionSummary> {
        match self.stop {
            StopReason::Failed(e) => Err(e),
            StopReason::QuitKey | StopReason::WindowClosed => Ok(self.summary),
        }
    }
}

enum Step {
    Continue,
    Stop(StopReason),
}

/// Owns the frame source, the classifier and the display for the lifetime of
/// the loop. All three are dropped, and so released, when `run` returns.
pub struct Session<S: FrameSource, D: Detector, V: Display> {
    source: S,
    detector: D,
    display: V,
    config: SessionConfig,
    summary: SessionSummary,
    missed_in_a_row: u32,
    frame: Mat,
    resized: Mat,
    gray: Mat,
}

impl<S: FrameSource, D: Detector, V: Display> Session<S, D, V> {
    pub fn new(source: S, detector: D, display: V, config: SessionConfig) -> Self {
        Self {
            source,
            detector,
            display,
            config,
            summary: SessionSummary::default(),
            missed_in_a_row: 0,
            frame: Mat::default(),
            resized: Mat::default(),
            gray: Mat::default(),
        }
    }

    pub fn run(mut self) -> SessionReport {
        let stop = loop {
            match self.step() {
                Ok(Step::Continue) => {}
                Ok(Step::Stop(reason)) => break reason,
                Err(e) => break StopReason::Failed(e),
            }
        };

        if let Err(e) = self.source.release() {
            tracing::warn!("{e:#}");
        }

        tracing::info!(
            "Session ended ({}): {} frames, {} with detections, {} boxes, {} missed",
            stop_label(&stop),
            self.summary.frames,
            self.summary.positive_frames,
            self.summary.detections,
            self.summary.missed_frames
        );

        SessionReport {
            summary: self.summary,
            stop,
        }
    }

    fn step(&mut self) -> Result<Step> {
        if self.display.is_closed() {
            return Ok(Step::Stop(StopReason::WindowClosed));
        }

        let grabbed = match self.source.read(&mut self.frame) {
            Ok(grabbed) => grabbed,
            Err(e) => {
                tracing::warn!("Frame grab failed: {e:#}");
                false
            }
        };
        if !grabbed {
            return self.on_missed_frame();
        }
        self.missed_in_a_row = 0;

        let rects = self.process_frame()?;
        self.summary.record(&rects);
        if !rects.is_empty() {
            tracing::debug!("Frame {}: {} detection(s)", self.summary.frames, rects.len());
        }

        let shown = if !self.resized.empty() {
            &self.resized
        } else {
            &self.frame
        };
        self.display.show(shown)?;

        self.poll(self.config.key_wait)
    }

    /// Resize, grayscale, detect, annotate. Returns the rectangles drawn.
    fn process_frame(&mut self) -> Result<Vec<Rect>> {
        let target = if annotate::resize_to_width(
            &self.frame,
            self.config.resize_width,
            &mut self.resized,
        )? {
            &mut self.resized
        } else {
            self.resized = Mat::default();
            &mut self.frame
        };

        annotate::to_gray(target, &mut self.gray)?;
        let rects = self.detector.detect(&self.gray)?;
        self.config.overlay.draw(target, &rects)?;
        Ok(rects)
    }

    fn on_missed_frame(&mut self) -> Result<Step> {
        self.summary.missed_frames += 1;
        self.missed_in_a_row += 1;
        tracing::warn!("Failed to capture frame, retrying...");

        let limit = self.config.max_missed;
        if limit > 0 && self.missed_in_a_row >= limit {
            return Err(anyhow!("no frame from camera after {limit} consecutive attempts"));
        }
        self.poll(self.config.retry_wait)
    }

    fn poll(&mut self, wait: Duration) -> Result<Step> {
        match self.display.poll(wait)? {
            Some(Command::Quit) => Ok(Step::Stop(StopReason::QuitKey)),
            Some(Command::Other) | None => Ok(Step::Continue),
        }
    }
}

fn stop_label(stop: &StopReason) -> &'static str {
    match stop {
        StopReason::QuitKey => "quit key",
        StopReason::WindowClosed => "window closed",
        StopReason::Failed(_) => "error",
    }
}
