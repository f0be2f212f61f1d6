//! Cascade classifier handle and multi-scale detection parameters.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use opencv::{
    core::{Mat, Rect, Size, Vector},
    objdetect::CascadeClassifier,
    prelude::*,
};

use crate::error::SetupError;

/// Tunables forwarded to `detectMultiScale`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectParams {
    /// Step between pyramid levels. Smaller steps examine more scales.
    pub scale_factor: f64,
    /// Overlapping raw hits needed before a region is reported.
    pub min_neighbors: i32,
    /// Smallest region reported, in pixels of the detection frame.
    pub min_size: Size,
    /// Largest region reported; `0x0` means unbounded.
    pub max_size: Size,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.05,
            min_neighbors: 25,
            min_size: Size::new(120, 120),
            max_size: Size::new(0, 0),
        }
    }
}

impl DetectParams {
    /// Rejects only the values OpenCV itself refuses to scan with.
    pub fn validate(&self) -> Result<(), SetupError> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 1.0 {
            return Err(SetupError::InvalidParams(format!(
                "scale factor must be greater than 1.0 (got {})",
                self.scale_factor
            )));
        }
        if self.min_neighbors < 0 {
            return Err(SetupError::InvalidParams(format!(
                "min neighbors must not be negative (got {})",
                self.min_neighbors
            )));
        }
        if self.min_size.width < 0 || self.min_size.height < 0 {
            return Err(SetupError::InvalidParams(format!(
                "min size must not be negative (got {}x{})",
                self.min_size.width, self.min_size.height
            )));
        }
        Ok(())
    }
}

/// Anything that turns a single-channel frame into candidate rectangles.
pub trait Detector {
    fn detect(&mut self, gray: &Mat) -> Result<Vec<Rect>>;
}

/// A loaded cascade plus the parameters it scans with.
///
/// The handle is built once and never reloaded; the loop borrows it mutably
/// only because OpenCV's detection entry point takes `&mut self`.
pub struct HaarCascade {
    classifier: CascadeClassifier,
    params: DetectParams,
    path: PathBuf,
}

impl HaarCascade {
    /// Loads a cascade definition. Any file OpenCV accepts is accepted here.
    pub fn load(path: &Path, params: DetectParams) -> Result<Self, SetupError> {
        params.validate()?;

        if !path.is_file() {
            return Err(SetupError::CascadeMissing {
                path: path.to_path_buf(),
            });
        }

        let rejected = |source| SetupError::CascadeRejected {
            path: path.to_path_buf(),
            source,
        };

        let classifier =
            CascadeClassifier::new(&path.to_string_lossy()).map_err(|e| rejected(Some(e)))?;
        if classifier.empty().map_err(|e| rejected(Some(e)))? {
            return Err(rejected(None));
        }

        tracing::info!("Loaded cascade: {}", path.display());
        Ok(Self {
            classifier,
            params,
            path: path.to_path_buf(),
        })
    }

    pub fn params(&self) -> &DetectParams {
        &self.params
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Detector for HaarCascade {
    fn detect(&mut self, gray: &Mat) -> Result<Vec<Rect>> {
        let mut objects = Vector::<Rect>::new();
        self.classifier
            .detect_multi_scale(
                gray,
                &mut objects,
                self.params.scale_factor,
                self.params.min_neighbors,
                0,
                self.params.min_size,
                self.params.max_size,
            )
            .context("cascade detection failed")?;
        Ok(objects.to_vec())
    }
}
