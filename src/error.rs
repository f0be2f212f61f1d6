use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop the program before the capture loop starts.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("cascade file not found: {path:?}")]
    CascadeMissing { path: PathBuf },
    #[error("cascade file {path:?} could not be loaded as a classifier")]
    CascadeRejected {
        path: PathBuf,
        #[source]
        source: Option<opencv::Error>,
    },
    #[error("failed to open camera at index {index}; check permissions and that no other app is using it")]
    CameraUnavailable {
        index: i32,
        #[source]
        source: Option<opencv::Error>,
    },
    #[error("invalid detection parameters: {0}")]
    InvalidParams(String),
}
