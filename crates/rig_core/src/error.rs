//! Error types for project builds and project files.

use thiserror::Error;

use crate::scene::SceneError;

/// Errors surfaced by project level operations.
///
/// Per-proxy problems never show up here; they are logged and skipped.
#[derive(Error, Debug)]
pub enum RigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),

    #[error("Invalid project: {0}")]
    InvalidProject(String),
}

/// Result type for project operations.
pub type RigResult<T> = Result<T, RigError>;
