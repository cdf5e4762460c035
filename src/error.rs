//! Failure taxonomy for the effect pipeline.
//!
//! Every failure surfaces as the absence of a new result: callers never
//! receive a partial bitmap. Nothing here is retried automatically.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// No compatible adapter, device request failed, or the compute program
    /// did not validate. The pipeline is unusable after this.
    #[error("GPU pipeline unavailable: {0}")]
    Initialization(String),

    /// Texture/buffer allocation or binding failed for one dispatch.
    #[error("GPU resource allocation failed: {0}")]
    ResourceAllocation(String),

    #[error("failed to decode image '{}': {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("failed to read back processed texture: {0}")]
    Readback(String),

    /// Neither the requested font nor the monospaced fallback could be found.
    #[error("no usable font for glyph atlas (requested '{requested}')")]
    FontUnavailable { requested: String },

    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("failed to export bitmap to '{}': {reason}", path.display())]
    Export { path: PathBuf, reason: String },
}

impl PipelineError {
    pub fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn export(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Export {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Fatal errors leave the pipeline unusable; everything else only
    /// aborts the current request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Initialization(_))
    }
}
