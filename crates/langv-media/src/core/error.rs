//! LangV Media Error Definitions
//!
//! Defines the error taxonomy shared by every side-channel component.
//! None of these cross the session boundary as faults: the session owner
//! maps them to "no result" and logs them.

use thiserror::Error;

use super::ffmpeg::FFmpegError;

/// Core side-channel error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Tooling Errors
    // =========================================================================
    #[error("External tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled")]
    Cancelled,

    // =========================================================================
    // Input Errors
    // =========================================================================
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("No video loaded")]
    NoVideoLoaded,

    #[error("File not found: {0}")]
    FileNotFound(String),

    // =========================================================================
    // Concurrency / Lifecycle Errors
    // =========================================================================
    #[error("Busy: {0}")]
    Busy(String),

    #[error("Service disposed")]
    Disposed,

    #[error("Feature disabled: {0}")]
    Disabled(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Cleanup failed: {0}")]
    CleanupFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether this error is an expected degradation (tool missing, slow
    /// subprocess, busy guard, cancellation) rather than a real fault.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::ToolUnavailable(_)
                | Self::Timeout(_)
                | Self::Cancelled
                | Self::Busy(_)
                | Self::Disabled(_)
                | Self::NoVideoLoaded
                | Self::Disposed
                | Self::MalformedInput(_)
        )
    }
}

impl From<FFmpegError> for CoreError {
    fn from(err: FFmpegError) -> Self {
        match err {
            FFmpegError::NotFound => Self::ToolUnavailable(err.to_string()),
            FFmpegError::Timeout => Self::Timeout(err.to_string()),
            FFmpegError::Cancelled => Self::Cancelled,
            FFmpegError::InvalidInput(path) => Self::FileNotFound(path),
            FFmpegError::ParseError(msg) => Self::MalformedInput(msg),
            FFmpegError::ProcessError(io) => Self::IoError(io),
            other => Self::Internal(other.to_string()),
        }
    }
}
