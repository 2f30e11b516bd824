//! FFmpeg Integration Module
//!
//! Everything the side-channel needs from the external decoder:
//! - Tool discovery and startup validation
//! - Single-frame extraction for seek-bar previews
//! - Subtitle stream listing (ffprobe JSON, or `ffmpeg -i` diagnostics)
//! - Subtitle stream demuxing to SRT
//!
//! All invocations go through [`crate::core::process::run_with_deadline`], so
//! every call is bounded and cancellable.

mod detection;
mod runner;
mod state;

pub use detection::*;
pub use runner::{FFmpegRunner, FrameRequest, SeekMode, THUMBNAIL_PRE_SEEK_MS};
pub use state::{create_ffmpeg_state, FFmpegState, SharedFFmpegState};

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Please install FFmpeg or place it next to the player.")]
    NotFound,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("Output path error: {0}")]
    OutputError(String),

    #[error("FFprobe error: {0}")]
    ProbeError(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Timeout: operation took too long")]
    Timeout,

    #[error("Cancelled")]
    Cancelled,
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;
