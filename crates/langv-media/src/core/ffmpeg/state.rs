//! FFmpeg shared state
//!
//! Holds the runner shared by the thumbnail, probing and extraction
//! services. Detection happens once per session; the outcome is sticky so a
//! missing tool is never searched for again on every hover.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::{detect_ffmpeg, FFmpegError, FFmpegInfo, FFmpegRunner};
use crate::core::settings::ToolSettings;

/// Session-wide FFmpeg runner state.
pub struct FFmpegState {
    runner: Option<FFmpegRunner>,
    checked: bool,
}

impl FFmpegState {
    pub fn new() -> Self {
        Self {
            runner: None,
            checked: false,
        }
    }

    /// Initialize FFmpeg by detecting installation.
    ///
    /// Only the first call runs detection; later calls report the cached
    /// outcome.
    pub async fn initialize(&mut self, tools: &ToolSettings) -> Result<(), FFmpegError> {
        if self.checked {
            return if self.runner.is_some() {
                Ok(())
            } else {
                Err(FFmpegError::NotFound)
            };
        }

        self.checked = true;
        let info = detect_ffmpeg(tools).await?;
        self.runner = Some(FFmpegRunner::new(info));
        Ok(())
    }

    /// Get the FFmpeg runner.
    pub fn runner(&self) -> Option<&FFmpegRunner> {
        self.runner.as_ref()
    }

    /// Get FFmpeg info.
    pub fn info(&self) -> Option<&FFmpegInfo> {
        self.runner.as_ref().map(|r| r.info())
    }

    /// Check if FFmpeg is available.
    pub fn is_available(&self) -> bool {
        self.runner.is_some()
    }

    /// Whether detection already ran
    pub fn is_checked(&self) -> bool {
        self.checked
    }
}

impl Default for FFmpegState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared FFmpeg state for the async runtime.
pub type SharedFFmpegState = Arc<RwLock<FFmpegState>>;

/// Create a new shared FFmpeg state.
pub fn create_ffmpeg_state() -> SharedFFmpegState {
    Arc::new(RwLock::new(FFmpegState::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_missing_tool_is_sticky() {
        let tools = ToolSettings {
            ffmpeg_path: Some(PathBuf::from("/nonexistent/ffmpeg")),
            ..Default::default()
        };
        let mut state = FFmpegState::new();
        assert!(!state.is_checked());

        // Detection may succeed through PATH on machines with FFmpeg; either
        // way the second call must report the same outcome without re-running.
        let first = state.initialize(&tools).await.is_ok();
        assert!(state.is_checked());
        let second = state.initialize(&tools).await.is_ok();
        assert_eq!(first, second);
        assert_eq!(state.is_available(), first);
    }
}
