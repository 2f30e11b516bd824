//! Shared value types used across the side-channel modules.

use std::path::{Path, PathBuf};

/// Time position in milliseconds
pub type TimeMs = i64;

/// The currently loaded video.
///
/// Replaced wholesale when a new file is opened; nothing mutates it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoContext {
    /// Path to the video file
    pub path: PathBuf,
    /// Duration in milliseconds (0 when the player has not reported it yet)
    pub duration_ms: TimeMs,
}

impl VideoContext {
    /// Creates a new video context
    pub fn new(path: impl Into<PathBuf>, duration_ms: TimeMs) -> Self {
        Self {
            path: path.into(),
            duration_ms,
        }
    }

    /// Path of the video
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the playback engine has reported a usable duration
    pub fn has_duration(&self) -> bool {
        self.duration_ms > 0
    }

    /// Maps a seek-bar ratio to a time position within this video
    pub fn time_for_ratio(&self, ratio: f64) -> TimeMs {
        time_for_ratio(ratio, self.duration_ms)
    }
}

/// Maps a seek-bar ratio to a time position, clamping the ratio into [0, 1].
pub fn time_for_ratio(ratio: f64, duration_ms: TimeMs) -> TimeMs {
    if duration_ms <= 0 {
        return 0;
    }
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };
    (ratio * duration_ms as f64) as TimeMs
}

/// Formats milliseconds as `HH:MM:SS.mmm`, the form the decoder accepts for `-ss`.
pub fn format_seek_timestamp(time_ms: TimeMs) -> String {
    let total_ms = time_ms.max(0);
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!("{:02}:{:02}:{:02}.{:03}", hours, mins, secs, ms)
}
