//! Cue Data Model

use std::fmt;

use serde::{Deserialize, Serialize};

use super::srt::format_srt_timestamp;
use crate::core::types::TimeMs;

/// One timed subtitle entry.
///
/// Cue lists are built once by the parser and replaced wholesale; a cue is
/// never edited after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    /// Display index from the source file (0 when the file had none)
    pub index: i32,
    /// Start time in milliseconds
    pub start_ms: TimeMs,
    /// End time in milliseconds (never before `start_ms`)
    pub end_ms: TimeMs,
    /// Text with markup removed; lines joined by `\n`
    pub text: String,
}

impl Cue {
    pub fn new(index: i32, start_ms: TimeMs, end_ms: TimeMs, text: impl Into<String>) -> Self {
        Self {
            index,
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// Whether the cue is on screen at `time_ms` (both ends inclusive)
    pub fn is_active_at(&self, time_ms: TimeMs) -> bool {
        self.start_ms <= time_ms && time_ms <= self.end_ms
    }

    /// Cue duration in milliseconds
    pub fn duration_ms(&self) -> TimeMs {
        self.end_ms - self.start_ms
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} --> {}: {}",
            self.index,
            format_srt_timestamp(self.start_ms),
            format_srt_timestamp(self.end_ms),
            self.text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_window_is_inclusive() {
        let cue = Cue::new(1, 1000, 3000, "Hello");
        assert!(!cue.is_active_at(999));
        assert!(cue.is_active_at(1000));
        assert!(cue.is_active_at(3000));
        assert!(!cue.is_active_at(3001));
        assert_eq!(cue.duration_ms(), 2000);
    }

    #[test]
    fn test_display() {
        let cue = Cue::new(3, 65_500, 67_000, "Hi there");
        assert_eq!(cue.to_string(), "[3] 00:01:05,500 --> 00:01:07,000: Hi there");
    }
}
