//! SRT (SubRip) Parser and Exporter
//!
//! The parser is deliberately forgiving: a block that cannot be understood is
//! skipped and parsing continues with the next one. Unreadable input yields
//! an empty list.
//!
//! ```text
//! 1
//! 00:00:01,000 --> 00:00:04,000
//! First caption text
//!
//! 2
//! 00:00:05.500 --> 00:00:08,000
//! Second caption text
//! with <i>markup</i>
//! ```

use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::encoding::decode_text;
use super::Cue;
use crate::core::types::TimeMs;

/// The timing line must appear within this many lines of a block's start
const TIMING_LINE_WINDOW: usize = 3;

fn timing_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})",
        )
        .expect("timing regex is valid")
    })
}

fn markup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("markup regex is valid"))
}

// =============================================================================
// Parsing
// =============================================================================

/// Parses raw subtitle bytes, detecting the encoding from the BOM.
pub fn parse_srt_bytes(bytes: &[u8]) -> Vec<Cue> {
    parse_srt_str(&decode_text(bytes))
}

/// Parses SRT text into cues sorted by start time.
pub fn parse_srt_str(content: &str) -> Vec<Cue> {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");

    let mut cues = Vec::new();
    let mut skipped = 0usize;
    for block in split_blocks(&normalized) {
        match parse_block(&block) {
            Some(cue) => cues.push(cue),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!("Skipped {} malformed subtitle block(s)", skipped);
    }

    // Stable: cues sharing a start time keep file order
    cues.sort_by_key(|c| c.start_ms);
    cues
}

/// Reads and parses a subtitle file; unreadable files yield no cues.
pub fn parse_srt_file(path: &Path) -> Vec<Cue> {
    match std::fs::read(path) {
        Ok(bytes) => parse_srt_bytes(&bytes),
        Err(e) => {
            tracing::warn!("Failed to read subtitle file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Async variant of [`parse_srt_file`] for use on the runtime.
pub async fn load_srt_file(path: &Path) -> Vec<Cue> {
    match tokio::fs::read(path).await {
        Ok(bytes) => parse_srt_bytes(&bytes),
        Err(e) => {
            tracing::warn!("Failed to read subtitle file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Groups lines into blocks separated by blank (or whitespace-only) lines.
fn split_blocks(content: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks
}

fn parse_block(lines: &[&str]) -> Option<Cue> {
    let (timing_idx, caps) = lines
        .iter()
        .take(TIMING_LINE_WINDOW)
        .enumerate()
        .find_map(|(i, line)| timing_regex().captures(line).map(|c| (i, c)))?;

    let start_ms = captured_ms(&caps, 1)?;
    let end_ms = captured_ms(&caps, 5)?;
    if end_ms < start_ms {
        return None;
    }

    let index = timing_idx
        .checked_sub(1)
        .and_then(|i| lines[i].trim().parse::<i32>().ok())
        .unwrap_or(0);

    let text = lines[timing_idx + 1..]
        .iter()
        .map(|l| markup_regex().replace_all(l, "").trim().to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        return None;
    }

    Some(Cue {
        index,
        start_ms,
        end_ms,
        text,
    })
}

/// Reads four consecutive capture groups (h, m, s, ms) starting at `first`.
fn captured_ms(caps: &Captures<'_>, first: usize) -> Option<TimeMs> {
    let field = |i: usize| caps.get(first + i)?.as_str().parse::<TimeMs>().ok();
    let (h, m, s, ms) = (field(0)?, field(1)?, field(2)?, field(3)?);
    Some(((h * 60 + m) * 60 + s) * 1000 + ms)
}

/// Parses a single `H:MM:SS,mmm` timestamp.
pub fn parse_srt_timestamp(ts: &str) -> Option<TimeMs> {
    let line = format!("{} --> {}", ts.trim(), ts.trim());
    let caps = timing_regex().captures(&line)?;
    captured_ms(&caps, 1)
}

// =============================================================================
// Export
// =============================================================================

/// Formats milliseconds as an SRT timestamp (`00:00:00,000`)
pub fn format_srt_timestamp(time_ms: TimeMs) -> String {
    let total_ms = time_ms.max(0);
    let ms = total_ms % 1000;
    let total_secs = total_ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, ms)
}

/// Exports cues to SRT, numbering them from 1 in list order.
pub fn export_srt(cues: &[Cue]) -> String {
    let mut output = String::new();

    for (index, cue) in cues.iter().enumerate() {
        output.push_str(&format!("{}\n", index + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_timestamp(cue.start_ms),
            format_srt_timestamp(cue.end_ms)
        ));
        output.push_str(&cue.text);
        output.push_str("\n\n");
    }

    output.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "1\n00:00:01,000 --> 00:00:03,000\nHello\n\n2\n00:00:05,000 --> 00:00:07,000\n<i>Second</i>\nline two\n";

    #[test]
    fn test_timestamp_to_ms() {
        assert_eq!(parse_srt_timestamp("00:01:05,500"), Some(65_500));
        assert_eq!(parse_srt_timestamp("1:00:00.001"), Some(3_600_001));
        assert_eq!(parse_srt_timestamp("12:34:56,789"), Some(45_296_789));
        assert_eq!(parse_srt_timestamp("garbage"), None);
    }

    #[test]
    fn test_parse_basic() {
        let cues = parse_srt_str(SAMPLE);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0], Cue::new(1, 1000, 3000, "Hello"));
        assert_eq!(cues[1].index, 2);
        assert_eq!(cues[1].text, "Second\nline two");
    }

    #[test]
    fn test_crlf_and_period_separator() {
        let content = "7\r\n00:00:01.250 --> 00:00:02.500\r\nDots\r\n\r\n";
        let cues = parse_srt_str(content);
        assert_eq!(cues, vec![Cue::new(7, 1250, 2500, "Dots")]);
    }

    #[test]
    fn test_missing_index_defaults_to_zero() {
        let cues = parse_srt_str("00:00:01,000 --> 00:00:02,000\nNo number\n");
        assert_eq!(cues[0].index, 0);

        let cues = parse_srt_str("abc\n00:00:01,000 --> 00:00:02,000\nWord index\n");
        assert_eq!(cues[0].index, 0);
    }

    #[test]
    fn test_malformed_block_is_skipped() {
        let content = "1\n00:00:01,000 --> 00:00:02,000\nFirst\n\n\
                       2\nno timing here\nlost\n\n\
                       3\n00:00:04,000 --> 00:00:05,000\nThird\n\n\
                       4\n00:00:06,000 --> 00:00:07,000\n<b></b>\n";
        let cues = parse_srt_str(content);
        let indexes: Vec<i32> = cues.iter().map(|c| c.index).collect();
        assert_eq!(indexes, vec![1, 3]);
    }

    #[test]
    fn test_timing_line_outside_window_is_ignored() {
        let content = "a\nb\nc\n00:00:01,000 --> 00:00:02,000\nToo late\n";
        assert!(parse_srt_str(content).is_empty());
    }

    #[test]
    fn test_reversed_cue_is_dropped() {
        let content = "1\n00:00:05,000 --> 00:00:01,000\nBackwards\n";
        assert!(parse_srt_str(content).is_empty());
    }

    #[test]
    fn test_output_is_sorted() {
        let content = "2\n00:00:05,000 --> 00:00:06,000\nLater\n\n1\n00:00:01,000 --> 00:00:02,000\nEarlier\n";
        let cues = parse_srt_str(content);
        assert_eq!(cues[0].text, "Earlier");
        assert_eq!(cues[1].text, "Later");
    }

    #[test]
    fn test_utf16le_bom_matches_utf8() {
        let mut utf16 = vec![0xFF, 0xFE];
        for unit in SAMPLE.encode_utf16() {
            utf16.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(parse_srt_bytes(&utf16), parse_srt_bytes(SAMPLE.as_bytes()));
    }

    #[test]
    fn test_unreadable_file_yields_empty() {
        assert!(parse_srt_file(Path::new("/nonexistent/subs.srt")).is_empty());
    }

    #[tokio::test]
    async fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let cues = load_srt_file(file.path()).await;
        assert_eq!(cues.len(), 2);
    }

    #[test]
    fn test_export_reparses() {
        let cues = parse_srt_str(SAMPLE);
        let exported = export_srt(&cues);
        assert!(exported.starts_with("1\n00:00:01,000 --> 00:00:03,000\nHello"));
        assert_eq!(parse_srt_str(&exported), cues);
    }
}
