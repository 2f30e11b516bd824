//! Subtitle Cue Module
//!
//! - Cue data model
//! - BOM-aware decoding of subtitle files
//! - SRT parsing (tolerant, block-by-block) and export
//! - Binary-search lookup of the cue active at a playback time
//!
//! ```rust,ignore
//! use crate::core::captions::{find_active, parse_srt_file};
//!
//! let cues = parse_srt_file(Path::new("movie.en.srt"));
//! if let Some(cue) = find_active(&cues, 65_500) {
//!     println!("{}", cue.text);
//! }
//! ```

mod encoding;
mod locator;
mod models;
mod srt;

pub use encoding::{decode_text, detect_encoding, TextEncoding};
pub use locator::{count_overlaps, ensure_sorted, find_active, is_sorted};
pub use models::Cue;
pub use srt::{
    export_srt, format_srt_timestamp, load_srt_file, parse_srt_bytes, parse_srt_file,
    parse_srt_str, parse_srt_timestamp,
};
