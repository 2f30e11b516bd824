//! LangV Media Core
//!
//! Side-channel services for the player: seek-bar thumbnails, embedded
//! subtitle discovery and extraction, SRT parsing and playback-synchronized
//! cue selection. Frames and subtitle streams come from FFmpeg subprocesses;
//! the playback engine itself lives elsewhere.

pub mod captions;
pub mod events;
pub mod ffmpeg;
pub mod process;
pub mod session;
pub mod settings;
pub mod sync;
pub mod thumbnails;
pub mod tracks;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;

#[cfg(test)]
pub(crate) mod testing;
