//! LangV Player media side-channel.
//!
//! Everything the player needs besides the playback engine: seek-bar preview
//! frames, embedded subtitle tracks, external SRT files and the timers that
//! keep subtitle overlays in step with playback.

pub mod core;
pub mod logging;

pub use crate::core::session::{MediaSession, SessionParts, TrackChoice};
pub use crate::core::settings::{MediaSettings, SettingsManager};
pub use crate::core::{CoreError, CoreResult};
