//! Playback Synchronization
//!
//! - [`SubtitleSlot`]: the primary and secondary cue lists
//! - [`PositionDriver`]: pushes active-cue changes on a fixed tick
//! - [`PlaybackPosition`] / [`PendingSeekGuard`]: position source with
//!   stale-report suppression after seeks
//! - [`HoverDriver`]: debounced thumbnail requests from seek-bar hover

mod hover;
mod position;
mod slot;

pub use hover::{HoverDriver, HoverHandle};
pub use position::{PendingSeekGuard, PlaybackPosition, PositionDriver};
pub use slot::{SlotId, SubtitleSlot, TrackStatus};
