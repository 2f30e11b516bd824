//! Notifications from the side-channel to the host UI.

use crate::core::captions::Cue;
use crate::core::sync::{SlotId, TrackStatus};
use crate::core::thumbnails::Thumbnail;
use crate::core::types::TimeMs;

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The cue shown in `slot` changed (`None` hides the line)
    ActiveCueChanged { slot: SlotId, cue: Option<Cue> },
    /// Menu state of the track in `slot` changed
    TrackStatusChanged { slot: SlotId, status: TrackStatus },
    /// The pointer is over the seek bar at `time_ms`
    HoverTime { time_ms: TimeMs },
    /// A preview frame for the hovered time is ready
    ThumbnailReady {
        time_ms: TimeMs,
        thumbnail: Thumbnail,
    },
}
