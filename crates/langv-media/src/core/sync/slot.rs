//! Subtitle slots.
//!
//! Each slot holds the cue list currently shown in one subtitle line. Lists
//! are swapped wholesale; readers keep whatever `Arc` they took, so a reader
//! never sees a half-installed list.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::captions::{count_overlaps, ensure_sorted, find_active, Cue};
use crate::core::types::TimeMs;

/// Which subtitle line a slot feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotId {
    Primary,
    Secondary,
}

impl SlotId {
    pub const ALL: [SlotId; 2] = [SlotId::Primary, SlotId::Secondary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Menu-facing state of a slot's track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum TrackStatus {
    /// Nothing selected
    None,
    /// Extraction or file load in progress
    Loading { name: String },
    /// Cues installed
    Loaded { name: String, count: usize },
    /// Extraction or load failed
    Failed { name: String, reason: String },
    /// The video has no embedded subtitle streams
    NoEmbedded,
}

impl TrackStatus {
    /// Short label for a menu entry
    pub fn label(&self) -> String {
        match self {
            Self::None => "Off".to_string(),
            Self::Loading { name } => format!("{} (loading...)", name),
            Self::Loaded { name, .. } => name.clone(),
            Self::Failed { name, .. } => format!("{} (error)", name),
            Self::NoEmbedded => "(no embedded subtitles)".to_string(),
        }
    }
}

pub struct SubtitleSlot {
    id: SlotId,
    cues: RwLock<Arc<Vec<Cue>>>,
    /// Bumped on every install/clear so drivers re-evaluate even at a
    /// standstill
    version: AtomicU64,
    status: Mutex<TrackStatus>,
    /// Token of the selection that owns the slot; superseded selections
    /// are cancelled
    selection: Mutex<CancellationToken>,
}

impl SubtitleSlot {
    pub fn new(id: SlotId) -> Self {
        Self {
            id,
            cues: RwLock::new(Arc::new(Vec::new())),
            version: AtomicU64::new(0),
            status: Mutex::new(TrackStatus::None),
            selection: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Replaces the cue list.
    ///
    /// An out-of-order list is re-sorted first; overlaps are kept and only
    /// reported, lookups over them are best-effort.
    pub fn install(&self, mut cues: Vec<Cue>) -> usize {
        if ensure_sorted(&mut cues) {
            tracing::warn!("{} subtitle list was out of order, re-sorted", self.id);
        }
        let overlaps = count_overlaps(&cues);
        if overlaps > 0 {
            tracing::debug!("{} subtitle list has {} overlapping cue(s)", self.id, overlaps);
        }

        let count = cues.len();
        self.swap(Arc::new(cues));
        count
    }

    /// Empties the slot
    pub fn clear(&self) {
        self.swap(Arc::new(Vec::new()));
    }

    fn swap(&self, cues: Arc<Vec<Cue>>) {
        let mut current = self.cues.write().unwrap_or_else(|p| p.into_inner());
        *current = cues;
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// The installed list, shared
    pub fn snapshot(&self) -> Arc<Vec<Cue>> {
        self.cues.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The cue active at `time_ms`
    pub fn find_active(&self, time_ms: TimeMs) -> Option<Cue> {
        find_active(&self.snapshot(), time_ms).cloned()
    }

    /// Starts a new selection, cancelling the one in progress.
    ///
    /// The returned token is a child of `parent` (the video's token), so a
    /// video change supersedes it too.
    pub fn begin_selection(&self, parent: &CancellationToken) -> CancellationToken {
        let mut current = self.selection.lock().unwrap_or_else(|p| p.into_inner());
        current.cancel();
        *current = parent.child_token();
        current.clone()
    }

    /// Runs `apply` if `selection` still owns the slot.
    ///
    /// Checking and applying happen under the selection lock, so a newer
    /// `begin_selection` either waits for `apply` or makes it a no-op.
    pub fn commit<R>(
        &self,
        selection: &CancellationToken,
        apply: impl FnOnce(&Self) -> R,
    ) -> Option<R> {
        let _owner = self.selection.lock().unwrap_or_else(|p| p.into_inner());
        if selection.is_cancelled() {
            return None;
        }
        Some(apply(self))
    }

    pub fn status(&self) -> TrackStatus {
        self.status.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn set_status(&self, status: TrackStatus) {
        *self.status.lock().unwrap_or_else(|p| p.into_inner()) = status;
    }
}
