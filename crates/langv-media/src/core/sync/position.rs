//! Playback position tracking and the periodic subtitle driver.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::{SlotId, SubtitleSlot};
use crate::core::captions::Cue;
use crate::core::events::SessionEvent;
use crate::core::types::TimeMs;

// =============================================================================
// Pending Seek
// =============================================================================

/// Suppresses stale position reports after a user seek.
///
/// Until playback reports a time within `tolerance_ms` of the target, reports
/// still describe the old position and are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSeekGuard {
    target_ms: TimeMs,
    tolerance_ms: TimeMs,
}

impl PendingSeekGuard {
    pub fn new(target_ms: TimeMs, tolerance_ms: TimeMs) -> Self {
        Self {
            target_ms,
            tolerance_ms,
        }
    }

    pub fn target_ms(&self) -> TimeMs {
        self.target_ms
    }

    /// Whether `reported` shows the seek has landed
    pub fn admit(&self, reported: TimeMs) -> bool {
        (reported - self.target_ms).abs() < self.tolerance_ms
    }
}

// =============================================================================
// Position Source
// =============================================================================

/// The playback position as seen by the drivers.
///
/// The host feeds it from playback-engine callbacks (`report`) and user
/// actions (`seek_to`, `set_dragging`).
pub struct PlaybackPosition {
    position_ms: AtomicI64,
    dragging: AtomicBool,
    pending_seek: Mutex<Option<PendingSeekGuard>>,
    tolerance_ms: TimeMs,
}

impl PlaybackPosition {
    pub fn new(tolerance_ms: TimeMs) -> Self {
        Self {
            position_ms: AtomicI64::new(0),
            dragging: AtomicBool::new(false),
            pending_seek: Mutex::new(None),
            tolerance_ms,
        }
    }

    /// Position callback from the playback engine.
    ///
    /// Returns `false` when the report was dropped as stale.
    pub fn report(&self, time_ms: TimeMs) -> bool {
        let mut pending = self.pending_seek.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(guard) = pending.as_ref() {
            if !guard.admit(time_ms) {
                return false;
            }
            *pending = None;
        }
        self.position_ms.store(time_ms, Ordering::SeqCst);
        true
    }

    /// User-initiated seek; supersedes any earlier pending seek
    pub fn seek_to(&self, target_ms: TimeMs) {
        let mut pending = self.pending_seek.lock().unwrap_or_else(|p| p.into_inner());
        *pending = Some(PendingSeekGuard::new(target_ms, self.tolerance_ms));
        self.position_ms.store(target_ms, Ordering::SeqCst);
    }

    /// Back to the start with no pending seek (new video)
    pub fn reset(&self) {
        let mut pending = self.pending_seek.lock().unwrap_or_else(|p| p.into_inner());
        *pending = None;
        self.position_ms.store(0, Ordering::SeqCst);
        self.dragging.store(false, Ordering::SeqCst);
    }

    /// While the seek bar is dragged, drivers leave subtitles alone
    pub fn set_dragging(&self, dragging: bool) {
        self.dragging.store(dragging, Ordering::SeqCst);
    }

    pub fn is_seeking(&self) -> bool {
        self.pending_seek
            .lock()
            .map(|p| p.is_some())
            .unwrap_or(false)
    }

    /// Current position, or `None` while the user drags the seek bar
    pub fn current(&self) -> Option<TimeMs> {
        if self.dragging.load(Ordering::SeqCst) {
            return None;
        }
        Some(self.position_ms.load(Ordering::SeqCst))
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Pushes the active cue of each slot, only when it changes.
pub struct PositionDriver {
    slots: Vec<Arc<SubtitleSlot>>,
    shown: Vec<Option<Cue>>,
    versions: Vec<u64>,
    last_time: Option<TimeMs>,
    min_change_ms: TimeMs,
}

impl PositionDriver {
    pub fn new(slots: Vec<Arc<SubtitleSlot>>, min_change_ms: TimeMs) -> Self {
        let n = slots.len();
        Self {
            slots,
            shown: vec![None; n],
            versions: vec![u64::MAX; n],
            last_time: None,
            min_change_ms: min_change_ms.max(1),
        }
    }

    /// One driver step at playback time `time_ms`.
    ///
    /// Returns the slots whose displayed cue changed, with the new cue.
    pub fn tick(&mut self, time_ms: TimeMs) -> Vec<(SlotId, Option<Cue>)> {
        let time_moved = self
            .last_time
            .map_or(true, |last| (time_ms - last).abs() >= self.min_change_ms);
        let lists_changed = self
            .slots
            .iter()
            .zip(&self.versions)
            .any(|(slot, seen)| slot.version() != *seen);

        if !time_moved && !lists_changed {
            return Vec::new();
        }
        self.last_time = Some(time_ms);

        let mut changes = Vec::new();
        for (i, slot) in self.slots.iter().enumerate() {
            self.versions[i] = slot.version();
            let located = slot.find_active(time_ms);
            if located != self.shown[i] {
                self.shown[i] = located.clone();
                changes.push((slot.id(), located));
            }
        }
        changes
    }

    /// Ticks until cancelled or the receiver goes away
    pub async fn run(
        mut self,
        position: Arc<PlaybackPosition>,
        period: Duration,
        events: UnboundedSender<SessionEvent>,
        cancel: CancellationToken,
    ) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let Some(time_ms) = position.current() else {
                continue;
            };
            for (slot, cue) in self.tick(time_ms) {
                if events.send(SessionEvent::ActiveCueChanged { slot, cue }).is_err() {
                    return;
                }
            }
        }

        tracing::debug!("Position driver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots() -> (Arc<SubtitleSlot>, Arc<SubtitleSlot>) {
        let primary = Arc::new(SubtitleSlot::new(SlotId::Primary));
        let secondary = Arc::new(SubtitleSlot::new(SlotId::Secondary));
        primary.install(vec![
            Cue::new(1, 1000, 3000, "one"),
            Cue::new(2, 5000, 7000, "two"),
        ]);
        secondary.install(vec![Cue::new(1, 0, 10_000, "uno")]);
        (primary, secondary)
    }

    #[test]
    fn test_seek_guard_admit() {
        let guard = PendingSeekGuard::new(60_000, 2_000);
        assert!(!guard.admit(10_000));
        assert!(!guard.admit(62_000));
        assert!(guard.admit(61_999));
        assert!(guard.admit(59_000));
    }

    #[test]
    fn test_stale_reports_are_dropped_until_seek_lands() {
        let position = PlaybackPosition::new(2_000);
        position.report(10_000);
        position.seek_to(60_000);

        assert!(!position.report(10_100));
        assert_eq!(position.current(), Some(60_000));
        assert!(position.is_seeking());

        assert!(position.report(60_300));
        assert!(!position.is_seeking());
        assert!(position.report(60_400));
        assert_eq!(position.current(), Some(60_400));
    }

    #[test]
    fn test_newer_seek_supersedes() {
        let position = PlaybackPosition::new(2_000);
        position.seek_to(60_000);
        position.seek_to(120_000);
        assert!(!position.report(60_000));
        assert!(position.report(120_500));
    }

    #[test]
    fn test_dragging_hides_position() {
        let position = PlaybackPosition::new(2_000);
        position.report(5_000);
        position.set_dragging(true);
        assert_eq!(position.current(), None);
        position.set_dragging(false);
        assert_eq!(position.current(), Some(5_000));
    }

    #[test]
    fn test_tick_emits_only_on_change() {
        let (primary, secondary) = slots();
        let mut driver = PositionDriver::new(vec![primary, secondary], 1);

        let first = driver.tick(2000);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].0, SlotId::Primary);
        assert_eq!(first[0].1.as_ref().unwrap().text, "one");
        assert_eq!(first[1].1.as_ref().unwrap().text, "uno");

        assert!(driver.tick(2000).is_empty());
        assert!(driver.tick(2100).is_empty());

        let gap = driver.tick(4000);
        assert_eq!(gap, vec![(SlotId::Primary, None)]);

        let second = driver.tick(6000);
        assert_eq!(second[0].1.as_ref().unwrap().index, 2);
    }

    #[test]
    fn test_install_is_picked_up_at_standstill() {
        let (primary, secondary) = slots();
        let mut driver = PositionDriver::new(vec![primary.clone(), secondary], 1);
        driver.tick(2000);

        primary.install(vec![Cue::new(9, 1500, 2500, "replaced")]);
        let changes = driver.tick(2000);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].1.as_ref().unwrap().text, "replaced");

        primary.clear();
        assert_eq!(driver.tick(2000), vec![(SlotId::Primary, None)]);
    }

    #[tokio::test]
    async fn test_run_sends_events_and_stops() {
        let (primary, secondary) = slots();
        let driver = PositionDriver::new(vec![primary, secondary], 1);
        let position = Arc::new(PlaybackPosition::new(2_000));
        position.report(2000);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(driver.run(
            position.clone(),
            Duration::from_millis(10),
            tx,
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.cancel();
        handle.await.unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.len(), 2);
    }
}
