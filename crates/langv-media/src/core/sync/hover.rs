//! Debounced seek-bar hover driver.
//!
//! Every pointer move publishes the hovered time at once; a thumbnail is
//! only requested after the pointer has rested for the debounce window, so
//! fast sweeps across the bar cost at most one decode per pause.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::core::events::SessionEvent;
use crate::core::thumbnails::ThumbnailService;
use crate::core::types::{time_for_ratio, TimeMs};

#[derive(Debug, Clone, Copy)]
enum HoverInput {
    At(TimeMs),
    Leave,
}

/// Host-facing handle; cheap to clone
#[derive(Clone)]
pub struct HoverHandle {
    tx: UnboundedSender<HoverInput>,
    thumbnails: Arc<ThumbnailService>,
}

impl HoverHandle {
    /// Pointer moved to `ratio` (0.0 left edge, 1.0 right edge) of the bar.
    ///
    /// Returns the hovered time, or `None` while no video duration is known.
    pub fn hover_ratio(&self, ratio: f64) -> Option<TimeMs> {
        let video = self.thumbnails.video().filter(|v| v.has_duration())?;
        let time_ms = time_for_ratio(ratio, video.duration_ms);
        self.hover_time(time_ms);
        Some(time_ms)
    }

    /// Pointer moved to a known time
    pub fn hover_time(&self, time_ms: TimeMs) {
        let _ = self.tx.send(HoverInput::At(time_ms));
    }

    /// Pointer left the bar; any pending request is dropped
    pub fn leave(&self) {
        let _ = self.tx.send(HoverInput::Leave);
    }
}

pub struct HoverDriver;

impl HoverDriver {
    /// Starts the driver task and returns its handle.
    ///
    /// The task ends when `cancel` fires or every handle is dropped.
    pub fn spawn(
        thumbnails: Arc<ThumbnailService>,
        debounce: Duration,
        events: UnboundedSender<SessionEvent>,
        cancel: CancellationToken,
    ) -> HoverHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, thumbnails.clone(), debounce, events, cancel));
        HoverHandle { tx, thumbnails }
    }
}

async fn run(
    mut rx: UnboundedReceiver<HoverInput>,
    thumbnails: Arc<ThumbnailService>,
    debounce: Duration,
    events: UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
) {
    let mut pending: Option<TimeMs> = None;

    loop {
        // Re-created each turn: any input restarts the window
        let armed = pending.is_some();
        let settle = async move {
            if armed {
                tokio::time::sleep(debounce).await
            } else {
                std::future::pending::<()>().await
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            input = rx.recv() => match input {
                Some(HoverInput::At(time_ms)) => {
                    let _ = events.send(SessionEvent::HoverTime { time_ms });
                    pending = Some(time_ms);
                }
                Some(HoverInput::Leave) => pending = None,
                None => break,
            },
            _ = settle => {
                if let Some(time_ms) = pending.take() {
                    request(&thumbnails, time_ms, &events, &cancel);
                }
            }
        }
    }

    tracing::debug!("Hover driver stopped");
}

/// Generates off the driver task so hover input stays responsive
fn request(
    thumbnails: &Arc<ThumbnailService>,
    time_ms: TimeMs,
    events: &UnboundedSender<SessionEvent>,
    cancel: &CancellationToken,
) {
    let thumbnails = thumbnails.clone();
    let events = events.clone();
    let cancel = cancel.child_token();

    tokio::spawn(async move {
        match thumbnails.get_thumbnail(time_ms, &cancel).await {
            Ok(Some(thumbnail)) => {
                let _ = events.send(SessionEvent::ThumbnailReady {
                    time_ms,
                    thumbnail,
                });
            }
            Ok(None) => tracing::debug!("No thumbnail produced at {} ms", time_ms),
            Err(e) if e.is_expected() => tracing::trace!("Thumbnail skipped at {} ms: {}", time_ms, e),
            Err(e) => tracing::warn!("Thumbnail failed at {} ms: {}", time_ms, e),
        }
    });
}
