//! Media Session
//!
//! The single owner of the side-channel state for the loaded video. Every
//! public operation degrades to an empty or `None` result under expected
//! failures (missing tool, timeout, busy, cancelled) and reports progress
//! through [`SessionEvent`]s.
//!
//! ```rust,ignore
//! let session = MediaSession::new(MediaSettings::default()).await;
//! let mut events = session.subscribe().unwrap();
//! session.load_video("/videos/movie.mkv", 5_400_000);
//!
//! let tracks = session.probe_tracks().await;
//! session.select_track(SlotId::Primary, TrackChoice::Embedded(0)).await;
//! session.spawn_position_driver();
//! let hover = session.hover_driver();
//! hover.hover_ratio(0.5);
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::captions::load_srt_file;
use crate::core::events::SessionEvent;
use crate::core::ffmpeg::{create_ffmpeg_state, FFmpegInfo, FFmpegState, SharedFFmpegState};
use crate::core::settings::MediaSettings;
use crate::core::sync::{
    HoverDriver, HoverHandle, PlaybackPosition, PositionDriver, SlotId, SubtitleSlot, TrackStatus,
};
use crate::core::thumbnails::{FrameDecoder, Thumbnail, ThumbnailService};
use crate::core::tracks::{FfmpegDemuxer, SubtitleTrack, TrackExtractor, TrackProber};
use crate::core::types::{TimeMs, VideoContext};
use crate::core::CoreError;

/// What to show in a subtitle slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackChoice {
    /// Hide the slot; never extracts
    Disable,
    /// The N-th embedded subtitle stream (subtitle-local index)
    Embedded(usize),
}

/// Collaborators of a session; `MediaSession::new` builds them from the
/// detected FFmpeg installation
pub struct SessionParts {
    pub decoder: Option<Arc<dyn FrameDecoder>>,
    pub prober: Option<TrackProber>,
    pub extractor: Option<TrackExtractor>,
    /// Root for temporary frames and extracted subtitles
    pub temp_dir: PathBuf,
}

impl SessionParts {
    /// No external tool: thumbnails and embedded subtitles stay off
    pub fn unavailable(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            decoder: None,
            prober: None,
            extractor: None,
            temp_dir: temp_dir.into(),
        }
    }
}

pub struct MediaSession {
    settings: MediaSettings,
    ffmpeg: SharedFFmpegState,
    thumbnails: Arc<ThumbnailService>,
    prober: Option<TrackProber>,
    extractor: Option<TrackExtractor>,
    primary: Arc<SubtitleSlot>,
    secondary: Arc<SubtitleSlot>,
    video: RwLock<Option<VideoContext>>,
    tracks: Mutex<Vec<SubtitleTrack>>,
    /// Cancelled when the video changes; probing and extraction use it
    video_cancel: Mutex<CancellationToken>,
    position: Arc<PlaybackPosition>,
    events_tx: UnboundedSender<SessionEvent>,
    events_rx: Mutex<Option<UnboundedReceiver<SessionEvent>>>,
    shutdown: CancellationToken,
}

impl MediaSession {
    /// Creates a session, detecting FFmpeg once.
    ///
    /// A missing tool is not an error: the session still plays external
    /// subtitle files, while thumbnails and embedded tracks stay off.
    pub async fn new(settings: MediaSettings) -> Self {
        let mut settings = settings;
        settings.normalize();

        let mut state = FFmpegState::new();
        if let Err(e) = state.initialize(&settings.tools).await {
            tracing::warn!("Media side-channel running without FFmpeg: {}", e);
        }

        let temp_dir = std::env::temp_dir().join("langv");
        let parts = match state.runner() {
            Some(runner) => SessionParts {
                decoder: Some(Arc::new(runner.clone()) as Arc<dyn FrameDecoder>),
                prober: Some(TrackProber::for_runner(
                    runner,
                    Duration::from_millis(settings.subtitles.probe_timeout_ms),
                )),
                extractor: Some(
                    TrackExtractor::new(
                        Arc::new(FfmpegDemuxer::new(runner.clone())),
                        Duration::from_millis(settings.subtitles.extraction_timeout_ms),
                    )
                    .with_temp_dir(&temp_dir),
                ),
                temp_dir,
            },
            None => SessionParts::unavailable(temp_dir),
        };

        Self::assemble(settings, Arc::new(tokio::sync::RwLock::new(state)), parts)
    }

    /// Creates a session around explicit collaborators
    pub fn from_parts(settings: MediaSettings, parts: SessionParts) -> Self {
        let mut settings = settings;
        settings.normalize();
        Self::assemble(settings, create_ffmpeg_state(), parts)
    }

    fn assemble(settings: MediaSettings, ffmpeg: SharedFFmpegState, parts: SessionParts) -> Self {
        let thumbnails = Arc::new(ThumbnailService::with_temp_dir(
            parts.decoder,
            settings.thumbnails.clone(),
            parts.temp_dir.join("thumbnails"),
        ));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            position: Arc::new(PlaybackPosition::new(settings.sync.seek_tolerance_ms)),
            settings,
            ffmpeg,
            thumbnails,
            prober: parts.prober,
            extractor: parts.extractor,
            primary: Arc::new(SubtitleSlot::new(SlotId::Primary)),
            secondary: Arc::new(SubtitleSlot::new(SlotId::Secondary)),
            video: RwLock::new(None),
            tracks: Mutex::new(Vec::new()),
            video_cancel: Mutex::new(CancellationToken::new()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            shutdown: CancellationToken::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn settings(&self) -> &MediaSettings {
        &self.settings
    }

    /// The detected FFmpeg installation, if any
    pub async fn tool_info(&self) -> Option<FFmpegInfo> {
        self.ffmpeg.read().await.info().cloned()
    }

    /// The event stream; only the first call gets it
    pub fn subscribe(&self) -> Option<UnboundedReceiver<SessionEvent>> {
        self.events_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    pub fn video(&self) -> Option<VideoContext> {
        self.video.read().ok().and_then(|v| v.clone())
    }

    pub fn slot(&self, id: SlotId) -> &Arc<SubtitleSlot> {
        match id {
            SlotId::Primary => &self.primary,
            SlotId::Secondary => &self.secondary,
        }
    }

    pub fn thumbnails(&self) -> &Arc<ThumbnailService> {
        &self.thumbnails
    }

    /// Position source for the drivers; the host reports into it
    pub fn position(&self) -> &Arc<PlaybackPosition> {
        &self.position
    }

    /// Tracks found by the last probe
    pub fn tracks(&self) -> Vec<SubtitleTrack> {
        self.tracks.lock().map(|t| t.clone()).unwrap_or_default()
    }

    // =========================================================================
    // Video lifecycle
    // =========================================================================

    /// Replaces the loaded video.
    ///
    /// Resets thumbnails, cancels in-flight probing and extraction, empties
    /// both slots and rewinds the position.
    pub fn load_video(&self, path: impl Into<PathBuf>, duration_ms: TimeMs) {
        let context = VideoContext::new(path, duration_ms);
        tracing::info!(
            "Loading video {} ({} ms)",
            context.path.display(),
            duration_ms
        );

        let video_token = {
            let mut token = self.video_cancel.lock().unwrap_or_else(|p| p.into_inner());
            token.cancel();
            *token = CancellationToken::new();
            token.clone()
        };
        if let Ok(mut video) = self.video.write() {
            *video = Some(context.clone());
        }
        if let Ok(mut tracks) = self.tracks.lock() {
            tracks.clear();
        }

        self.thumbnails.set_video(Some(context));
        self.position.reset();
        for id in SlotId::ALL {
            let slot = self.slot(id);
            let selection = slot.begin_selection(&video_token);
            slot.commit(&selection, |s| {
                s.clear();
                self.set_status(id, TrackStatus::None);
            });
        }
    }

    /// Duration reported late by the playback engine; keeps the cache
    pub fn set_duration(&self, duration_ms: TimeMs) {
        let updated = {
            let Ok(mut video) = self.video.write() else {
                return;
            };
            let Some(current) = video.as_mut() else {
                return;
            };
            current.duration_ms = duration_ms;
            current.clone()
        };
        self.thumbnails.set_video(Some(updated));
    }

    // =========================================================================
    // Tracks
    // =========================================================================

    /// Lists the embedded subtitle tracks of the loaded video.
    ///
    /// Empty when there is no video, no tool, or the probe failed.
    pub async fn probe_tracks(&self) -> Vec<SubtitleTrack> {
        let Some(video) = self.video() else {
            return Vec::new();
        };
        let Some(prober) = self.prober.as_ref() else {
            return Vec::new();
        };

        let cancel = self.video_token();
        let tracks = match prober.probe_tracks(&video.path, &cancel).await {
            Ok(tracks) => tracks,
            Err(e) => {
                log_degraded("Subtitle probe", &e);
                Vec::new()
            }
        };
        if cancel.is_cancelled() {
            return Vec::new();
        }

        if let Ok(mut stored) = self.tracks.lock() {
            *stored = tracks.clone();
        }
        if tracks.is_empty() {
            for id in SlotId::ALL {
                if self.slot(id).status() == TrackStatus::None {
                    self.set_status(id, TrackStatus::NoEmbedded);
                }
            }
        }
        tracks
    }

    /// Shows `choice` in `slot` and returns the slot's resulting status.
    ///
    /// A newer selection on the same slot (or a new video) supersedes this
    /// one: its extraction is cancelled and its result never installed.
    pub async fn select_track(&self, slot: SlotId, choice: TrackChoice) -> TrackStatus {
        let target = self.slot(slot);
        let selection = target.begin_selection(&self.video_token());

        let subtitle_index = match choice {
            TrackChoice::Disable => {
                return target
                    .commit(&selection, |s| {
                        s.clear();
                        self.set_status(slot, TrackStatus::None);
                        TrackStatus::None
                    })
                    .unwrap_or_else(|| target.status());
            }
            TrackChoice::Embedded(index) => index,
        };

        let name = self
            .tracks()
            .iter()
            .find(|t| t.subtitle_index == subtitle_index)
            .map(SubtitleTrack::display_name)
            .unwrap_or_else(|| format!("Track {}", subtitle_index + 1));

        let (Some(video), Some(extractor)) = (self.video(), self.extractor.as_ref()) else {
            let status = TrackStatus::Failed {
                name,
                reason: "embedded subtitles unavailable".to_string(),
            };
            return self.commit_status(slot, &selection, status);
        };

        let loading = TrackStatus::Loading { name: name.clone() };
        if target
            .commit(&selection, |_| self.set_status(slot, loading))
            .is_none()
        {
            return target.status();
        }

        let outcome = extractor
            .extract_track(&video.path, subtitle_index, &selection)
            .await;

        target
            .commit(&selection, |s| {
                let status = match outcome {
                    Ok(cues) if cues.is_empty() => TrackStatus::Failed {
                        name,
                        reason: "no text cues".to_string(),
                    },
                    Ok(cues) => {
                        let count = s.install(cues);
                        TrackStatus::Loaded { name, count }
                    }
                    Err(e) => {
                        log_degraded("Subtitle extraction", &e);
                        TrackStatus::Failed {
                            name,
                            reason: e.to_string(),
                        }
                    }
                };
                self.set_status(slot, status.clone());
                status
            })
            .unwrap_or_else(|| {
                tracing::debug!("Superseded {} selection discarded", slot);
                target.status()
            })
    }

    /// Loads an external subtitle file into `slot`; supersedes any selection
    /// still loading there.
    pub async fn load_external(&self, slot: SlotId, path: &Path) -> TrackStatus {
        let target = self.slot(slot);
        let selection = target.begin_selection(&self.video_token());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let loading = TrackStatus::Loading { name: name.clone() };
        if target
            .commit(&selection, |_| self.set_status(slot, loading))
            .is_none()
        {
            return target.status();
        }
        let cues = load_srt_file(path).await;

        target
            .commit(&selection, |s| {
                let status = if cues.is_empty() {
                    TrackStatus::Failed {
                        name,
                        reason: "no cues found".to_string(),
                    }
                } else {
                    let count = s.install(cues);
                    tracing::info!("Loaded {} cue(s) from {} into {}", count, path.display(), slot);
                    TrackStatus::Loaded { name, count }
                };
                self.set_status(slot, status.clone());
                status
            })
            .unwrap_or_else(|| target.status())
    }

    // =========================================================================
    // Thumbnails
    // =========================================================================

    /// Preview frame for `time_ms`, or `None` when none can be had right now
    pub async fn thumbnail_at(&self, time_ms: TimeMs) -> Option<Thumbnail> {
        match self
            .thumbnails
            .get_thumbnail(time_ms, &self.shutdown.child_token())
            .await
        {
            Ok(thumbnail) => thumbnail,
            Err(e) => {
                log_degraded("Thumbnail", &e);
                None
            }
        }
    }

    pub fn set_thumbnails_enabled(&self, enabled: bool) {
        self.thumbnails.set_enabled(enabled);
    }

    // =========================================================================
    // Drivers
    // =========================================================================

    /// Starts the subtitle position driver; it stops on `shutdown`
    pub fn spawn_position_driver(&self) -> JoinHandle<()> {
        let driver = PositionDriver::new(
            vec![self.primary.clone(), self.secondary.clone()],
            self.settings.sync.min_position_change_ms,
        );
        tokio::spawn(driver.run(
            self.position.clone(),
            Duration::from_millis(self.settings.sync.position_tick_ms),
            self.events_tx.clone(),
            self.shutdown.child_token(),
        ))
    }

    /// Starts a debounced hover driver feeding the thumbnail service
    pub fn hover_driver(&self) -> HoverHandle {
        HoverDriver::spawn(
            self.thumbnails.clone(),
            Duration::from_millis(self.settings.sync.hover_debounce_ms),
            self.events_tx.clone(),
            self.shutdown.child_token(),
        )
    }

    /// Stops drivers, cancels in-flight work and disposes the thumbnail
    /// service. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.video_token().cancel();
        self.thumbnails.dispose();
    }

    fn video_token(&self) -> CancellationToken {
        self.video_cancel
            .lock()
            .map(|t| t.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    fn commit_status(
        &self,
        slot: SlotId,
        selection: &CancellationToken,
        status: TrackStatus,
    ) -> TrackStatus {
        let target = self.slot(slot);
        target
            .commit(selection, |_| {
                self.set_status(slot, status.clone());
                status
            })
            .unwrap_or_else(|| target.status())
    }

    fn set_status(&self, slot: SlotId, status: TrackStatus) {
        self.slot(slot).set_status(status.clone());
        let _ = self
            .events_tx
            .send(SessionEvent::TrackStatusChanged { slot, status });
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn log_degraded(what: &str, err: &CoreError) {
    if err.is_expected() {
        tracing::debug!("{} unavailable: {}", what, err);
    } else {
        tracing::warn!("{} failed: {}", what, err);
    }
}
