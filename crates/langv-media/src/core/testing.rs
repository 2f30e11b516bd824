//! Test doubles for the subprocess seams.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use tokio_util::sync::CancellationToken;

use crate::core::ffmpeg::FrameRequest;
use crate::core::thumbnails::FrameDecoder;
use crate::core::tracks::{SubtitleDemuxer, SubtitleTrack, TrackProbeStrategy};
use crate::core::{CoreError, CoreResult};

/// Writes a blank frame of the requested size and counts invocations
#[derive(Default)]
pub struct CountingDecoder {
    calls: AtomicUsize,
}

impl CountingDecoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameDecoder for CountingDecoder {
    async fn extract_frame(
        &self,
        _video: &Path,
        request: &FrameRequest,
        output: &Path,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> CoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        RgbImage::new(request.width, request.height)
            .save_with_format(output, image::ImageFormat::Jpeg)
            .map_err(|e| CoreError::Internal(e.to_string()))
    }
}

/// Writes fixed SRT text for every demux request
pub struct StaticDemuxer {
    srt: String,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl StaticDemuxer {
    pub fn new(srt: impl Into<String>) -> Self {
        Self {
            srt: srt.into(),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Holds each demux for `delay`, returning early when cancelled
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubtitleDemuxer for StaticDemuxer {
    async fn demux(
        &self,
        _video: &Path,
        _subtitle_index: usize,
        output: &Path,
        _timeout: Duration,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(CoreError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        std::fs::write(output, &self.srt)?;
        Ok(())
    }
}

/// Reports a fixed track list
pub struct StaticStrategy {
    tracks: Vec<SubtitleTrack>,
}

impl StaticStrategy {
    pub fn new(tracks: Vec<SubtitleTrack>) -> Self {
        Self { tracks }
    }
}

#[async_trait]
impl TrackProbeStrategy for StaticStrategy {
    fn name(&self) -> &'static str {
        "static"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn probe(
        &self,
        _video: &Path,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> CoreResult<Vec<SubtitleTrack>> {
        Ok(self.tracks.clone())
    }
}
