//! Subtitle stream extraction.
//!
//! Demuxes one subtitle stream into a temporary SRT file, parses it, and
//! removes the file on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::captions::{load_srt_file, Cue};
use crate::core::ffmpeg::FFmpegRunner;
use crate::core::process::TempFileGuard;
use crate::core::{CoreError, CoreResult};

/// Writes one subtitle stream of a container to an SRT file
#[async_trait]
pub trait SubtitleDemuxer: Send + Sync {
    async fn demux(
        &self,
        video: &Path,
        subtitle_index: usize,
        output: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> CoreResult<()>;
}

/// Demuxing through `ffmpeg -map 0:s:N -c:s srt`
pub struct FfmpegDemuxer {
    runner: FFmpegRunner,
}

impl FfmpegDemuxer {
    pub fn new(runner: FFmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl SubtitleDemuxer for FfmpegDemuxer {
    async fn demux(
        &self,
        video: &Path,
        subtitle_index: usize,
        output: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        self.runner
            .demux_subtitle(video, subtitle_index, output, timeout, cancel)
            .await?;
        Ok(())
    }
}

/// Extracts embedded subtitle streams into cue lists
pub struct TrackExtractor {
    demuxer: Arc<dyn SubtitleDemuxer>,
    timeout: Duration,
    temp_dir: PathBuf,
}

impl TrackExtractor {
    pub fn new(demuxer: Arc<dyn SubtitleDemuxer>, timeout: Duration) -> Self {
        Self {
            demuxer,
            timeout,
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Use a different directory for the intermediate SRT files
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Extracts the `subtitle_index`-th subtitle stream of `video`.
    ///
    /// The demuxer is killed when the deadline passes or `cancel` fires; the
    /// temporary file is removed in every case.
    pub async fn extract_track(
        &self,
        video: &Path,
        subtitle_index: usize,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<Cue>> {
        if !video.exists() {
            return Err(CoreError::FileNotFound(video.display().to_string()));
        }

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let temp = TempFileGuard::new(
            self.temp_dir
                .join(format!("langv_sub_{}.srt", uuid::Uuid::new_v4())),
        );

        tracing::debug!(
            "Extracting subtitle stream {} of {} to {}",
            subtitle_index,
            video.display(),
            temp.path().display()
        );

        self.demuxer
            .demux(video, subtitle_index, temp.path(), self.timeout, cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        if !temp.path().exists() {
            return Err(CoreError::Internal(format!(
                "Extraction of subtitle stream {} produced no output",
                subtitle_index
            )));
        }

        let cues = load_srt_file(temp.path()).await;
        tracing::info!(
            "Extracted {} cue(s) from subtitle stream {}",
            cues.len(),
            subtitle_index
        );
        Ok(cues)
    }
}
