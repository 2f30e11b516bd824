//! Seek-bar Thumbnails
//!
//! Preview frames for the position under the pointer:
//! - [`ThumbnailCache`]: time-bucketed, size-bounded, cleared per video
//! - [`ThumbnailService`]: single-flight generation with a two-step seek fallback
//! - [`FrameDecoder`]: the subprocess seam (implemented by [`FFmpegRunner`])

mod cache;
mod generator;

pub use cache::{bucket_key, ThumbnailCache};
pub use generator::{ThumbnailService, THUMBNAIL_FILE_PREFIX};

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use tokio_util::sync::CancellationToken;

use crate::core::ffmpeg::{FFmpegRunner, FrameRequest};
use crate::core::types::TimeMs;
use crate::core::{CoreError, CoreResult};

/// A decoded preview frame
#[derive(Clone)]
pub struct Thumbnail {
    time_ms: TimeMs,
    image: Arc<RgbImage>,
}

impl Thumbnail {
    pub fn new(time_ms: TimeMs, image: RgbImage) -> Self {
        Self {
            time_ms,
            image: Arc::new(image),
        }
    }

    /// Decodes JPEG bytes as written by the decoder subprocess
    pub fn from_jpeg(time_ms: TimeMs, bytes: &[u8]) -> CoreResult<Self> {
        let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
            .map_err(|e| CoreError::MalformedInput(format!("Invalid thumbnail image: {}", e)))?;
        Ok(Self::new(time_ms, image.to_rgb8()))
    }

    /// Time the frame was decoded at (the bucket key)
    pub fn time_ms(&self) -> TimeMs {
        self.time_ms
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Writes the frame to disk; the format follows the file extension
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        self.image
            .save(path)
            .map_err(|e| CoreError::Internal(format!("Failed to save thumbnail: {}", e)))
    }
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnail")
            .field("time_ms", &self.time_ms)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Writes one frame of a video to an image file
#[async_trait]
pub trait FrameDecoder: Send + Sync {
    async fn extract_frame(
        &self,
        video: &Path,
        request: &FrameRequest,
        output: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> CoreResult<()>;
}

#[async_trait]
impl FrameDecoder for FFmpegRunner {
    async fn extract_frame(
        &self,
        video: &Path,
        request: &FrameRequest,
        output: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        FFmpegRunner::extract_frame(self, video, request, output, timeout, cancel).await?;
        Ok(())
    }
}
