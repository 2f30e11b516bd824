//! Thumbnail generation service.
//!
//! Request flow:
//! 1. Reject when disabled, disposed, without a video, or without a duration
//! 2. Quantize the time to its bucket; serve cache hits
//! 3. Take the single-slot generation guard, waiting at most `guard_wait_ms`;
//!    when another generation holds it, give up immediately
//! 4. Re-check the cache under the guard
//! 5. Decode with combined seeking, then output-only seeking if that produced
//!    nothing, all within `generation_timeout_ms`
//! 6. Cache the frame if there is room; the guard is released on drop

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::{FrameDecoder, Thumbnail, ThumbnailCache};
use crate::core::ffmpeg::{FrameRequest, SeekMode};
use crate::core::process::TempFileGuard;
use crate::core::settings::ThumbnailSettings;
use crate::core::types::{TimeMs, VideoContext};
use crate::core::{CoreError, CoreResult};

/// Prefix of the temporary frame files
pub const THUMBNAIL_FILE_PREFIX: &str = "thumb_";

pub struct ThumbnailService {
    /// `None` when no decoder was found at startup
    decoder: Option<Arc<dyn FrameDecoder>>,
    settings: ThumbnailSettings,
    cache: ThumbnailCache,
    guard: Semaphore,
    video: RwLock<Option<VideoContext>>,
    /// Cancelled whenever the video changes or the service is disposed
    video_token: Mutex<CancellationToken>,
    enabled: AtomicBool,
    disposed: AtomicBool,
    temp_dir: PathBuf,
}

impl ThumbnailService {
    pub fn new(decoder: Option<Arc<dyn FrameDecoder>>, settings: ThumbnailSettings) -> Self {
        let temp_dir = std::env::temp_dir().join("langv").join("thumbnails");
        Self::with_temp_dir(decoder, settings, temp_dir)
    }

    pub fn with_temp_dir(
        decoder: Option<Arc<dyn FrameDecoder>>,
        settings: ThumbnailSettings,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        if decoder.is_none() {
            tracing::warn!("No frame decoder available, thumbnails disabled");
        }

        Self {
            cache: ThumbnailCache::new(settings.bucket_interval_ms, settings.max_cache_size),
            enabled: AtomicBool::new(settings.enabled),
            decoder,
            settings,
            guard: Semaphore::new(1),
            video: RwLock::new(None),
            video_token: Mutex::new(CancellationToken::new()),
            disposed: AtomicBool::new(false),
            temp_dir: temp_dir.into(),
        }
    }

    /// Whether requests can currently produce thumbnails
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst) && self.decoder.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn cache(&self) -> &ThumbnailCache {
        &self.cache
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Current video context, if any
    pub fn video(&self) -> Option<VideoContext> {
        self.video.read().ok().and_then(|v| v.clone())
    }

    /// Installs the video thumbnails are generated for.
    ///
    /// A different path clears the cache and cancels in-flight generations;
    /// the same path only updates the duration.
    pub fn set_video(&self, video: Option<VideoContext>) {
        let Ok(mut current) = self.video.write() else {
            return;
        };

        let same_path = match (current.as_ref(), video.as_ref()) {
            (Some(a), Some(b)) => a.path == b.path,
            (None, None) => true,
            _ => false,
        };

        if !same_path {
            self.cache.clear();
            self.reset_token();
            tracing::debug!(
                "Thumbnail video changed to {:?}",
                video.as_ref().map(|v| v.path.display().to_string())
            );
        }
        *current = video;
    }

    /// Turns generation on or off; turning it off clears the cache
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.cache.clear();
        }
    }

    /// Stops the service: cancels in-flight work, clears the cache and
    /// removes leftover frame files. Later requests fail with `Disposed`.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.guard.close();
        self.current_token().cancel();
        self.cache.clear();
        self.remove_leftover_files();
    }

    /// Returns the thumbnail for `time_ms`.
    ///
    /// `Ok(None)` means both seek strategies produced nothing. Rejections
    /// (disabled, busy, no video, ...) are errors the caller is expected to
    /// treat as "no thumbnail".
    pub async fn get_thumbnail(
        &self,
        time_ms: TimeMs,
        cancel: &CancellationToken,
    ) -> CoreResult<Option<Thumbnail>> {
        if self.is_disposed() {
            return Err(CoreError::Disposed);
        }
        let Some(decoder) = self.decoder.clone() else {
            return Err(CoreError::ToolUnavailable("frame decoder".to_string()));
        };
        if !self.enabled.load(Ordering::SeqCst) {
            return Err(CoreError::Disabled("thumbnails".to_string()));
        }
        // Taken before the video snapshot so a switch in between cancels it
        let token = self.current_token();
        let epoch = self.cache.epoch();
        let Some(video) = self.video() else {
            return Err(CoreError::NoVideoLoaded);
        };
        if !video.has_duration() {
            return Err(CoreError::Disabled("video duration unknown".to_string()));
        }

        let key = self
            .cache
            .key_for(time_ms.clamp(0, video.duration_ms));
        if let Some(hit) = self.cache.get(key) {
            tracing::trace!("Thumbnail cache hit at {}", key);
            return Ok(Some(hit));
        }

        let guard_wait = Duration::from_millis(self.settings.guard_wait_ms);
        let _permit = match tokio::time::timeout(guard_wait, self.guard.acquire()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(CoreError::Disposed),
            Err(_) => return Err(CoreError::Busy("thumbnail generation in flight".to_string())),
        };

        if let Some(hit) = self.cache.get(key) {
            return Ok(Some(hit));
        }

        let deadline = Duration::from_millis(self.settings.generation_timeout_ms);
        let generation = self.generate(decoder.as_ref(), &video, key, deadline, &token);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CoreError::Cancelled),
            result = tokio::time::timeout(deadline, generation) => match result {
                Ok(r) => r,
                Err(_) => {
                    tracing::warn!("Thumbnail generation at {} exceeded {:?}", key, deadline);
                    Err(CoreError::Timeout(format!("thumbnail at {} ms", key)))
                }
            },
        }?;

        // The video may have changed while the decoder ran
        if token.is_cancelled() || self.is_disposed() {
            return Err(CoreError::Cancelled);
        }
        let Some(thumb) = outcome else {
            return Ok(None);
        };

        // The epoch check inside the insert is atomic with `clear`
        match self.cache.insert_if_absent(key, thumb.clone(), epoch) {
            Some(cached) => Ok(Some(cached)),
            None if self.cache.epoch() != epoch => Err(CoreError::Cancelled),
            None => Ok(Some(thumb)),
        }
    }

    async fn generate(
        &self,
        decoder: &dyn FrameDecoder,
        video: &VideoContext,
        key: TimeMs,
        deadline: Duration,
        token: &CancellationToken,
    ) -> CoreResult<Option<Thumbnail>> {
        let output = TempFileGuard::new(
            self.temp_dir
                .join(format!("{}{}.jpg", THUMBNAIL_FILE_PREFIX, uuid::Uuid::new_v4().simple())),
        );

        let first = SeekMode::preferred(key, self.settings.pre_seek_ms);
        if let Some(thumb) = self
            .attempt(decoder, video, key, first, output.path(), deadline, token)
            .await?
        {
            return Ok(Some(thumb));
        }

        if first == SeekMode::Combined {
            tracing::warn!(
                "Combined seek produced no frame at {} ms, retrying with output-only seek",
                key
            );
            return self
                .attempt(
                    decoder,
                    video,
                    key,
                    SeekMode::OutputOnly,
                    output.path(),
                    deadline,
                    token,
                )
                .await;
        }

        Ok(None)
    }

    /// One decoder run. Cancellation and timeouts propagate; any other
    /// failure is reported as "no frame" so the fallback can run.
    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        decoder: &dyn FrameDecoder,
        video: &VideoContext,
        key: TimeMs,
        mode: SeekMode,
        output: &Path,
        deadline: Duration,
        token: &CancellationToken,
    ) -> CoreResult<Option<Thumbnail>> {
        let _ = tokio::fs::remove_file(output).await;

        let request = FrameRequest {
            time_ms: key,
            mode,
            pre_seek_ms: self.settings.pre_seek_ms,
            width: self.settings.width,
            height: self.settings.height,
            quality: self.settings.quality,
        };

        match decoder
            .extract_frame(&video.path, &request, output, deadline, token)
            .await
        {
            Ok(()) => {}
            Err(e @ (CoreError::Cancelled | CoreError::Timeout(_))) => return Err(e),
            Err(e) => {
                tracing::debug!("Frame extraction ({}) failed: {}", mode.as_str(), e);
            }
        }

        let bytes = match tokio::fs::read(output).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            _ => return Ok(None),
        };

        match Thumbnail::from_jpeg(key, &bytes) {
            Ok(thumb) => Ok(Some(thumb)),
            Err(e) => {
                tracing::debug!("Discarding undecodable frame at {} ms: {}", key, e);
                Ok(None)
            }
        }
    }

    fn current_token(&self) -> CancellationToken {
        self.video_token
            .lock()
            .map(|t| t.clone())
            .unwrap_or_else(|p| p.into_inner().clone())
    }

    fn reset_token(&self) {
        let mut token = self.video_token.lock().unwrap_or_else(|p| p.into_inner());
        token.cancel();
        *token = CancellationToken::new();
    }

    fn remove_leftover_files(&self) {
        let Ok(entries) = std::fs::read_dir(&self.temp_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(THUMBNAIL_FILE_PREFIX) && name.ends_with(".jpg") {
                if let Err(e) = std::fs::remove_file(entry.path()) {
                    tracing::warn!(
                        "{}",
                        CoreError::CleanupFailed(format!("{}: {}", entry.path().display(), e))
                    );
                }
            }
        }
    }
}

impl Drop for ThumbnailService {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::RgbImage;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    /// Records every invocation; writes a frame unless told to fail for
    /// the given seek mode
    #[derive(Default)]
    struct FakeDecoder {
        calls: Mutex<Vec<(TimeMs, SeekMode)>>,
        fail_combined: bool,
        fail_all: bool,
        delay: Option<Duration>,
        /// Keep decoding through cancellation, like a process that ignores
        /// the kill until it exits
        ignore_cancel: bool,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl FakeDecoder {
        fn calls(&self) -> Vec<(TimeMs, SeekMode)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl FrameDecoder for FakeDecoder {
        async fn extract_frame(
            &self,
            _video: &Path,
            request: &FrameRequest,
            output: &Path,
            _timeout: Duration,
            cancel: &CancellationToken,
        ) -> CoreResult<()> {
            self.calls.lock().unwrap().push((request.time_ms, request.mode));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            match self.delay {
                Some(delay) if self.ignore_cancel => tokio::time::sleep(delay).await,
                Some(delay) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            self.in_flight.fetch_sub(1, Ordering::SeqCst);
                            return Err(CoreError::Cancelled);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => {}
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_all || (self.fail_combined && request.mode == SeekMode::Combined) {
                return Err(CoreError::Internal("no frame".into()));
            }
            std::fs::create_dir_all(output.parent().unwrap())?;
            RgbImage::new(request.width, request.height)
                .save_with_format(output, image::ImageFormat::Jpeg)
                .map_err(|e| CoreError::Internal(e.to_string()))?;
            Ok(())
        }
    }

    struct Fixture {
        service: ThumbnailService,
        decoder: Arc<FakeDecoder>,
        _video: tempfile::NamedTempFile,
        temp: TempDir,
    }

    fn fixture(decoder: FakeDecoder, settings: ThumbnailSettings) -> Fixture {
        let decoder = Arc::new(decoder);
        let temp = TempDir::new().unwrap();
        let video = tempfile::NamedTempFile::new().unwrap();
        let service = ThumbnailService::with_temp_dir(
            Some(decoder.clone() as Arc<dyn FrameDecoder>),
            settings,
            temp.path().join("thumbnails"),
        );
        service.set_video(Some(VideoContext::new(video.path(), 600_000)));
        Fixture {
            service,
            decoder,
            _video: video,
            temp,
        }
    }

    #[tokio::test]
    async fn test_same_bucket_decodes_once() {
        let f = fixture(FakeDecoder::default(), ThumbnailSettings::default());
        let cancel = CancellationToken::new();

        let first = f.service.get_thumbnail(125_000, &cancel).await.unwrap().unwrap();
        let second = f.service.get_thumbnail(129_999, &cancel).await.unwrap().unwrap();

        assert_eq!(first.time_ms(), 120_000);
        assert_eq!(second.time_ms(), 120_000);
        assert_eq!(f.decoder.calls().len(), 1);
        assert_eq!(f.service.cache().len(), 1);
        assert_eq!((first.width(), first.height()), (200, 112));
    }

    #[tokio::test]
    async fn test_combined_failure_falls_back_to_output_seek() {
        let f = fixture(
            FakeDecoder {
                fail_combined: true,
                ..Default::default()
            },
            ThumbnailSettings::default(),
        );

        let thumb = f
            .service
            .get_thumbnail(300_000, &CancellationToken::new())
            .await
            .unwrap();

        assert!(thumb.is_some());
        assert_eq!(
            f.decoder.calls(),
            vec![
                (300_000, SeekMode::Combined),
                (300_000, SeekMode::OutputOnly)
            ]
        );
    }

    #[tokio::test]
    async fn test_early_target_uses_output_seek_only() {
        let f = fixture(
            FakeDecoder {
                fail_all: true,
                ..Default::default()
            },
            ThumbnailSettings::default(),
        );

        let thumb = f
            .service
            .get_thumbnail(12_000, &CancellationToken::new())
            .await
            .unwrap();

        assert!(thumb.is_none());
        assert_eq!(f.decoder.calls(), vec![(10_000, SeekMode::OutputOnly)]);
        assert!(f.service.cache().is_empty());
    }

    #[tokio::test]
    async fn test_busy_guard_returns_without_blocking() {
        let f = fixture(
            FakeDecoder {
                delay: Some(Duration::from_millis(500)),
                ..Default::default()
            },
            ThumbnailSettings::default(),
        );
        let service = Arc::new(f.service);
        let cancel = CancellationToken::new();

        let slow = {
            let service = service.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { service.get_thumbnail(300_000, &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        let busy = service.get_thumbnail(400_000, &cancel).await;
        assert!(matches!(busy, Err(CoreError::Busy(_))));
        assert!(started.elapsed() < Duration::from_millis(400));

        assert!(slow.await.unwrap().unwrap().is_some());
        assert_eq!(f.decoder.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejections() {
        let f = fixture(FakeDecoder::default(), ThumbnailSettings::default());
        let cancel = CancellationToken::new();

        f.service.set_enabled(false);
        assert!(matches!(
            f.service.get_thumbnail(0, &cancel).await,
            Err(CoreError::Disabled(_))
        ));
        f.service.set_enabled(true);

        let path = f.service.video().unwrap().path;
        f.service.set_video(Some(VideoContext::new(&path, 0)));
        assert!(matches!(
            f.service.get_thumbnail(0, &cancel).await,
            Err(CoreError::Disabled(_))
        ));

        f.service.set_video(None);
        assert!(matches!(
            f.service.get_thumbnail(0, &cancel).await,
            Err(CoreError::NoVideoLoaded)
        ));

        let no_tool = ThumbnailService::with_temp_dir(
            None,
            ThumbnailSettings::default(),
            f.temp.path().join("none"),
        );
        assert!(!no_tool.is_enabled());
        assert!(matches!(
            no_tool.get_thumbnail(0, &cancel).await,
            Err(CoreError::ToolUnavailable(_))
        ));

        assert!(f.decoder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cache_bound_still_returns_frames() {
        let settings = ThumbnailSettings {
            max_cache_size: 2,
            ..Default::default()
        };
        let f = fixture(FakeDecoder::default(), settings);
        let cancel = CancellationToken::new();

        for t in [0, 10_000, 20_000] {
            assert!(f.service.get_thumbnail(t, &cancel).await.unwrap().is_some());
        }
        assert_eq!(f.service.cache().len(), 2);

        // Uncached bucket decodes again
        f.service.get_thumbnail(20_000, &cancel).await.unwrap();
        assert_eq!(f.decoder.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_video_change_clears_and_cancels() {
        let f = fixture(
            FakeDecoder {
                delay: Some(Duration::from_millis(300)),
                ..Default::default()
            },
            ThumbnailSettings::default(),
        );
        let service = Arc::new(f.service);
        let cancel = CancellationToken::new();

        service.set_video(Some(VideoContext::new(f._video.path(), 600_000)));
        assert_eq!(service.video().unwrap().duration_ms, 600_000);

        let pending = {
            let service = service.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { service.get_thumbnail(300_000, &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let other = tempfile::NamedTempFile::new().unwrap();
        service.set_video(Some(VideoContext::new(other.path(), 90_000)));

        assert!(matches!(
            pending.await.unwrap(),
            Err(CoreError::Cancelled)
        ));
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn test_frame_finishing_after_switch_stays_out_of_new_cache() {
        let f = fixture(
            FakeDecoder {
                delay: Some(Duration::from_millis(200)),
                ignore_cancel: true,
                ..Default::default()
            },
            ThumbnailSettings::default(),
        );
        let service = Arc::new(f.service);
        let cancel = CancellationToken::new();

        let pending = {
            let service = service.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { service.get_thumbnail(300_000, &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let other = tempfile::NamedTempFile::new().unwrap();
        service.set_video(Some(VideoContext::new(other.path(), 600_000)));

        assert!(matches!(pending.await.unwrap(), Err(CoreError::Cancelled)));
        assert_eq!(f.decoder.calls().len(), 1);
        assert!(service.cache().is_empty());
        assert!(service.cache().get(300_000).is_none());
    }

    #[tokio::test]
    async fn test_dispose_removes_leftovers_and_rejects() {
        let f = fixture(FakeDecoder::default(), ThumbnailSettings::default());
        let dir = f.service.temp_dir().to_path_buf();
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("thumb_stale.jpg"), b"x").unwrap();
        std::fs::write(dir.join("keep.txt"), b"x").unwrap();

        f.service.dispose();

        assert!(!dir.join("thumb_stale.jpg").exists());
        assert!(dir.join("keep.txt").exists());
        assert!(matches!(
            f.service
                .get_thumbnail(0, &CancellationToken::new())
                .await,
            Err(CoreError::Disposed)
        ));
    }

    #[tokio::test]
    async fn test_temp_frame_is_removed() {
        let f = fixture(FakeDecoder::default(), ThumbnailSettings::default());
        f.service
            .get_thumbnail(300_000, &CancellationToken::new())
            .await
            .unwrap();
        let leftovers = std::fs::read_dir(f.service.temp_dir())
            .map(|d| d.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }
}
