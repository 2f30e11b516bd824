//! Subtitle stream probing.
//!
//! Two strategies share one interface: structured ffprobe JSON, and a line
//! scan over the diagnostic output of `ffmpeg -i`. [`TrackProber`] tries them
//! in order and degrades to an empty list.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::SubtitleTrack;
use crate::core::ffmpeg::FFmpegRunner;
use crate::core::{CoreError, CoreResult};

// =============================================================================
// Strategy Interface
// =============================================================================

/// One way of listing the subtitle streams of a container
#[async_trait]
pub trait TrackProbeStrategy: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Whether the tool this strategy needs is present
    fn is_available(&self) -> bool;

    /// Lists subtitle streams in discovery order
    async fn probe(
        &self,
        video: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<SubtitleTrack>>;
}

/// Structured probing via `ffprobe -print_format json`
pub struct FfprobeStrategy {
    runner: FFmpegRunner,
}

impl FfprobeStrategy {
    pub fn new(runner: FFmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl TrackProbeStrategy for FfprobeStrategy {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    fn is_available(&self) -> bool {
        self.runner.info().has_ffprobe()
    }

    async fn probe(
        &self,
        video: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<SubtitleTrack>> {
        let json = self
            .runner
            .probe_subtitle_streams(video, timeout, cancel)
            .await?;
        parse_ffprobe_json(&json)
    }
}

/// Fallback probing via the diagnostic output of `ffmpeg -i`
pub struct FfmpegInspectStrategy {
    runner: FFmpegRunner,
}

impl FfmpegInspectStrategy {
    pub fn new(runner: FFmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl TrackProbeStrategy for FfmpegInspectStrategy {
    fn name(&self) -> &'static str {
        "ffmpeg-inspect"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn probe(
        &self,
        video: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<SubtitleTrack>> {
        let stderr = self.runner.inspect_container(video, timeout, cancel).await?;
        Ok(parse_ffmpeg_diagnostics(&stderr))
    }
}

// =============================================================================
// Prober
// =============================================================================

/// Lists subtitle tracks, trying each available strategy in order
pub struct TrackProber {
    strategies: Vec<Box<dyn TrackProbeStrategy>>,
    timeout: Duration,
}

impl TrackProber {
    pub fn new(strategies: Vec<Box<dyn TrackProbeStrategy>>, timeout: Duration) -> Self {
        Self {
            strategies,
            timeout,
        }
    }

    /// The standard strategy chain for a detected FFmpeg installation
    pub fn for_runner(runner: &FFmpegRunner, timeout: Duration) -> Self {
        Self::new(
            vec![
                Box::new(FfprobeStrategy::new(runner.clone())),
                Box::new(FfmpegInspectStrategy::new(runner.clone())),
            ],
            timeout,
        )
    }

    /// Lists the subtitle tracks of `video`.
    ///
    /// A strategy that fails hands over to the next one; when every strategy
    /// fails the result is an empty list. Only a missing file, a missing
    /// tool, or cancellation surface as errors.
    pub async fn probe_tracks(
        &self,
        video: &Path,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<SubtitleTrack>> {
        if !video.exists() {
            return Err(CoreError::FileNotFound(video.display().to_string()));
        }

        let mut attempted = false;
        for strategy in self.strategies.iter().filter(|s| s.is_available()) {
            attempted = true;
            match strategy.probe(video, self.timeout, cancel).await {
                Ok(tracks) => {
                    tracing::info!(
                        "Found {} subtitle track(s) in {} via {}",
                        tracks.len(),
                        video.display(),
                        strategy.name()
                    );
                    return Ok(tracks);
                }
                Err(CoreError::Cancelled) => return Err(CoreError::Cancelled),
                Err(e) => {
                    tracing::warn!("Subtitle probe via {} failed: {}", strategy.name(), e);
                }
            }
        }

        if !attempted {
            return Err(CoreError::ToolUnavailable(
                "no subtitle probe strategy available".to_string(),
            ));
        }
        Ok(Vec::new())
    }
}

// =============================================================================
// Parsers
// =============================================================================

/// Extracts subtitle tracks from ffprobe `-show_streams` JSON.
///
/// Unknown fields are ignored; entries that are not subtitles are skipped.
pub fn parse_ffprobe_json(json: &str) -> CoreResult<Vec<SubtitleTrack>> {
    let value: Value = serde_json::from_str(json)?;
    let Some(streams) = value.get("streams").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let tracks = streams
        .iter()
        .filter(|s| s.get("codec_type").and_then(Value::as_str) == Some("subtitle"))
        .enumerate()
        .map(|(subtitle_index, stream)| {
            let tags = stream.get("tags");
            SubtitleTrack {
                subtitle_index,
                stream_index: stream
                    .get("index")
                    .and_then(Value::as_u64)
                    .and_then(|i| u32::try_from(i).ok()),
                language: tag(tags, "language"),
                title: tag(tags, "title"),
                codec: stream
                    .get("codec_name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }
        })
        .collect();

    Ok(tracks)
}

/// Tag lookup tolerant of the upper-case keys some muxers write
fn tag(tags: Option<&Value>, key: &str) -> String {
    let Some(tags) = tags else {
        return String::new();
    };
    tags.get(key)
        .or_else(|| tags.get(key.to_uppercase()))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn stream_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Stream #\d+:(\d+)(?:\[[^\]]*\])?(?:\((\w+)\))?").expect("stream regex is valid")
    })
}

fn subtitle_codec_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Subtitle:\s*(\w+)").expect("codec regex is valid"))
}

/// Extracts subtitle tracks from `ffmpeg -i` diagnostic output.
///
/// ```text
///   Stream #0:2(eng): Subtitle: subrip (default)
///     Metadata:
///       title           : English
/// ```
///
/// Every `Stream` header closes the track before it; a `title` key is only
/// read inside the current track's `Metadata:` section.
pub fn parse_ffmpeg_diagnostics(output: &str) -> Vec<SubtitleTrack> {
    let mut tracks = Vec::new();
    let mut current: Option<SubtitleTrack> = None;
    let mut in_metadata = false;

    for line in output.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("Stream #") {
            if let Some(track) = current.take() {
                tracks.push(track);
            }
            in_metadata = false;

            if let Some(codec) = subtitle_codec_regex().captures(trimmed) {
                let mut track = SubtitleTrack::new(tracks.len());
                track.codec = codec[1].to_string();
                if let Some(header) = stream_header_regex().captures(trimmed) {
                    track.stream_index = header.get(1).and_then(|m| m.as_str().parse().ok());
                    if let Some(lang) = header.get(2) {
                        track.language = lang.as_str().to_string();
                    }
                }
                tracing::debug!(
                    "Found subtitle stream: lang={}, codec={}",
                    track.language,
                    track.codec
                );
                current = Some(track);
            }
        } else if trimmed.starts_with("Metadata:") {
            in_metadata = current.is_some();
        } else if in_metadata {
            let Some(track) = current.as_mut() else {
                continue;
            };
            let Some((key, value)) = trimmed.split_once(':') else {
                in_metadata = false;
                continue;
            };
            if key.trim().eq_ignore_ascii_case("title") && !value.trim().is_empty() {
                track.title = value.trim().to_string();
            }
        }
    }

    if let Some(track) = current {
        tracks.push(track);
    }

    tracks
}
