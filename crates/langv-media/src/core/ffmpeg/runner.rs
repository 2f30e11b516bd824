//! FFmpeg Runner Module
//!
//! Builds and executes the decoder/prober invocations used by the side-channel.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{FFmpegError, FFmpegInfo, FFmpegResult};
use crate::core::process::run_with_deadline;
use crate::core::types::{format_seek_timestamp, TimeMs};

/// Input-side pre-seek margin for combined seeking.
///
/// Must exceed typical keyframe intervals (2-10 s for H.264) so the coarse
/// input seek lands before the target.
pub const THUMBNAIL_PRE_SEEK_MS: TimeMs = 15_000;

/// How the decoder is told to reach the target frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// `-ss` before `-i` (fast, keyframe-aligned) plus `-ss` after `-i` for
    /// the remaining margin
    Combined,
    /// `-ss` after `-i` only: decodes from the start, works everywhere
    OutputOnly,
}

impl SeekMode {
    /// The first strategy to try for a target: combined seeking only pays off
    /// once the target is past the pre-seek margin.
    pub fn preferred(time_ms: TimeMs, pre_seek_ms: TimeMs) -> Self {
        if time_ms > pre_seek_ms {
            Self::Combined
        } else {
            Self::OutputOnly
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Combined => "combined",
            Self::OutputOnly => "output-only",
        }
    }
}

/// Parameters for a single preview frame extraction
#[derive(Debug, Clone)]
pub struct FrameRequest {
    pub time_ms: TimeMs,
    pub mode: SeekMode,
    pub pre_seek_ms: TimeMs,
    pub width: u32,
    pub height: u32,
    /// JPEG quality scale passed to `-q:v` (2 best, 31 worst)
    pub quality: u8,
}

/// FFmpeg Runner for executing side-channel commands
#[derive(Clone)]
pub struct FFmpegRunner {
    info: Arc<FFmpegInfo>,
}

impl FFmpegRunner {
    /// Create a new FFmpegRunner from detected FFmpeg installation
    pub fn new(info: FFmpegInfo) -> Self {
        Self {
            info: Arc::new(info),
        }
    }

    /// Get the FFmpeg info
    pub fn info(&self) -> &FFmpegInfo {
        &self.info
    }

    /// Extract a single scaled frame into `output`.
    ///
    /// Success means the decoder exited cleanly; callers still have to check
    /// that `output` exists and is non-empty.
    pub async fn extract_frame(
        &self,
        input: &Path,
        request: &FrameRequest,
        output: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> FFmpegResult<()> {
        if !input.exists() {
            return Err(FFmpegError::InvalidInput(format!(
                "Input file does not exist: {}",
                input.display()
            )));
        }

        // Create output directory if needed
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                FFmpegError::OutputError(format!("Failed to create output directory: {}", e))
            })?;
        }

        let args = frame_args(input, request, output);
        tracing::debug!("ffmpeg {}", args.join(" "));

        let mut cmd = tokio::process::Command::new(&self.info.ffmpeg_path);
        cmd.args(&args);
        let result = run_with_deadline(cmd, timeout, cancel).await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(FFmpegError::ExecutionFailed(format!(
                "Frame extraction ({}) failed: {}",
                request.mode.as_str(),
                last_line(&stderr)
            )));
        }

        Ok(())
    }

    /// List subtitle streams as ffprobe JSON (`-select_streams s`).
    pub async fn probe_subtitle_streams(
        &self,
        input: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> FFmpegResult<String> {
        let Some(ffprobe) = self.info.ffprobe_path.as_ref() else {
            return Err(FFmpegError::NotFound);
        };

        let mut cmd = tokio::process::Command::new(ffprobe);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            "-select_streams",
            "s",
        ])
        .arg(input);
        let output = run_with_deadline(cmd, timeout, cancel).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FFmpegError::ProbeError(format!(
                "FFprobe failed: {}",
                last_line(&stderr)
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run `ffmpeg -i <input>` with no output and return its diagnostic
    /// stream, which lists every stream in the container.
    ///
    /// ffmpeg exits non-zero here ("At least one output file must be
    /// specified"); that is expected and not treated as failure.
    pub async fn inspect_container(
        &self,
        input: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> FFmpegResult<String> {
        let mut cmd = tokio::process::Command::new(&self.info.ffmpeg_path);
        cmd.arg("-hide_banner").arg("-i").arg(input);
        let output = run_with_deadline(cmd, timeout, cancel).await?;
        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }

    /// Demux the `subtitle_index`-th subtitle stream into an SRT file.
    pub async fn demux_subtitle(
        &self,
        input: &Path,
        subtitle_index: usize,
        output: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> FFmpegResult<()> {
        if !input.exists() {
            return Err(FFmpegError::InvalidInput(format!(
                "Input file does not exist: {}",
                input.display()
            )));
        }

        let mut cmd = tokio::process::Command::new(&self.info.ffmpeg_path);
        cmd.arg("-y")
            .arg("-i")
            .arg(input)
            .args(["-map", &format!("0:s:{}", subtitle_index), "-c:s", "srt"])
            .arg(output);
        let result = run_with_deadline(cmd, timeout, cancel).await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(FFmpegError::ExecutionFailed(format!(
                "Subtitle extraction failed: {}",
                last_line(&stderr)
            )));
        }

        Ok(())
    }
}

/// Builds the frame extraction argument list for either seek shape.
pub(crate) fn frame_args(input: &Path, request: &FrameRequest, output: &Path) -> Vec<String> {
    let mut args = Vec::with_capacity(16);

    match request.mode {
        SeekMode::Combined if request.time_ms > request.pre_seek_ms => {
            args.push("-ss".to_string());
            args.push(format_seek_timestamp(request.time_ms - request.pre_seek_ms));
            args.push("-i".to_string());
            args.push(input.to_string_lossy().to_string());
            args.push("-ss".to_string());
            args.push(format_seek_timestamp(request.pre_seek_ms));
        }
        _ => {
            args.push("-i".to_string());
            args.push(input.to_string_lossy().to_string());
            args.push("-ss".to_string());
            args.push(format_seek_timestamp(request.time_ms));
        }
    }

    args.extend([
        "-frames:v".to_string(),
        "1".to_string(),
        "-s".to_string(),
        format!("{}x{}", request.width, request.height),
        "-q:v".to_string(),
        request.quality.to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]);

    args
}

fn last_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
}
