//! FFmpeg Detection Module
//!
//! Handles detection and validation of FFmpeg/FFprobe binaries.
//! A binary only counts as found when `-version` exits successfully within
//! the validation deadline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{FFmpegError, FFmpegResult};
use crate::core::process::run_with_deadline;
use crate::core::settings::ToolSettings;

#[cfg(target_os = "windows")]
const FFMPEG_BINARY: &str = "ffmpeg.exe";
#[cfg(not(target_os = "windows"))]
const FFMPEG_BINARY: &str = "ffmpeg";

#[cfg(target_os = "windows")]
const FFPROBE_BINARY: &str = "ffprobe.exe";
#[cfg(not(target_os = "windows"))]
const FFPROBE_BINARY: &str = "ffprobe";

/// Information about a detected FFmpeg installation
#[derive(Debug, Clone)]
pub struct FFmpegInfo {
    /// Path to ffmpeg binary (may be a bare name resolved through PATH)
    pub ffmpeg_path: PathBuf,
    /// Path to ffprobe binary, when one passed validation
    pub ffprobe_path: Option<PathBuf>,
    /// FFmpeg version string
    pub version: String,
}

impl FFmpegInfo {
    /// Whether structured probing is possible
    pub fn has_ffprobe(&self) -> bool {
        self.ffprobe_path.is_some()
    }
}

/// Detect FFmpeg (and optionally FFprobe).
///
/// Candidates are tried in order: the configured path, the application
/// folder, common install locations, then PATH. FFprobe is looked up next to
/// the chosen ffmpeg first; its absence is not an error.
pub async fn detect_ffmpeg(tools: &ToolSettings) -> FFmpegResult<FFmpegInfo> {
    let timeout = Duration::from_millis(tools.validation_timeout_ms);

    let mut found = None;
    for candidate in ffmpeg_candidates(tools) {
        match probe_version(&candidate, timeout).await {
            Ok(version) => {
                found = Some((candidate, version));
                break;
            }
            Err(e) => tracing::debug!("FFmpeg candidate {} rejected: {}", candidate.display(), e),
        }
    }

    let Some((ffmpeg_path, version)) = found else {
        tracing::warn!("FFmpeg not found. Thumbnails and embedded subtitles disabled.");
        return Err(FFmpegError::NotFound);
    };

    let mut ffprobe_path = None;
    for candidate in ffprobe_candidates(tools, &ffmpeg_path) {
        if probe_version(&candidate, timeout).await.is_ok() {
            ffprobe_path = Some(candidate);
            break;
        }
    }

    tracing::info!(
        "FFmpeg {} found at {} (ffprobe: {})",
        version,
        ffmpeg_path.display(),
        ffprobe_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "not found".to_string())
    );

    Ok(FFmpegInfo {
        ffmpeg_path,
        ffprobe_path,
        version,
    })
}

/// Candidate ffmpeg locations, most preferred first
fn ffmpeg_candidates(tools: &ToolSettings) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = &tools.ffmpeg_path {
        candidates.push(path.clone());
    }

    if let Some(app_dir) = application_dir() {
        candidates.push(app_dir.join("ffmpeg").join(FFMPEG_BINARY));
        candidates.push(app_dir.join(FFMPEG_BINARY));
    }

    for dir in get_common_ffmpeg_paths() {
        candidates.push(dir.join(FFMPEG_BINARY));
    }

    // Bare name: resolved through PATH by the OS
    candidates.push(PathBuf::from(FFMPEG_BINARY));
    candidates
}

/// Candidate ffprobe locations, most preferred first
fn ffprobe_candidates(tools: &ToolSettings, ffmpeg_path: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = &tools.ffprobe_path {
        candidates.push(path.clone());
    }

    match ffmpeg_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => candidates.push(dir.join(FFPROBE_BINARY)),
        _ => {}
    }

    candidates.push(PathBuf::from(FFPROBE_BINARY));
    candidates.dedup();
    candidates
}

fn application_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Get common FFmpeg installation paths for the current platform
fn get_common_ffmpeg_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from(r"C:\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\ffmpeg\bin"));
        paths.push(PathBuf::from(r"C:\Program Files (x86)\ffmpeg\bin"));

        if let Some(local) = dirs::data_local_dir() {
            paths.push(local.join("ffmpeg").join("bin"));
        }

        // Scoop installation
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join("scoop").join("shims"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        // Homebrew paths
        paths.push(PathBuf::from("/opt/homebrew/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/opt/local/bin")); // MacPorts
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/snap/bin"));
    }

    paths
}

/// Runs `<binary> -version` and returns the parsed version string
async fn probe_version(binary: &Path, timeout: Duration) -> FFmpegResult<String> {
    if binary.components().count() > 1 && !binary.exists() {
        return Err(FFmpegError::NotFound);
    }

    let mut cmd = tokio::process::Command::new(binary);
    cmd.arg("-version");
    let output = run_with_deadline(cmd, timeout, &CancellationToken::new()).await?;

    if !output.status.success() {
        return Err(FFmpegError::ExecutionFailed(format!(
            "{} -version exited with {}",
            binary.display(),
            output.status
        )));
    }

    parse_version(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the version from the first line: "ffmpeg version X.X.X ..."
fn parse_version(output: &str) -> FFmpegResult<String> {
    if let Some(first_line) = output.lines().next() {
        let rest = first_line
            .strip_prefix("ffmpeg version ")
            .or_else(|| first_line.strip_prefix("ffprobe version "));
        if let Some(version) = rest.and_then(|r| r.split_whitespace().next()) {
            return Ok(version.to_string());
        }
        if !first_line.trim().is_empty() {
            return Ok(first_line.trim().to_string());
        }
    }

    Err(FFmpegError::ParseError(
        "Could not parse FFmpeg version".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        let out = "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023\nbuilt with gcc";
        assert_eq!(parse_version(out).unwrap(), "6.1.1-3ubuntu5");

        let out = "ffprobe version n7.0 Copyright";
        assert_eq!(parse_version(out).unwrap(), "n7.0");

        assert_eq!(parse_version("custom build").unwrap(), "custom build");
        assert!(parse_version("").is_err());
    }

    #[test]
    fn test_configured_path_is_tried_first() {
        let tools = ToolSettings {
            ffmpeg_path: Some(PathBuf::from("/opt/custom/ffmpeg")),
            ..Default::default()
        };
        let candidates = ffmpeg_candidates(&tools);
        assert_eq!(candidates[0], PathBuf::from("/opt/custom/ffmpeg"));
        assert_eq!(candidates.last().unwrap(), &PathBuf::from(FFMPEG_BINARY));
    }

    #[test]
    fn test_ffprobe_is_looked_up_next_to_ffmpeg() {
        let tools = ToolSettings::default();
        let candidates = ffprobe_candidates(&tools, Path::new("/opt/ff/bin/ffmpeg"));
        assert_eq!(candidates[0], Path::new("/opt/ff/bin").join(FFPROBE_BINARY));

        let candidates = ffprobe_candidates(&tools, Path::new(FFMPEG_BINARY));
        assert_eq!(candidates, vec![PathBuf::from(FFPROBE_BINARY)]);
    }

    #[tokio::test]
    async fn test_missing_explicit_path_is_rejected() {
        let result = probe_version(
            Path::new("/nonexistent/dir/ffmpeg"),
            Duration::from_millis(200),
        )
        .await;
        assert!(matches!(result, Err(FFmpegError::NotFound)));
    }

    #[tokio::test]
    async fn test_detect_ffmpeg() {
        // Passes whether or not FFmpeg is installed on the machine
        match detect_ffmpeg(&ToolSettings::default()).await {
            Ok(info) => assert!(!info.version.is_empty()),
            Err(FFmpegError::NotFound) => {}
            Err(e) => panic!("Unexpected error: {}", e),
        }
    }
}
