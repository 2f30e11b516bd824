//! Cross-platform process spawning helpers.
//!
//! On Windows, spawning console binaries (ffmpeg, ffprobe) from a GUI
//! application can cause a console window to appear for each invocation.
//! This module centralizes the creation flags needed to suppress that, and
//! the one place where a child process is raced against a deadline and a
//! cancellation signal.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::ffmpeg::{FFmpegError, FFmpegResult};
use super::CoreError;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Apply platform-specific flags to a tokio process command.
pub fn configure_tokio_command(cmd: &mut tokio::process::Command) {
    #[cfg(target_os = "windows")]
    {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(target_os = "windows"))]
    let _ = cmd;
}

/// Runs a command to completion, bounded by `deadline` and `cancel`.
///
/// stdout and stderr are captured. When the deadline passes or the token is
/// cancelled first, the child is killed (via `kill_on_drop`) and
/// `FFmpegError::Timeout` / `FFmpegError::Cancelled` is returned.
/// A non-zero exit status is NOT an error here; callers inspect `status`.
pub async fn run_with_deadline(
    mut cmd: tokio::process::Command,
    deadline: Duration,
    cancel: &CancellationToken,
) -> FFmpegResult<Output> {
    configure_tokio_command(&mut cmd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if cancel.is_cancelled() {
        return Err(FFmpegError::Cancelled);
    }

    let child = cmd.spawn().map_err(FFmpegError::ProcessError)?;
    let pid = child.id();

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(?pid, "Subprocess cancelled, killing");
            Err(FFmpegError::Cancelled)
        }
        result = child.wait_with_output() => result.map_err(FFmpegError::ProcessError),
        _ = tokio::time::sleep(deadline) => {
            tracing::warn!(?pid, "Subprocess exceeded {:?}, killing", deadline);
            Err(FFmpegError::Timeout)
        }
    }
}

/// Deletes a temporary file when dropped.
///
/// Failure to delete is logged and otherwise ignored.
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                let err = CoreError::CleanupFailed(format!("{}: {}", self.path.display(), e));
                tracing::warn!("{}", err);
            }
        }
    }
}
