//! Process-wide tracing setup.

use std::path::Path;
use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Log file prefix; the daily appender adds the date
pub const LOG_FILE_NAME: &str = "langv-media.log";

/// Installs console logging plus, when `log_dir` is given, a daily rolling
/// file in it.
///
/// `RUST_LOG` refines the filter; the floor is INFO. Safe to call more than
/// once: later calls leave the first subscriber in place.
pub fn init_logging(log_dir: Option<&Path>) {
    init_logging_with_level(log_dir, Level::INFO);
}

/// Same as [`init_logging`] with an explicit floor level
pub fn init_logging_with_level(log_dir: Option<&Path>, level: Level) {
    use tracing_subscriber::prelude::*;

    if INITIALIZED.set(()).is_err() {
        return;
    }

    let file_layer = log_dir.and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Log directory {} unavailable: {}", dir.display(), e);
            return None;
        }
        let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);

        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
    });

    let env_filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    // stderr keeps stdout free for command output
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions));

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer);

    // Already initialized by the host (tests, embedding apps)
    let _ = tracing::subscriber::set_global_default(subscriber);
}
