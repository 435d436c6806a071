use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::core::config::{AppPaths, LoggingConfig};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber: stdout plus a daily-rolling file under `log_dir`.
///
/// `RUST_LOG` wins over the configured level. If the log directory cannot be
/// created, only stdout is used.
pub fn init(paths: &AppPaths, config: &LoggingConfig) {
    let file_layer = file_writer(&paths.log_dir, &config.file_name).map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
    });

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();
}

fn file_writer(log_dir: &Path, file_name: &str) -> Option<NonBlocking> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!(
            "Cannot create log directory {}: {}; file logging disabled",
            log_dir.display(),
            e
        );
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}
