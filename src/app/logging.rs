//! Usage: Tracing setup - stderr output plus daily-rotated file logs in the data dir.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_DIR_NAME: &str = "logs";
const LOG_FILE_PREFIX: &str = "vehicle-console.log";
const FILTER_ENV: &str = "VEHICLE_CONSOLE_LOG";
const DEFAULT_FILTER: &str = "info";

/// Initialize the global subscriber. The returned guard must be held for the
/// process lifetime or buffered file output is lost on exit.
pub fn init(data_dir: &Path) -> WorkerGuard {
    let file_appender =
        tracing_appender::rolling::daily(data_dir.join(LOG_DIR_NAME), LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_env(FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    guard
}

/// Write panics to the log for post-mortem diagnosis. The payload is
/// intentionally not logged; it may contain user content.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        tracing::error!(
            location = %location,
            "PANIC: application panicked at {location}; see surrounding log context"
        );
    }));
}
