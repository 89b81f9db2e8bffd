use std::path::Path;

use s3vol_shared::errors::S3volResult;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::runtime::layout::create_private_dir;

/// Log file prefix inside the log directory.
pub const LOG_FILE_NAME: &str = "s3vol-plugin.log";

/// Filter from `RUST_LOG`, otherwise `debug` or `info`.
pub fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }))
}

/// Install the global tracing subscriber.
///
/// Logs go to stderr, where the Docker daemon collects plugin output. With a
/// `log_dir` they are also written to a daily-rotated file; keep the returned
/// guard alive so the background writer flushes.
pub fn init_logging(debug: bool, log_dir: Option<&Path>) -> S3volResult<Option<WorkerGuard>> {
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            create_private_dir(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter(debug))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        )
        .with(file_layer)
        .try_init();

    Ok(guard)
}

/// Parse a boolean the way Go's `strconv.ParseBool` does.
///
/// The `DEBUG` variable of existing plugin deployments uses this syntax.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
