use std::path::Path;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Filter applied when `RUST_LOG` is not set.
const DEFAULT_DIRECTIVES: &str = "info";

/// Errors that can occur while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingSetupError {
    #[error("failed to redirect log records into tracing: {0}")]
    Log(#[from] tracing_log::log::SetLoggerError),
    #[error("failed to install the global tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Initializes tracing for a binary.
///
/// Events go to stdout and, when a log directory is given, to a daily-rolled
/// file in that directory as well. `log` records from dependencies are
/// redirected into tracing. The returned guard flushes buffered file output
/// on drop, so the caller must hold it for the lifetime of the process.
pub fn init_tracing(
    app_name: &str,
    log_directory: Option<&Path>,
) -> Result<Option<WorkerGuard>, TracingSetupError> {
    LogTracer::init()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let stdout_layer = fmt::layer().with_target(false);

    let (file_layer, guard) = match log_directory {
        Some(directory) => {
            let appender =
                tracing_appender::rolling::daily(directory, format!("{app_name}.log"));
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

/// Initializes tracing for tests.
///
/// Output is captured per test and the call is safe to repeat; only the first
/// call in a process installs the subscriber.
pub fn init_test_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let _ = fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
