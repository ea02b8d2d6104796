use std::path::Path;

use telemetry::tracing::init_tracing;

use crate::config::load_importer_config;
use crate::error::ImporterResult;

mod config;
mod core;
mod error;

/// Entry point for the importer binary.
///
/// Loads configuration, initializes tracing, starts the async runtime and
/// executes one import run. A fatal pipeline error surfaces as a nonzero
/// exit status.
fn main() -> ImporterResult<()> {
    let importer_config = load_importer_config()?;

    // Held until shutdown so buffered file output is flushed.
    let _log_flusher = init_tracing(
        env!("CARGO_BIN_NAME"),
        importer_config.log_directory.as_deref().map(Path::new),
    )?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(core::start_import_with_config(importer_config))?;

    Ok(())
}
