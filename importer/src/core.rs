use config::shared::ImporterConfig;
use loader::pipeline::{Pipeline, RunReport};
use loader::source::XlsxSource;
use loader::store::PostgresStore;
use tracing::info;

use crate::error::ImporterResult;

/// Runs one import with the provided configuration.
///
/// Builds the spreadsheet source and the Postgres store, wires them into a
/// pipeline for the configured profile and executes the run to its report.
pub async fn start_import_with_config(config: ImporterConfig) -> ImporterResult<RunReport> {
    info!("starting importer");

    log_config(&config);

    let source = XlsxSource::new(config.source.path.as_str(), config.source.sheet.clone());
    let store = PostgresStore::new(&config.database);

    let mut pipeline =
        Pipeline::new(config.profile, source, store).with_actor(env!("CARGO_PKG_NAME"));
    let report = pipeline.run().await?;

    Ok(report)
}

fn log_config(config: &ImporterConfig) {
    info!(
        source = %config.source.path,
        database_host = %config.database.host,
        database_name = %config.database.name,
        profile = %config.profile.name,
        table = %config.profile.table,
        "loaded importer configuration"
    );
}
