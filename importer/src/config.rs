use config::load::load_config;
use config::shared::ImporterConfig;

use crate::error::{ImporterError, ImporterResult};

/// Loads and validates the importer configuration.
///
/// Uses the standard hierarchical loading mechanism from [`config`] and
/// validates the embedded load profile before returning.
pub fn load_importer_config() -> ImporterResult<ImporterConfig> {
    let config = load_config::<ImporterConfig>().map_err(ImporterError::config)?;
    config.validate().map_err(ImporterError::config)?;

    Ok(config)
}
