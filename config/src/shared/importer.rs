use serde::{Deserialize, Serialize};

use crate::shared::{LoadProfile, PgConnectionConfig, ValidationError};

/// Configuration of the spreadsheet to read a batch from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceFileConfig {
    /// Path of the spreadsheet file.
    pub path: String,
    /// Worksheet name. Defaults to the first worksheet when omitted.
    #[serde(default)]
    pub sheet: Option<String>,
}

/// Top-level configuration of one importer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ImporterConfig {
    /// Spreadsheet to load.
    pub source: SourceFileConfig,
    /// Target Postgres database.
    pub database: PgConnectionConfig,
    /// Load profile describing normalization, keys and target schema.
    pub profile: LoadProfile,
    /// Optional directory for rotated log files. Logs go to stdout only when unset.
    #[serde(default)]
    pub log_directory: Option<String>,
}

impl ImporterConfig {
    /// Validates the embedded load profile.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.profile.validate()
    }
}
