use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A load profile must declare at least one key field.
    #[error("`key_fields` cannot be empty")]
    EmptyKeyFields,
    /// A key field must refer to a declared column.
    #[error("key field `{0}` is not a declared column")]
    UnknownKeyField(String),
    /// The partition field must refer to a declared date column.
    #[error("partition field `{0}` is not a declared date column")]
    InvalidPartitionField(String),
    /// A column mapping target must refer to a declared column.
    #[error("column mapping target `{0}` is not a declared column")]
    UnknownMappingTarget(String),
    /// Insert chunk size cannot be zero.
    #[error("`insert_chunk_size` cannot be zero")]
    InsertChunkSizeZero,
    /// Column names may not repeat within a profile.
    #[error("column `{0}` is declared more than once")]
    DuplicateColumn(String),
}
