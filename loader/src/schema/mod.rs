//! Target table shape derived from a load profile, plus the identifier
//! validation that guards every name interpolated into a statement.

mod table;

pub use table::{
    AUDIT_TABLE_SUFFIX, ColumnDefinition, ColumnType, TableDefinition, validate_identifier,
};
