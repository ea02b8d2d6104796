//! Incremental spreadsheet-to-Postgres loading.
//!
//! A load run reads a spreadsheet extract, normalizes every field through the
//! rules of a [`config::shared::LoadProfile`], fingerprints the key fields,
//! reconciles the batch against the persisted snapshot and writes only what
//! changed: new rows in bulk, updated rows one transaction at a time with a
//! per-field audit trail.

pub mod conversions;
pub mod error;
pub mod fingerprint;
mod macros;
pub mod pipeline;
pub mod reconcile;
pub mod schema;
pub mod source;
pub mod store;
pub mod types;
