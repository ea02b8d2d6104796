//! Configuration types shared by the loader pipeline and the importer binary.
//!
//! All runtime knobs of a load run live here: the Postgres connection, the
//! per-entity load profile (key fields, normalization rules, column mapping)
//! and the hierarchical file/env loading used by binaries.

mod secret;

pub mod environment;
pub mod load;
pub mod shared;

pub use secret::SerializableSecretString;
