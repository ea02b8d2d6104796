//! Core data types flowing through the load pipeline.

mod record;
mod snapshot;
mod value;

pub use record::*;
pub use snapshot::*;
pub use value::*;
