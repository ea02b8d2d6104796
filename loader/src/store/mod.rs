//! Record stores: where reconciled batches are persisted.

mod base;
mod memory;
mod postgres;

pub use base::{InsertOutcome, RecordStore, TableSummary};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
