//! Record sources: where raw batches come from.

mod base;
mod memory;
mod xlsx;

pub use base::RecordSource;
pub use memory::MemorySource;
pub use xlsx::XlsxSource;
