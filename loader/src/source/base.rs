use async_trait::async_trait;

use crate::error::LoaderResult;
use crate::types::RawRecord;

/// A source of raw records for one load run.
///
/// A source reads the whole batch up front; incremental semantics live in the
/// reconciler, not here. Reading an existing-but-empty source succeeds with an
/// empty batch, and the orchestrator decides that an empty batch aborts the
/// run before any write happens.
#[async_trait]
pub trait RecordSource {
    /// A short human-readable description of the source for logs.
    fn describe(&self) -> String;

    /// Reads the full batch of raw records.
    async fn read(&self) -> LoaderResult<Vec<RawRecord>>;
}
