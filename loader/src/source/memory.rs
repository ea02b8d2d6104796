use async_trait::async_trait;

use crate::error::LoaderResult;
use crate::source::RecordSource;
use crate::types::RawRecord;

/// An in-memory record source, mainly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<RawRecord>,
}

impl MemorySource {
    /// Creates a source that yields the supplied records.
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    fn describe(&self) -> String {
        format!("memory source ({} records)", self.records.len())
    }

    async fn read(&self) -> LoaderResult<Vec<RawRecord>> {
        Ok(self.records.clone())
    }
}
