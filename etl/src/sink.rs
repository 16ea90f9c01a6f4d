use crate::models::{NormalizedRecord, to_record_batch};
use async_trait::async_trait;
use common::Result;
use common::config::SaveMode;
use lakehouse::TableStore;
use tracing::info;

/// What a sink did with one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub table: String,
    pub rows: u64,
    /// Commit version, `None` when nothing was written.
    pub version: Option<u64>,
}

#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persists the whole batch or nothing.
    async fn write(&self, records: &[NormalizedRecord]) -> Result<WriteSummary>;

    /// Qualified name of the destination table.
    fn table(&self) -> &str;
}

/// Writes records into a table of the lakehouse store.
pub struct LakehouseSink {
    store: TableStore,
    table: String,
    mode: SaveMode,
}

impl LakehouseSink {
    pub fn new(store: TableStore, table: impl Into<String>, mode: SaveMode) -> Self {
        Self {
            store,
            table: table.into(),
            mode,
        }
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }
}

#[async_trait]
impl RecordSink for LakehouseSink {
    async fn write(&self, records: &[NormalizedRecord]) -> Result<WriteSummary> {
        if records.is_empty() {
            self.store.validate_target(&self.table, self.mode).await?;
            info!(table = %self.table, "No records to write");
            return Ok(WriteSummary {
                table: self.table.clone(),
                rows: 0,
                version: None,
            });
        }

        let batch = to_record_batch(records)?;
        let entry = self.store.write(&self.table, &[batch], self.mode).await?;

        Ok(WriteSummary {
            table: self.table.clone(),
            rows: entry.rows_added(),
            version: Some(entry.version),
        })
    }

    fn table(&self) -> &str {
        &self.table
    }
}
