use crate::registry::{MemTableRegistry, TableRegistry};
use crate::table::TableStore;
use crate::utils::arrow::batches_to_json;
use arrow::record_batch::RecordBatch;
use common::Result;
use datafusion::prelude::SessionContext;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Runs SQL against table snapshots.
///
/// Each call registers the table under a throwaway name, runs the query and
/// deregisters it again, so the session never accumulates state between calls.
pub struct TableQuery {
    ctx: SessionContext,
    store: TableStore,
    registry: Arc<dyn TableRegistry>,
}

impl TableQuery {
    pub fn new(store: TableStore) -> Self {
        Self {
            ctx: SessionContext::new(),
            store,
            registry: Arc::new(MemTableRegistry),
        }
    }

    /// `build_sql` receives the name the table is registered under.
    pub async fn sql<F>(&self, table: &str, build_sql: F) -> Result<Vec<RecordBatch>>
    where
        F: FnOnce(&str) -> String,
    {
        let (schema, batches) = self.store.scan(table).await?;
        let alias = format!("query_{}", Uuid::new_v4().simple());

        self.registry
            .register_table(&self.ctx, &alias, schema, batches)
            .await?;

        let sql = build_sql(&alias);
        debug!(table, %sql, "Running query");
        let result = self.run(&sql).await;

        self.registry.deregister_table(&self.ctx, &alias).await?;
        result
    }

    async fn run(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        let df = self.ctx.sql(sql).await?;
        Ok(df.collect().await?)
    }

    /// The first `limit` rows of `table` as JSON objects.
    pub async fn preview(&self, table: &str, limit: usize) -> Result<Vec<Value>> {
        let batches = self
            .sql(table, |alias| format!("SELECT * FROM \"{}\" LIMIT {}", alias, limit))
            .await?;
        batches_to_json(batches)
    }

    pub async fn count(&self, table: &str) -> Result<u64> {
        let rows = self
            .preview_sql(table, |alias| format!("SELECT COUNT(*) AS n FROM \"{}\"", alias))
            .await?;
        rows.first()
            .and_then(|row| row.get("n"))
            .and_then(Value::as_u64)
            .ok_or_else(|| common::Error::Other("COUNT(*) returned no rows".to_string()))
    }

    /// Like [`sql`](Self::sql), returning JSON rows.
    pub async fn preview_sql<F>(&self, table: &str, build_sql: F) -> Result<Vec<Value>>
    where
        F: FnOnce(&str) -> String,
    {
        batches_to_json(self.sql(table, build_sql).await?)
    }
}
