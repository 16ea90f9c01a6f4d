use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use common::Result;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use std::sync::Arc;

#[async_trait]
pub trait TableRegistry: Send + Sync + 'static {
    async fn register_table(
        &self,
        ctx: &SessionContext,
        table_name: &str,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Result<()>;

    async fn deregister_table(&self, ctx: &SessionContext, table_name: &str) -> Result<()>;
}

/// Registers scanned table contents as an in-memory DataFusion table.
pub struct MemTableRegistry;

#[async_trait]
impl TableRegistry for MemTableRegistry {
    async fn register_table(
        &self,
        ctx: &SessionContext,
        table_name: &str,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
    ) -> Result<()> {
        let table = MemTable::try_new(schema, vec![batches]).map_err(|e| {
            common::Error::Other(format!("Failed to register {}: {}", table_name, e))
        })?;

        ctx.register_table(table_name, Arc::new(table))?;
        Ok(())
    }

    async fn deregister_table(&self, ctx: &SessionContext, table_name: &str) -> Result<()> {
        ctx.deregister_table(table_name)?;
        Ok(())
    }
}
