//! Batch ETL from a news-search JSON feed into a lakehouse table.

pub mod dates;
pub mod flatten;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod sink;

pub use dates::{DateNormalizer, normalize_date};
pub use flatten::{FlattenOutcome, Flattener, RecordSkip, SkipReason};
pub use loader::{FeedSource, JsonFileSource, parse_feed};
pub use models::{NormalizedRecord, RawRecord};
pub use pipeline::{PipelineContext, RunError, RunReport};
pub use sink::{LakehouseSink, RecordSink, WriteSummary};

use common::config::{LogFormat, Settings};
use lakehouse::{TableQuery, TableStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. `RUST_LOG` wins over the `info` default.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = result {
        eprintln!("Logging already initialised: {}", e);
    }
}

/// Loads `config_path`, runs the pipeline once and previews the table.
pub async fn run_etl_pipeline(config_path: &str) -> Result<RunReport, RunError> {
    let settings = Settings::new(config_path).map_err(|e| RunError::new(RunReport::default(), e))?;
    run_with_settings(&settings).await
}

pub async fn run_with_settings(settings: &Settings) -> Result<RunReport, RunError> {
    let store = prepare_store(settings)
        .await
        .map_err(|e| RunError::new(RunReport::default(), e))?;

    let context = PipelineContext::from_settings(settings, store.clone())
        .map_err(|e| RunError::new(RunReport::default(), e))?;
    let report = context.run().await?;

    if settings.preview_rows > 0 && report.written > 0 {
        preview(store, &report.table, settings.preview_rows).await;
    }
    Ok(report)
}

async fn prepare_store(settings: &Settings) -> common::Result<TableStore> {
    let store = TableStore::open(&settings.sink.warehouse).await?;
    if settings.sink.create_database && store.create_database(&settings.sink.database).await? {
        info!(database = %settings.sink.database, "Created database");
    }
    Ok(store)
}

/// Logs the first rows of `table`. A failed preview does not fail the run.
async fn preview(store: TableStore, table: &str, limit: usize) {
    match TableQuery::new(store).preview(table, limit).await {
        Ok(rows) => {
            for row in rows {
                info!(table, row = %row, "Preview");
            }
        }
        Err(e) => warn!(table, error = %e, "Preview failed"),
    }
}
