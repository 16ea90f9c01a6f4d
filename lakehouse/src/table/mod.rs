pub mod log;
pub mod part;

pub use log::{CommitEntry, DataFile, Operation, TableSnapshot};

use crate::schema::TableMetadata;
use crate::storage::{ObjectStorage, open_warehouse};
use crate::utils::paths::{
    DATABASE_MARKER, QualifiedName, TablePaths, database_dir, database_marker, parse_log_version,
    part_file_name, validate_database_name,
};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use common::config::SaveMode;
use common::{Error, Result, WriteError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct DatabaseMarker {
    name: String,
    created_at: DateTime<Utc>,
}

/// Managed tables under one warehouse root.
///
/// Databases are directories marked by `_database.json`. A table is a
/// `_table.json` schema record, a `_log/` of numbered commit entries and the
/// Parquet part files those entries reference. A part file only becomes part
/// of the table once its commit entry exists.
#[derive(Clone)]
pub struct TableStore {
    storage: Arc<dyn ObjectStorage>,
}

impl TableStore {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    pub async fn open(warehouse: &str) -> Result<Self> {
        Ok(Self::new(open_warehouse(warehouse).await?))
    }

    pub fn location(&self) -> &str {
        self.storage.location()
    }

    // ── Catalog ──

    /// Creates `name`. Returns `false` if it already existed.
    pub async fn create_database(&self, name: &str) -> Result<bool> {
        validate_database_name(name)?;

        let marker = DatabaseMarker {
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let created = self
            .storage
            .put_object_if_absent(&database_marker(name), &serde_json::to_vec_pretty(&marker)?)
            .await?;

        if created {
            info!(database = name, "Created database");
        } else {
            debug!(database = name, "Database already exists");
        }
        Ok(created)
    }

    pub async fn database_exists(&self, name: &str) -> Result<bool> {
        self.storage.check_file_exists(&database_marker(name)).await
    }

    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let keys = self.storage.list_objects("").await?;
        let mut names: Vec<String> = keys
            .iter()
            .filter_map(|key| {
                let (dir, file) = key.split_once('/')?;
                (file == DATABASE_MARKER).then(|| dir.strip_suffix(".db"))?
            })
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        let name = QualifiedName::parse(name)?;
        self.storage
            .check_file_exists(&name.paths().metadata_key())
            .await
    }

    pub async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        if !self.database_exists(database).await? {
            return Err(WriteError::DatabaseNotFound(database.to_string()).into());
        }

        let prefix = database_dir(database);
        let keys = self.storage.list_objects(&prefix).await?;
        let mut tables: Vec<String> = keys
            .iter()
            .filter_map(|key| {
                let rest = key.strip_prefix(&prefix)?.trim_start_matches('/');
                let (table, file) = rest.split_once('/')?;
                (file == crate::utils::paths::TABLE_METADATA).then(|| table.to_string())
            })
            .collect();
        tables.sort();
        Ok(tables)
    }

    /// Removes the table from the catalog together with its log and data files.
    pub async fn drop_table(&self, name: &str) -> Result<()> {
        let qualified = QualifiedName::parse(name)?;
        let paths = qualified.paths();

        if !self.storage.check_file_exists(&paths.metadata_key()).await? {
            return Err(WriteError::TableNotFound(qualified.to_string()).into());
        }

        // Metadata first so a half-dropped table is no longer visible.
        self.storage.delete_object(&paths.metadata_key()).await?;
        for key in self.storage.list_objects(paths.table_dir()).await? {
            self.storage.delete_object(&key).await?;
        }

        info!(table = %qualified, "Dropped table");
        Ok(())
    }

    pub async fn table_metadata(&self, name: &str) -> Result<TableMetadata> {
        let qualified = QualifiedName::parse(name)?;
        self.read_metadata(&qualified)
            .await?
            .ok_or_else(|| WriteError::TableNotFound(qualified.to_string()).into())
    }

    async fn read_metadata(&self, name: &QualifiedName) -> Result<Option<TableMetadata>> {
        match self.storage.get_object(&name.paths().metadata_key()).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ── Reads ──

    pub async fn history(&self, name: &str) -> Result<Vec<CommitEntry>> {
        let qualified = QualifiedName::parse(name)?;
        self.table_metadata(name).await?;
        self.read_log(&qualified.paths()).await
    }

    async fn read_log(&self, paths: &TablePaths) -> Result<Vec<CommitEntry>> {
        let mut versions: Vec<u64> = self
            .storage
            .list_objects(&paths.log_dir())
            .await?
            .iter()
            .filter_map(|key| parse_log_version(key))
            .collect();
        versions.sort_unstable();

        let mut entries = Vec::with_capacity(versions.len());
        for version in versions {
            let bytes = self.storage.get_object(&paths.log_entry_key(version)).await?;
            entries.push(serde_json::from_slice::<CommitEntry>(&bytes)?);
        }
        Ok(entries)
    }

    pub async fn snapshot(&self, name: &str) -> Result<TableSnapshot> {
        let qualified = QualifiedName::parse(name)?;
        let metadata = self.table_metadata(name).await?;
        let entries = self.read_log(&qualified.paths()).await?;
        Ok(TableSnapshot::replay(metadata, &entries))
    }

    pub async fn row_count(&self, name: &str) -> Result<u64> {
        Ok(self.snapshot(name).await?.row_count())
    }

    /// Every live row of the table, with the table's schema.
    pub async fn scan(&self, name: &str) -> Result<(SchemaRef, Vec<RecordBatch>)> {
        let qualified = QualifiedName::parse(name)?;
        let paths = qualified.paths();
        let snapshot = self.snapshot(name).await?;
        let schema = snapshot.metadata.arrow_schema()?;

        let mut batches = Vec::new();
        for file in &snapshot.files {
            let data = self.storage.get_object(&paths.data_file_key(&file.path)).await?;
            // Part files carry their own key-value metadata; rebind to the table schema.
            for batch in part::decode_batches(data)? {
                batches.push(RecordBatch::try_new(
                    schema.clone(),
                    batch.columns().to_vec(),
                )?);
            }
        }

        debug!(table = %qualified, files = snapshot.files.len(), "Scanned table");
        Ok((schema, batches))
    }

    // ── Writes ──

    /// Shorthand for [`write`](Self::write) with [`SaveMode::Append`].
    pub async fn append(&self, name: &str, batches: &[RecordBatch]) -> Result<CommitEntry> {
        self.write(name, batches, SaveMode::Append).await
    }

    /// Writes `batches` as one commit. The table is created from the batch
    /// schema when missing. Every check runs before any object is written, so
    /// a rejected write leaves the table untouched.
    pub async fn write(
        &self,
        name: &str,
        batches: &[RecordBatch],
        mode: SaveMode,
    ) -> Result<CommitEntry> {
        let qualified = QualifiedName::parse(name)?;
        let paths = qualified.paths();
        let existing = self.check_target(&qualified, mode).await?;

        let schema = batches
            .first()
            .map(|b| b.schema())
            .ok_or_else(|| Error::InvalidInput("No record batches to write".to_string()))?;
        if let Some(batch) = batches.iter().find(|b| b.schema() != schema) {
            return Err(WriteError::SchemaMismatch {
                table: qualified.to_string(),
                detail: format!(
                    "batches disagree on schema: {:?} vs {:?}",
                    schema,
                    batch.schema()
                ),
            }
            .into());
        }

        let metadata = match existing {
            Some(metadata) => {
                metadata.check_compatible(&schema)?;
                metadata
            }
            None => self.create_table(&qualified, &schema).await?,
        };

        let entries = self.read_log(&paths).await?;
        let snapshot = TableSnapshot::replay(metadata, &entries);
        let version = snapshot.next_version();

        let encoded = part::encode_batches(
            batches,
            vec![
                ("table".to_string(), qualified.to_string()),
                ("version".to_string(), version.to_string()),
                ("written_at".to_string(), Utc::now().to_rfc3339()),
            ],
        )?;
        let file_name = part_file_name(version, &Uuid::new_v4().simple().to_string());
        let data_key = paths.data_file_key(&file_name);

        let (operation, removed) = match mode {
            SaveMode::Overwrite => (
                Operation::Overwrite,
                snapshot.files.iter().map(|f| f.path.clone()).collect(),
            ),
            SaveMode::Append | SaveMode::ErrorIfExists => (Operation::Append, Vec::new()),
        };

        let added = if encoded.rows > 0 {
            self.storage.put_object(&data_key, &encoded.bytes).await?;
            vec![DataFile {
                path: file_name,
                rows: encoded.rows,
                size_bytes: encoded.bytes.len() as u64,
                checksum: encoded.checksum,
            }]
        } else {
            Vec::new()
        };

        let entry = CommitEntry {
            version,
            timestamp: Utc::now(),
            operation,
            added,
            removed,
        };

        if let Err(e) = self.commit(&qualified, &paths, &entry).await {
            if !entry.added.is_empty() {
                if let Err(cleanup) = self.storage.delete_object(&data_key).await {
                    warn!(
                        key = %data_key,
                        error = %cleanup,
                        "Failed to remove uncommitted part file"
                    );
                }
            }
            return Err(e);
        }

        info!(
            table = %qualified,
            version,
            rows = entry.rows_added(),
            operation = ?entry.operation,
            "Committed write"
        );
        Ok(entry)
    }

    /// Runs the target checks of [`write`](Self::write) without writing:
    /// the database must exist and, under [`SaveMode::ErrorIfExists`], the
    /// table must not.
    pub async fn validate_target(&self, name: &str, mode: SaveMode) -> Result<()> {
        let qualified = QualifiedName::parse(name)?;
        self.check_target(&qualified, mode).await?;
        Ok(())
    }

    async fn check_target(
        &self,
        qualified: &QualifiedName,
        mode: SaveMode,
    ) -> Result<Option<TableMetadata>> {
        if !self.database_exists(&qualified.database).await? {
            return Err(WriteError::DatabaseNotFound(qualified.database.clone()).into());
        }

        let existing = self.read_metadata(qualified).await?;
        if existing.is_some() && mode == SaveMode::ErrorIfExists {
            return Err(WriteError::TableExists(qualified.to_string()).into());
        }
        Ok(existing)
    }

    async fn commit(
        &self,
        qualified: &QualifiedName,
        paths: &TablePaths,
        entry: &CommitEntry,
    ) -> Result<()> {
        let committed = self
            .storage
            .put_object_if_absent(
                &paths.log_entry_key(entry.version),
                &serde_json::to_vec_pretty(entry)?,
            )
            .await?;

        if committed {
            Ok(())
        } else {
            Err(WriteError::ConcurrentCommit {
                table: qualified.to_string(),
                version: entry.version,
            }
            .into())
        }
    }

    async fn create_table(
        &self,
        qualified: &QualifiedName,
        schema: &SchemaRef,
    ) -> Result<TableMetadata> {
        let metadata = TableMetadata::new(&qualified.database, &qualified.table, schema)?;
        let created = self
            .storage
            .put_object_if_absent(
                &qualified.paths().metadata_key(),
                &serde_json::to_vec_pretty(&metadata)?,
            )
            .await?;

        if created {
            info!(table = %qualified, columns = metadata.columns.len(), "Created table");
            return Ok(metadata);
        }

        // Lost a creation race; the other writer's schema wins.
        let existing = self
            .read_metadata(qualified)
            .await?
            .ok_or_else(|| WriteError::TableNotFound(qualified.to_string()))?;
        existing.check_compatible(schema)?;
        Ok(existing)
    }
}
