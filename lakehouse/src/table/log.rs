use crate::schema::TableMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Append,
    Overwrite,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DataFile {
    pub path: String,
    pub rows: u64,
    pub size_bytes: u64,
    pub checksum: String,
}

/// One `_log/<version>.json` entry.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CommitEntry {
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    pub operation: Operation,
    #[serde(default)]
    pub added: Vec<DataFile>,
    #[serde(default)]
    pub removed: Vec<String>,
}

impl CommitEntry {
    pub fn rows_added(&self) -> u64 {
        self.added.iter().map(|f| f.rows).sum()
    }
}

/// The live state of a table after replaying its log.
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    pub metadata: TableMetadata,
    pub version: Option<u64>,
    pub files: Vec<DataFile>,
}

impl TableSnapshot {
    /// `entries` must be in ascending version order.
    pub fn replay(metadata: TableMetadata, entries: &[CommitEntry]) -> Self {
        let mut files: Vec<DataFile> = Vec::new();
        let mut version = None;

        for entry in entries {
            if entry.operation == Operation::Overwrite {
                files.clear();
            } else {
                files.retain(|f| !entry.removed.contains(&f.path));
            }
            files.extend(entry.added.iter().cloned());
            version = Some(entry.version);
        }

        Self {
            metadata,
            version,
            files,
        }
    }

    pub fn row_count(&self) -> u64 {
        self.files.iter().map(|f| f.rows).sum()
    }

    pub fn next_version(&self) -> u64 {
        self.version.map_or(0, |v| v + 1)
    }
}
