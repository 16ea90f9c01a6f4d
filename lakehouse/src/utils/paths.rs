use common::{Result, WriteError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static QUALIFIED_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<database>[A-Za-z_][A-Za-z0-9_]*)\.(?P<table>[A-Za-z_][A-Za-z0-9_]*)$")
        .expect("Invalid qualified name regex")
});

static IDENTIFIER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid identifier regex"));

pub const DATABASE_MARKER: &str = "_database.json";
pub const TABLE_METADATA: &str = "_table.json";
pub const LOG_DIR: &str = "_log";

/// `<database>.<table>`, both plain identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub database: String,
    pub table: String,
}

impl QualifiedName {
    pub fn parse(name: &str) -> Result<Self> {
        QUALIFIED_NAME_REGEX
            .captures(name)
            .and_then(|caps| {
                Some(Self {
                    database: caps.name("database")?.as_str().to_string(),
                    table: caps.name("table")?.as_str().to_string(),
                })
            })
            .ok_or_else(|| WriteError::InvalidTableName(name.to_string()).into())
    }

    pub fn paths(&self) -> TablePaths {
        TablePaths::new(&self.database, &self.table)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

pub fn validate_database_name(name: &str) -> Result<()> {
    if IDENTIFIER_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(common::Error::InvalidInput(format!(
            "Invalid database name '{}'",
            name
        )))
    }
}

pub fn database_dir(database: &str) -> String {
    format!("{}.db", database)
}

pub fn database_marker(database: &str) -> String {
    format!("{}/{}", database_dir(database), DATABASE_MARKER)
}

/// Object keys for one table, relative to the warehouse root.
pub struct TablePaths {
    table_dir: String,
}

impl TablePaths {
    pub fn new(database: &str, table: &str) -> Self {
        Self {
            table_dir: format!("{}/{}", database_dir(database), table),
        }
    }

    pub fn table_dir(&self) -> &str {
        &self.table_dir
    }

    pub fn metadata_key(&self) -> String {
        format!("{}/{}", self.table_dir, TABLE_METADATA)
    }

    pub fn log_dir(&self) -> String {
        format!("{}/{}", self.table_dir, LOG_DIR)
    }

    pub fn log_entry_key(&self, version: u64) -> String {
        format!("{}/{:020}.json", self.log_dir(), version)
    }

    pub fn data_file_key(&self, file_name: &str) -> String {
        format!("{}/{}", self.table_dir, file_name)
    }
}

/// Version encoded in a log entry key, if `key` is one.
pub fn parse_log_version(key: &str) -> Option<u64> {
    let file_name = key.rsplit('/').next()?;
    let stem = file_name.strip_suffix(".json")?;
    if stem.len() != 20 {
        return None;
    }
    stem.parse().ok()
}

pub fn part_file_name(version: u64, id: &str) -> String {
    format!("part-{:05}-{}.parquet", version, id)
}
