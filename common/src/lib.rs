use arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use parquet::errors::ParquetError;
use thiserror::Error;

pub mod config;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Date format error: {0}")]
    DateFormat(#[from] DateFormatError),

    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("DataFusion error: {0}")]
    DataFusion(#[from] DataFusionError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// The feed document could not be turned into raw records.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read feed {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("feed is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("feed top level must be an object, found {0}")]
    NotAnObject(&'static str),

    #[error("feed has no `value` array")]
    MissingValueArray,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse {value:?} as a date: {reason}")]
pub struct DateFormatError {
    pub value: String,
    pub reason: String,
}

/// The table store refused a batch. Nothing from the batch is visible.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("database `{0}` does not exist")]
    DatabaseNotFound(String),

    #[error("table `{0}` already exists")]
    TableExists(String),

    #[error("table `{0}` does not exist")]
    TableNotFound(String),

    #[error("invalid table name `{0}`: expected <database>.<table>")]
    InvalidTableName(String),

    #[error("schema of `{table}` is incompatible: {detail}")]
    SchemaMismatch { table: String, detail: String },

    #[error("version {version} of `{table}` was committed concurrently")]
    ConcurrentCommit { table: String, version: u64 },
}

impl Error {
    /// `true` when the error means the sink rejected the batch.
    pub fn is_write_error(&self) -> bool {
        matches!(self, Error::Write(_))
    }
}

impl From<object_store::Error> for Error {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => Error::NotFound(path),
            other => Error::Storage(format!("Object store error: {}", other)),
        }
    }
}

impl From<object_store::path::Error> for Error {
    fn from(err: object_store::path::Error) -> Self {
        Error::InvalidInput(format!("Object path error: {}", err))
    }
}
