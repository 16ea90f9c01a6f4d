use crate::models::RawRecord;
use async_trait::async_trait;
use common::LoadError;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};

/// Produces the raw articles of one run.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn load(&self) -> Result<Vec<RawRecord>, LoadError>;

    /// Where the records come from, for logs.
    fn describe(&self) -> String;
}

/// A `{ "value": [ ... ] }` document on the local filesystem.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedSource for JsonFileSource {
    async fn load(&self) -> Result<Vec<RawRecord>, LoadError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| LoadError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Read feed");

        let records = parse_feed(&bytes)?;
        info!(path = %self.path.display(), records = records.len(), "Loaded feed");
        Ok(records)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Splits a feed document into raw records, in source order.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<RawRecord>, LoadError> {
    let document: Value = serde_json::from_slice(bytes)?;

    let mut object = match document {
        Value::Object(object) => object,
        other => return Err(LoadError::NotAnObject(json_type(&other))),
    };

    match object.remove("value") {
        Some(Value::Array(items)) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(index, value)| RawRecord::new(index, value))
            .collect()),
        _ => Err(LoadError::MissingValueArray),
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
