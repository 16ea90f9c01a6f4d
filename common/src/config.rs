use config::{Config, ConfigError, FileFormat};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default = "default_source_config")]
    pub source: SourceConfig,
    #[serde(default = "default_sink_config")]
    pub sink: SinkConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    #[serde(default = "default_warehouse")]
    pub warehouse: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default)]
    pub mode: SaveMode,
    #[serde(default)]
    pub create_database: bool,
}

impl SinkConfig {
    /// `<database>.<table>` as understood by the table store.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TransformConfig {
    #[serde(default)]
    pub date_policy: DatePolicy,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default)]
    pub strict_optional_fields: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            date_policy: DatePolicy::default(),
            date_format: default_date_format(),
            strict_optional_fields: false,
        }
    }
}

/// How a table write treats an existing table.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    #[default]
    Append,
    Overwrite,
    ErrorIfExists,
}

/// What happens to a record whose `datePublished` cannot be parsed.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    /// Drop the record and count it as skipped.
    #[default]
    Skip,
    /// Keep the record with a null date.
    Null,
    /// Fail the run before anything is written.
    Abort,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_source_config() -> SourceConfig {
    SourceConfig {
        path: PathBuf::from("Files/bing-news.json"),
    }
}

fn default_sink_config() -> SinkConfig {
    SinkConfig {
        warehouse: default_warehouse(),
        database: default_database(),
        table: default_table(),
        mode: SaveMode::default(),
        create_database: false,
    }
}

fn default_warehouse() -> String {
    "warehouse".to_string()
}

fn default_database() -> String {
    "bing_lake_db".to_string()
}

fn default_table() -> String {
    "tbl_latest_news".to_string()
}

fn default_date_format() -> String {
    "%d-%m-%Y".to_string()
}

fn default_preview_rows() -> usize {
    5
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        Self::build(builder)
    }

    /// Settings from an in-memory TOML document, without environment overrides.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder().add_source(config::File::from_str(toml, FileFormat::Toml));
        Self::build(builder)
    }

    fn build(
        builder: config::builder::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let config = builder.build()?;
        let settings: Settings = config.try_deserialize()?;

        debug!(
            source = %settings.source.path.display(),
            table = %settings.sink.qualified_name(),
            warehouse = %settings.sink.warehouse,
            "Loaded settings"
        );

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.source.path, PathBuf::from("Files/bing-news.json"));
        assert_eq!(settings.sink.qualified_name(), "bing_lake_db.tbl_latest_news");
        assert_eq!(settings.sink.mode, SaveMode::Append);
        assert!(!settings.sink.create_database);
        assert_eq!(settings.transform.date_policy, DatePolicy::Skip);
        assert_eq!(settings.transform.date_format, "%d-%m-%Y");
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert_eq!(settings.preview_rows, 5);
    }

    #[test]
    fn sections_override_defaults() {
        let settings = Settings::from_toml(
            r#"
            log_format = "json"
            preview_rows = 0

            [source]
            path = "/data/feed.json"

            [sink]
            warehouse = "/var/lake"
            database = "news"
            table = "latest"
            mode = "error_if_exists"
            create_database = true

            [transform]
            date_policy = "abort"
            strict_optional_fields = true
            "#,
        )
        .unwrap();

        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.preview_rows, 0);
        assert_eq!(settings.source.path, PathBuf::from("/data/feed.json"));
        assert_eq!(settings.sink.warehouse, "/var/lake");
        assert_eq!(settings.sink.qualified_name(), "news.latest");
        assert_eq!(settings.sink.mode, SaveMode::ErrorIfExists);
        assert!(settings.sink.create_database);
        assert_eq!(settings.transform.date_policy, DatePolicy::Abort);
        assert!(settings.transform.strict_optional_fields);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let err = Settings::from_toml("[transform]\ndate_policy = \"guess\"\n").unwrap_err();
        assert!(err.to_string().contains("guess"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[sink]\ntable = \"from_file\"").unwrap();

        let settings = Settings::new(file.path().to_str().unwrap()).unwrap();
        assert_eq!(settings.sink.table, "from_file");
    }
}
