use crate::dates::DateNormalizer;
use crate::flatten::{Flattener, RecordSkip, SkipReason};
use crate::loader::{FeedSource, JsonFileSource};
use crate::sink::{LakehouseSink, RecordSink};
use common::config::Settings;
use lakehouse::TableStore;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// Everything one run needs, built once up front.
pub struct PipelineContext {
    pub source: Box<dyn FeedSource>,
    pub sink: Box<dyn RecordSink>,
    pub flattener: Flattener,
    pub dates: DateNormalizer,
}

/// Counts for one run. Filled in as far as the run got.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub source: String,
    pub table: String,
    pub total_records: usize,
    pub skipped_missing_required: usize,
    pub skipped_malformed: usize,
    pub skipped_invalid_date: usize,
    /// Records kept with a null date after a parse failure.
    pub nulled_dates: usize,
    pub written: u64,
    pub version: Option<u64>,
}

impl RunReport {
    fn new(source: String, table: String) -> Self {
        Self {
            source,
            table,
            ..Default::default()
        }
    }

    fn count_skips(&mut self, skipped: &[RecordSkip]) {
        for skip in skipped {
            match skip.reason {
                SkipReason::MissingRequired(_) => self.skipped_missing_required += 1,
                SkipReason::Malformed(_) => self.skipped_malformed += 1,
                SkipReason::InvalidDate(_) => self.skipped_invalid_date += 1,
            }
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_missing_required + self.skipped_malformed + self.skipped_invalid_date
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: read {}, wrote {}, skipped {} (missing required {}, malformed {}, invalid date {}), nulled dates {}",
            self.source,
            self.table,
            self.total_records,
            self.written,
            self.skipped(),
            self.skipped_missing_required,
            self.skipped_malformed,
            self.skipped_invalid_date,
            self.nulled_dates,
        )?;
        if let Some(version) = self.version {
            write!(f, ", version {}", version)?;
        }
        Ok(())
    }
}

/// A failed run, with the counts gathered before the failure.
#[derive(Error, Debug)]
#[error("ETL run failed after reading {} records: {source}", .report.total_records)]
pub struct RunError {
    pub report: RunReport,
    #[source]
    pub source: common::Error,
}

impl RunError {
    pub fn new(report: RunReport, source: impl Into<common::Error>) -> Self {
        Self {
            report,
            source: source.into(),
        }
    }
}

impl PipelineContext {
    pub fn new(
        source: Box<dyn FeedSource>,
        sink: Box<dyn RecordSink>,
        flattener: Flattener,
        dates: DateNormalizer,
    ) -> Self {
        Self {
            source,
            sink,
            flattener,
            dates,
        }
    }

    /// Wires a file source and a lakehouse sink from `settings`.
    pub fn from_settings(settings: &Settings, store: TableStore) -> common::Result<Self> {
        let transform = &settings.transform;
        Ok(Self::new(
            Box::new(JsonFileSource::new(&settings.source.path)),
            Box::new(LakehouseSink::new(
                store,
                settings.sink.qualified_name(),
                settings.sink.mode,
            )),
            Flattener::new(transform.strict_optional_fields),
            DateNormalizer::new(&transform.date_format, transform.date_policy)?,
        ))
    }

    /// Load, flatten, normalize dates, write. Record-level problems are
    /// counted; a load, date-abort or write failure ends the run with
    /// nothing written.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let mut report = RunReport::new(self.source.describe(), self.sink.table().to_string());
        info!(
            source = %report.source,
            table = %report.table,
            date_policy = ?self.dates.policy(),
            "Starting ETL run"
        );

        let raw = match self.source.load().await {
            Ok(raw) => raw,
            Err(e) => return Err(RunError::new(report, e)),
        };
        report.total_records = raw.len();

        let flattened = self.flattener.flatten(raw);
        report.count_skips(&flattened.skipped);

        let dated = match self.dates.apply(flattened.records, &flattened.indices) {
            Ok(dated) => dated,
            Err(e) => return Err(RunError::new(report, e)),
        };
        report.count_skips(&dated.skipped);
        report.nulled_dates = dated.nulled;

        if report.skipped() > 0 {
            warn!(
                missing_required = report.skipped_missing_required,
                malformed = report.skipped_malformed,
                invalid_date = report.skipped_invalid_date,
                "Some articles were skipped"
            );
        }

        match self.sink.write(&dated.records).await {
            Ok(summary) => {
                report.written = summary.rows;
                report.version = summary.version;
            }
            Err(e) => return Err(RunError::new(report, e)),
        }

        info!(
            total = report.total_records,
            written = report.written,
            skipped = report.skipped(),
            "ETL run finished"
        );
        Ok(report)
    }
}
