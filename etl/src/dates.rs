use crate::flatten::{RecordSkip, SkipReason};
use crate::models::NormalizedRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use common::config::DatePolicy;
use common::{DateFormatError, Error, Result};
use std::fmt::{self, Write};
use tracing::warn;

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses an ISO-8601-like timestamp down to its calendar date.
///
/// The date is taken as written: `2023-06-15T23:30:00-05:00` is the 15th,
/// not the UTC day.
pub fn parse_date(value: &str) -> std::result::Result<NaiveDate, DateFormatError> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt.date());
        }
    }

    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|e| DateFormatError {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn render(date: NaiveDate, format: &str) -> std::result::Result<String, fmt::Error> {
    let mut out = String::new();
    write!(out, "{}", date.format(format))?;
    Ok(out)
}

/// `"2023-06-15T10:00:00Z"` → `"15-06-2023"` with the default format.
pub fn normalize_date(value: &str) -> std::result::Result<String, DateFormatError> {
    DateNormalizer::default().normalize(value)
}

#[derive(Debug, Clone)]
pub struct DateNormalizer {
    format: String,
    policy: DatePolicy,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        Self {
            format: "%d-%m-%Y".to_string(),
            policy: DatePolicy::default(),
        }
    }
}

/// Result of normalizing a batch of records.
#[derive(Debug, Default)]
pub struct DateOutcome {
    pub records: Vec<NormalizedRecord>,
    /// Records dropped under [`DatePolicy::Skip`].
    pub skipped: Vec<RecordSkip>,
    /// Records kept with a null date under [`DatePolicy::Null`].
    pub nulled: usize,
}

impl DateNormalizer {
    /// Fails unless `format` renders a plain calendar date. Time and zone
    /// specifiers such as `%H` or `%z` are rejected along with malformed ones.
    pub fn new(format: &str, policy: DatePolicy) -> Result<Self> {
        if render(NaiveDate::MIN, format).is_err() {
            return Err(Error::InvalidInput(format!(
                "Invalid date format '{}'",
                format
            )));
        }
        Ok(Self {
            format: format.to_string(),
            policy,
        })
    }

    pub fn policy(&self) -> DatePolicy {
        self.policy
    }

    pub fn normalize(&self, value: &str) -> std::result::Result<String, DateFormatError> {
        render(parse_date(value)?, &self.format).map_err(|_| DateFormatError {
            value: value.to_string(),
            reason: format!("format '{}' cannot render a date", self.format),
        })
    }

    /// Rewrites `date_published` on every record. `indices[i]` is the feed
    /// position of `records[i]`, used for reporting.
    ///
    /// Only [`DatePolicy::Abort`] returns an error.
    pub fn apply(
        &self,
        records: Vec<NormalizedRecord>,
        indices: &[usize],
    ) -> Result<DateOutcome> {
        let mut outcome = DateOutcome {
            records: Vec::with_capacity(records.len()),
            ..Default::default()
        };

        for (pos, mut record) in records.into_iter().enumerate() {
            let index = indices.get(pos).copied().unwrap_or(pos);

            let Some(raw) = record.date_published.take() else {
                outcome.records.push(record);
                continue;
            };

            match self.normalize(&raw) {
                Ok(formatted) => {
                    record.date_published = Some(formatted);
                    outcome.records.push(record);
                }
                Err(err) => match self.policy {
                    DatePolicy::Abort => return Err(err.into()),
                    DatePolicy::Skip => {
                        warn!(index, value = %raw, "Dropping article with unparseable date");
                        outcome.skipped.push(RecordSkip {
                            index,
                            reason: SkipReason::InvalidDate(err),
                        });
                    }
                    DatePolicy::Null => {
                        warn!(index, value = %raw, "Clearing unparseable date");
                        outcome.nulled += 1;
                        outcome.records.push(record);
                    }
                },
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn record(name: &str, date: Option<&str>) -> NormalizedRecord {
        NormalizedRecord {
            name: name.into(),
            description: None,
            url: None,
            image_url: "u".into(),
            provider_name: None,
            date_published: date.map(str::to_string),
        }
    }

    #[rstest]
    #[case("2023-06-15T10:00:00Z", "15-06-2023")]
    #[case("2023-06-15T10:00:00.0000000Z", "15-06-2023")]
    #[case("2023-06-15T23:30:00-05:00", "15-06-2023")]
    #[case("2023-06-15T00:10:00+09:00", "15-06-2023")]
    #[case("2023-06-15T10:00:00", "15-06-2023")]
    #[case("2023-06-15 10:00:00.123", "15-06-2023")]
    #[case("2023-06-15", "15-06-2023")]
    #[case(" 2024-01-02 ", "02-01-2024")]
    fn normalizes_iso_like_timestamps(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_date(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("yesterday")]
    #[case("15/06/2023")]
    #[case("2023-13-01")]
    fn rejects_unparseable_values(#[case] input: &str) {
        let err = normalize_date(input).unwrap_err();
        assert_eq!(err.value, input);
    }

    #[rstest]
    #[case("%Y/%m/%d", "2023/06/15")]
    #[case("%d %B %Y", "15 June 2023")]
    #[case("%Y-%j", "2023-166")]
    fn custom_format(#[case] format: &str, #[case] expected: &str) {
        let normalizer = DateNormalizer::new(format, DatePolicy::Skip).unwrap();
        assert_eq!(normalizer.normalize("2023-06-15T10:00:00Z").unwrap(), expected);
    }

    #[rstest]
    #[case("%Q")]
    #[case("%d-%m-%Y %H:%M")]
    #[case("%Y-%m-%dT%H:%M:%S")]
    #[case("%d-%m-%Y %z")]
    fn formats_that_cannot_render_a_date_are_rejected(#[case] format: &str) {
        let err = DateNormalizer::new(format, DatePolicy::Skip).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref msg) if msg.contains(format)));
    }

    #[test]
    fn skip_policy_drops_bad_dates() {
        let normalizer = DateNormalizer::new("%d-%m-%Y", DatePolicy::Skip).unwrap();
        let outcome = normalizer
            .apply(
                vec![
                    record("a", Some("2023-06-15T10:00:00Z")),
                    record("b", Some("garbage")),
                    record("c", None),
                ],
                &[0, 3, 4],
            )
            .unwrap();

        let names: Vec<&str> = outcome.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(outcome.records[0].date_published.as_deref(), Some("15-06-2023"));
        assert_eq!(outcome.records[1].date_published, None);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].index, 3);
        assert_eq!(outcome.nulled, 0);
    }

    #[test]
    fn null_policy_keeps_record_without_date() {
        let normalizer = DateNormalizer::new("%d-%m-%Y", DatePolicy::Null).unwrap();
        assert_eq!(normalizer.policy(), DatePolicy::Null);
        let outcome = normalizer
            .apply(vec![record("b", Some("garbage"))], &[0])
            .unwrap();

        assert_eq!(outcome.records, vec![record("b", None)]);
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.nulled, 1);
    }

    #[test]
    fn abort_policy_fails_the_batch() {
        let normalizer = DateNormalizer::new("%d-%m-%Y", DatePolicy::Abort).unwrap();
        let err = normalizer
            .apply(
                vec![record("a", Some("2023-06-15")), record("b", Some("garbage"))],
                &[0, 1],
            )
            .unwrap_err();
        assert!(matches!(err, Error::DateFormat(ref e) if e.value == "garbage"));
    }
}
