mod accessor;

pub use accessor::{FieldError, FieldPath, Segment, is_truthy, to_text};

use crate::models::{NormalizedRecord, RawRecord};
use common::DateFormatError;
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

pub const NAME: FieldPath = FieldPath(&[Segment::Key("name")]);
pub const DESCRIPTION: FieldPath = FieldPath(&[Segment::Key("description")]);
pub const URL: FieldPath = FieldPath(&[Segment::Key("url")]);
pub const THUMBNAIL_URL: FieldPath = FieldPath(&[
    Segment::Key("image"),
    Segment::Key("thumbnail"),
    Segment::Key("contentUrl"),
]);
pub const PROVIDER_NAME: FieldPath = FieldPath(&[
    Segment::Key("provider"),
    Segment::Index(0),
    Segment::Key("name"),
]);
pub const DATE_PUBLISHED: FieldPath = FieldPath(&[Segment::Key("datePublished")]);

/// Why a record produced no row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A required field was absent or falsy. Expected upstream noise.
    MissingRequired(FieldPath),
    /// A field could not be read.
    Malformed(FieldError),
    /// `datePublished` could not be parsed and the policy drops the record.
    InvalidDate(DateFormatError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingRequired(path) => write!(f, "required field `{path}` is missing"),
            SkipReason::Malformed(err) => write!(f, "malformed record: {err}"),
            SkipReason::InvalidDate(err) => write!(f, "{err}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSkip {
    pub index: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Default)]
pub struct FlattenOutcome {
    /// Accepted records in input order.
    pub records: Vec<NormalizedRecord>,
    /// Feed position of each accepted record.
    pub indices: Vec<usize>,
    pub skipped: Vec<RecordSkip>,
}

/// Maps raw articles to rows, one record at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Flattener {
    /// Treat an absent optional field as a malformed record.
    pub strict_optional_fields: bool,
}

impl Flattener {
    pub fn new(strict_optional_fields: bool) -> Self {
        Self {
            strict_optional_fields,
        }
    }

    /// Never fails as a whole: every rejected record lands in `skipped`.
    pub fn flatten(&self, raw: Vec<RawRecord>) -> FlattenOutcome {
        let mut outcome = FlattenOutcome {
            records: Vec::with_capacity(raw.len()),
            indices: Vec::with_capacity(raw.len()),
            skipped: Vec::new(),
        };

        for record in raw {
            match self.flatten_one(&record.value) {
                Ok(normalized) => {
                    outcome.records.push(normalized);
                    outcome.indices.push(record.index);
                }
                Err(reason) => {
                    match &reason {
                        SkipReason::MissingRequired(path) => {
                            debug!(
                                index = record.index,
                                field = %path,
                                "Skipping article without required field"
                            );
                        }
                        other => {
                            warn!(
                                index = record.index,
                                reason = %other,
                                "Error processing article"
                            );
                        }
                    }
                    outcome.skipped.push(RecordSkip {
                        index: record.index,
                        reason,
                    });
                }
            }
        }

        debug!(
            accepted = outcome.records.len(),
            skipped = outcome.skipped.len(),
            "Flattened feed"
        );
        outcome
    }

    pub fn flatten_one(&self, article: &Value) -> Result<NormalizedRecord, SkipReason> {
        let name = required(NAME, article)?;
        let image_url = required(THUMBNAIL_URL, article)?;

        Ok(NormalizedRecord {
            name,
            description: self.optional(DESCRIPTION, article)?,
            url: self.optional(URL, article)?,
            image_url,
            provider_name: self.optional(PROVIDER_NAME, article)?,
            date_published: self.optional(DATE_PUBLISHED, article)?,
        })
    }

    fn optional(&self, path: FieldPath, article: &Value) -> Result<Option<String>, SkipReason> {
        match path.lookup(article).map_err(SkipReason::Malformed)? {
            Some(value) => Ok(Some(to_text(value))),
            None if self.strict_optional_fields => {
                Err(SkipReason::Malformed(FieldError::Missing { path }))
            }
            None => Ok(None),
        }
    }
}

fn required(path: FieldPath, article: &Value) -> Result<String, SkipReason> {
    match path.lookup(article).map_err(SkipReason::Malformed)? {
        Some(value) if is_truthy(value) => Ok(to_text(value)),
        _ => Err(SkipReason::MissingRequired(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw(values: Vec<Value>) -> Vec<RawRecord> {
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| RawRecord::new(i, v))
            .collect()
    }

    fn full_article(name: &str) -> Value {
        json!({
            "name": name,
            "description": "A description",
            "url": "https://news.example/a",
            "image": {"thumbnail": {"contentUrl": "https://img.example/a", "width": 700}},
            "provider": [{"_type": "Organization", "name": "Example News"}],
            "datePublished": "2023-06-15T10:00:00.0000000Z"
        })
    }

    #[test]
    fn full_article_keeps_all_six_values() {
        let record = Flattener::default().flatten_one(&full_article("Headline")).unwrap();
        assert_eq!(
            record,
            NormalizedRecord {
                name: "Headline".into(),
                description: Some("A description".into()),
                url: Some("https://news.example/a".into()),
                image_url: "https://img.example/a".into(),
                provider_name: Some("Example News".into()),
                date_published: Some("2023-06-15T10:00:00.0000000Z".into()),
            }
        );
    }

    #[test]
    fn missing_required_fields_are_skipped_quietly() {
        let outcome = Flattener::default().flatten(raw(vec![
            json!({"name": "A", "image": {"thumbnail": {"contentUrl": "u"}}}),
            json!({"image": {"thumbnail": {"contentUrl": "u2"}}}),
        ]));

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].name, "A");
        assert_eq!(outcome.records[0].image_url, "u");
        assert_eq!(outcome.records[0].description, None);
        assert_eq!(
            outcome.skipped,
            vec![RecordSkip {
                index: 1,
                reason: SkipReason::MissingRequired(NAME)
            }]
        );
    }

    #[test]
    fn falsy_required_values_count_as_missing() {
        let flattener = Flattener::default();
        for article in [
            json!({"name": "", "image": {"thumbnail": {"contentUrl": "u"}}}),
            json!({"name": null, "image": {"thumbnail": {"contentUrl": "u"}}}),
            json!({"name": "A", "image": {"thumbnail": {"contentUrl": ""}}}),
            json!({"name": "A", "image": {}}),
        ] {
            assert!(matches!(
                flattener.flatten_one(&article),
                Err(SkipReason::MissingRequired(_))
            ));
        }
    }

    #[test]
    fn malformed_record_does_not_stop_the_batch() {
        let mut broken = full_article("Broken");
        broken["provider"] = json!([]);

        let outcome = Flattener::default().flatten(raw(vec![
            full_article("First"),
            broken,
            full_article("Third"),
        ]));

        let names: Vec<&str> = outcome.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Third"]);
        assert_eq!(outcome.indices, vec![0, 2]);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].index, 1);
        assert!(matches!(
            outcome.skipped[0].reason,
            SkipReason::Malformed(FieldError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn non_object_records_are_malformed() {
        let outcome = Flattener::default().flatten(raw(vec![json!("just a string"), json!(null)]));
        assert!(outcome.records.is_empty());
        assert!(matches!(
            outcome.skipped[0].reason,
            SkipReason::Malformed(FieldError::TypeMismatch { .. })
        ));
        assert!(matches!(
            outcome.skipped[1].reason,
            SkipReason::MissingRequired(_)
        ));
    }

    #[test]
    fn optional_fields_are_best_effort_by_default() {
        let record = Flattener::default()
            .flatten_one(&json!({"name": "A", "image": {"thumbnail": {"contentUrl": "u"}}}))
            .unwrap();
        assert_eq!(record.provider_name, None);
        assert_eq!(record.date_published, None);
    }

    #[test]
    fn strict_mode_rejects_absent_optional_fields() {
        let err = Flattener::new(true)
            .flatten_one(&json!({"name": "A", "image": {"thumbnail": {"contentUrl": "u"}}}))
            .unwrap_err();
        assert_eq!(
            err,
            SkipReason::Malformed(FieldError::Missing { path: DESCRIPTION })
        );

        assert!(Flattener::new(true).flatten_one(&full_article("A")).is_ok());
    }

    #[test]
    fn non_string_values_keep_their_json_text() {
        let mut article = full_article("A");
        article["name"] = json!(2024);
        article["description"] = json!({"lang": "en"});

        let record = Flattener::default().flatten_one(&article).unwrap();
        assert_eq!(record.name, "2024");
        assert_eq!(record.description.as_deref(), Some(r#"{"lang":"en"}"#));
    }

    #[test]
    fn accepted_order_follows_input_order() {
        let outcome = Flattener::default().flatten(raw(
            (0..5).map(|i| full_article(&format!("n{i}"))).collect(),
        ));
        let names: Vec<String> = outcome.records.into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["n0", "n1", "n2", "n3", "n4"]);
    }
}
