use super::NormalizedRecord;
use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use common::Result;
use once_cell::sync::Lazy;
use std::sync::Arc;

static NEWS_SCHEMA: Lazy<SchemaRef> = Lazy::new(|| {
    Arc::new(Schema::new(vec![
        Field::new("name", DataType::Utf8, true),
        Field::new("description", DataType::Utf8, true),
        Field::new("url", DataType::Utf8, true),
        Field::new("image", DataType::Utf8, true),
        Field::new("provider", DataType::Utf8, true),
        Field::new("datePublished", DataType::Utf8, true),
    ]))
});

/// The sink table schema: six nullable string columns.
pub fn news_schema() -> SchemaRef {
    NEWS_SCHEMA.clone()
}

pub fn to_record_batch(records: &[NormalizedRecord]) -> Result<RecordBatch> {
    fn column<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
        Arc::new(values.collect::<StringArray>())
    }

    let columns = vec![
        column(records.iter().map(|r| Some(r.name.as_str()))),
        column(records.iter().map(|r| r.description.as_deref())),
        column(records.iter().map(|r| r.url.as_deref())),
        column(records.iter().map(|r| Some(r.image_url.as_str()))),
        column(records.iter().map(|r| r.provider_name.as_deref())),
        column(records.iter().map(|r| r.date_published.as_deref())),
    ];

    Ok(RecordBatch::try_new(news_schema(), columns)?)
}
