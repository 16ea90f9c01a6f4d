mod article;
mod raw;
mod schema;

pub use article::NormalizedRecord;
pub use raw::RawRecord;
pub use schema::{news_schema, to_record_batch};
