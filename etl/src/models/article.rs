use serde::{Deserialize, Serialize};

/// A flattened news article, one table row.
///
/// `name` and `image_url` are always present; a record without them is never
/// built. The remaining fields are copied when the feed has them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub image_url: String,
    pub provider_name: Option<String>,
    pub date_published: Option<String>,
}
