use serde_json::Value;

/// One element of the feed's `value` array, untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Zero-based position in the feed.
    pub index: usize,
    pub value: Value,
}

impl RawRecord {
    pub fn new(index: usize, value: Value) -> Self {
        Self { index, value }
    }
}
