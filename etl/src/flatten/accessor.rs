use crate::loader::json_type;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Key(&'static str),
    Index(usize),
}

/// A fixed route into a JSON document, e.g. `provider[0].name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPath(pub &'static [Segment]);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("`{path}`: index {index} is out of range for an array of {len}")]
    IndexOutOfRange {
        path: FieldPath,
        index: usize,
        len: usize,
    },

    #[error("`{path}`: expected {expected} at `{at}`, found {found}")]
    TypeMismatch {
        path: FieldPath,
        at: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("`{path}` is missing")]
    Missing { path: FieldPath },
}

impl FieldPath {
    /// Follows the path through `root`.
    ///
    /// An absent key or a `null` on the way yields `Ok(None)`. Indexing past
    /// the end of an array, or stepping into a value of the wrong type, is an
    /// error.
    pub fn lookup<'v>(&self, root: &'v Value) -> Result<Option<&'v Value>, FieldError> {
        let segments: &'static [Segment] = self.0;
        let mut current = root;

        for (depth, segment) in segments.iter().enumerate() {
            if current.is_null() {
                return Ok(None);
            }

            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => match map.get(*key) {
                    Some(next) => next,
                    None => return Ok(None),
                },
                (Segment::Index(index), Value::Array(items)) => {
                    items.get(*index).ok_or(FieldError::IndexOutOfRange {
                        path: *self,
                        index: *index,
                        len: items.len(),
                    })?
                }
                (segment, other) => {
                    return Err(FieldError::TypeMismatch {
                        path: *self,
                        at: FieldPath(&segments[..depth]).to_string(),
                        expected: match segment {
                            Segment::Key(_) => "object",
                            Segment::Index(_) => "array",
                        },
                        found: json_type(other),
                    });
                }
            };
        }

        Ok(if current.is_null() { None } else { Some(current) })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("$");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{key}")?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Truthiness of a JSON value: null, `false`, `0`, and empty strings,
/// arrays and objects are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Column text for a value: strings as-is, anything else as JSON.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
