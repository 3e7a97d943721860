use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

/// One finalized metadata value. `keywords` is the only list-valued field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Trim surrounding whitespace on textual values; lists pass through.
    pub fn trimmed(self) -> FieldValue {
        match self {
            FieldValue::Text(text) => FieldValue::Text(text.trim().to_string()),
            list => list,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.is_empty(),
            FieldValue::List(items) => items.is_empty(),
        }
    }
}

/// Mapping from field name to extracted value. Fields with no match and no
/// default are absent rather than null.
pub type Metadata = BTreeMap<&'static str, FieldValue>;

/// Per-invocation read-only state available to defaults and processors.
#[derive(Debug, Clone)]
pub struct Context {
    pub url: Url,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub url: Option<String>,
    /// Caller-supplied text that replaces the extracted snippet.
    pub text: Option<String>,
}
