//! Core domain types for index revisions.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ReindexError, Result};

/// `strftime` layout of a [`RevisionId`]: `YYYY-MM-DD-HH-MM`.
pub const REVISION_ID_FORMAT: &str = "%Y-%m-%d-%H-%M";

/// Exact length of a formatted [`RevisionId`].
pub const REVISION_ID_LEN: usize = 16;

static INDEX_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("index id pattern is valid")
});

// ---------------------------------------------------------------------------
// IndexId
// ---------------------------------------------------------------------------

/// Logical name of one searchable collection family (e.g. `www-example-de`).
///
/// Doubles as the public alias name consumers query.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IndexId(String);

impl IndexId {
    /// Validate and wrap an index identifier.
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if !INDEX_ID_PATTERN.is_match(&value) {
            return Err(ReindexError::validation(format!(
                "invalid index id '{value}': expected lowercase letters, digits, '-' or '_'"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IndexId {
    type Error = ReindexError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<IndexId> for String {
    fn from(id: IndexId) -> Self {
        id.0
    }
}

impl std::str::FromStr for IndexId {
    type Err = ReindexError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for IndexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RevisionId
// ---------------------------------------------------------------------------

/// Generation label derived from UTC wall-clock time at minute granularity.
///
/// The zero-padded `YYYY-MM-DD-HH-MM` layout makes string order and
/// chronological order coincide, so revisions sort with plain `Ord`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RevisionId(String);

impl RevisionId {
    /// Mint a revision for the current minute.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Mint a revision for the minute containing `at`.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format(REVISION_ID_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for RevisionId {
    type Err = ReindexError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != REVISION_ID_LEN {
            return Err(ReindexError::validation(format!(
                "revision id '{s}' must be {REVISION_ID_LEN} characters"
            )));
        }
        NaiveDateTime::parse_from_str(s, REVISION_ID_FORMAT).map_err(|e| {
            ReindexError::validation(format!("revision id '{s}' is not YYYY-MM-DD-HH-MM: {e}"))
        })?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for RevisionId {
    type Error = ReindexError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RevisionId> for String {
    fn from(id: RevisionId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RevisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Identity of a document within the content source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content type tag (mime type) selecting the provider for a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentType(pub String);

impl DocumentType {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document selected for indexing, before it is assembled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentDescriptor {
    pub document_type: DocumentType,
    pub document_id: DocumentId,
}

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

/// Relevance signal for one search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub id: DocumentId,
    pub index: i64,
}

/// Scores of a result page keyed by document id.
pub type Scores = HashMap<DocumentId, Score>;

// ---------------------------------------------------------------------------
// Collection schema
// ---------------------------------------------------------------------------

/// Field definition inside a [`CollectionSchema`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    /// Engine field type (`string`, `int32`, `string[]`, `auto`, ...).
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<bool>,
}

/// Schema used to create every generation of one index.
///
/// `name` is replaced with the generation name at creation time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollectionSchema {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sorting_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_nested_fields: Option<bool>,
}

impl CollectionSchema {
    /// Copy of this schema renamed to `name`.
    pub fn named(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn revision_id_format_is_zero_padded() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 42).unwrap();
        let rev = RevisionId::from_datetime(at);
        assert_eq!(rev.as_str(), "2024-03-07-09-05");
        assert_eq!(rev.as_str().len(), REVISION_ID_LEN);
    }

    #[test]
    fn revision_order_matches_time_order() {
        let earlier = RevisionId::from_datetime(Utc.with_ymd_and_hms(2024, 9, 30, 23, 59, 0).unwrap());
        let later = RevisionId::from_datetime(Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap());
        assert!(earlier < later);
    }

    #[test]
    fn revision_id_parse_rejects_garbage() {
        assert!("2024-03-07-09-05".parse::<RevisionId>().is_ok());
        assert!("2024-03-07-09".parse::<RevisionId>().is_err());
        assert!("2024-13-07-09-05".parse::<RevisionId>().is_err());
        assert!("abcdefghijklmnop".parse::<RevisionId>().is_err());
    }

    #[test]
    fn index_id_validation() {
        assert!(IndexId::parse("www-example-de").is_ok());
        assert!(IndexId::parse("shop_2").is_ok());
        assert!(IndexId::parse("").is_err());
        assert!(IndexId::parse("-leading").is_err());
        assert!(IndexId::parse("Upper").is_err());
        assert!(IndexId::parse("with space").is_err());
    }

    #[test]
    fn schema_serializes_type_field() {
        let schema = CollectionSchema {
            name: "docs".into(),
            fields: vec![FieldSchema {
                name: "title".into(),
                field_type: "string".into(),
                facet: None,
                optional: Some(true),
                index: None,
                sort: None,
            }],
            default_sorting_field: None,
            enable_nested_fields: None,
        };
        let json = serde_json::to_value(schema.named("docs-2024-01-01-00-00")).unwrap();
        assert_eq!(json["name"], "docs-2024-01-01-00-00");
        assert_eq!(json["fields"][0]["type"], "string");
        assert!(json["fields"][0].get("facet").is_none());
    }
}
