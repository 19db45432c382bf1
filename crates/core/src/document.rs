//! Retrieved documents and their provenance metadata.
//!
//! A [`Document`] is a passage returned by the vector index together with the
//! metadata the corpus loader attached to it. The loader records where each
//! passage came from under `_airbyte_stream`; the stream names used in the
//! corpus are mapped onto [`SourceStream`] here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FormatError;

/// Metadata key holding the corpus stream a passage was loaded from.
pub const STREAM_KEY: &str = "_airbyte_stream";
/// Alternative key using the canonical stream names.
pub const SOURCE_STREAM_KEY: &str = "source_stream";
/// Metadata keys holding the issue number (corpus name first).
pub const ISSUE_NUMBER_KEYS: [&str; 2] = ["number", "issue_number"];
/// Metadata keys holding the issue state (corpus name first).
pub const ISSUE_STATE_KEYS: [&str; 2] = ["state", "issue_state"];

/// A passage of text plus the metadata it was indexed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// The passage body
    pub content: String,

    /// Loader-provided metadata (stream, issue number, state, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Where a passage originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStream {
    /// A documentation page
    Documentation,
    /// A GitHub issue
    Issue,
    /// A Slack thread or live channel message
    ChatThread,
    /// Anything else; passed through without a citation
    Unknown,
}

impl SourceStream {
    /// Map a stream tag to a known category.
    ///
    /// Accepts both the corpus stream names (`DatasetItems`, `issues`,
    /// `threads`, `channel_messages`) and the canonical names.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "DatasetItems" | "documentation" => Self::Documentation,
            "issues" | "issue" => Self::Issue,
            "threads" | "channel_messages" | "chat_thread" => Self::ChatThread,
            _ => Self::Unknown,
        }
    }
}

/// State of a GitHub issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueState::Open => "open",
            IssueState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for IssueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
        }
    }

    /// Builder-style metadata insertion.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Resolve the origin stream; missing or non-string tags are `Unknown`.
    pub fn source_stream(&self) -> SourceStream {
        [STREAM_KEY, SOURCE_STREAM_KEY]
            .iter()
            .find_map(|key| self.metadata.get(*key).and_then(Value::as_str))
            .map(SourceStream::from_tag)
            .unwrap_or(SourceStream::Unknown)
    }

    fn first_meta(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|k| self.metadata.get(*k))
    }

    /// The issue number, coerced to an integer.
    ///
    /// Vector stores commonly return numbers as floats (`42.0`), and some
    /// loaders write them as strings; both are accepted when integral.
    pub fn issue_number(&self) -> Result<i64, FormatError> {
        let value = self
            .first_meta(&ISSUE_NUMBER_KEYS)
            .ok_or_else(|| FormatError::MissingField {
                field: ISSUE_NUMBER_KEYS[0].into(),
            })?;
        coerce_integer(value).ok_or_else(|| FormatError::InvalidIssueNumber {
            value: value.to_string(),
        })
    }

    /// The issue state; only `open` and `closed` (any case) are accepted.
    pub fn issue_state(&self) -> Result<IssueState, FormatError> {
        let value = self
            .first_meta(&ISSUE_STATE_KEYS)
            .ok_or_else(|| FormatError::MissingField {
                field: ISSUE_STATE_KEYS[0].into(),
            })?;
        match value.as_str().map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("open") => Ok(IssueState::Open),
            Some("closed") => Ok(IssueState::Closed),
            _ => Err(FormatError::InvalidIssueState {
                value: value.to_string(),
            }),
        }
    }
}

fn coerce_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
