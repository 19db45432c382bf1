//! Provenance formatting: tag each retrieved passage with where it came from.
//!
//! The language model only sees passage text, so the citation has to live in
//! the content itself. Formatting returns a new [`Document`]; the input is
//! left untouched.

use helpbot_core::document::{Document, IssueState, SourceStream};
use helpbot_core::error::FormatError;

pub const DOCUMENTATION_PREFIX: &str = "Excerpt from documentation page: ";
pub const ISSUE_PREFIX: &str = "Excerpt from Github issue: ";
pub const CHAT_THREAD_PREFIX: &str = "Excerpt from Slack thread: ";

#[derive(Debug, Clone, Copy, Default)]
pub struct ProvenanceFormatter;

impl ProvenanceFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Return a copy of `document` whose content carries a source citation.
    ///
    /// Documents from an unknown stream come back unchanged. Issue documents
    /// must carry an integral issue number and an `open`/`closed` state.
    pub fn format(&self, document: &Document) -> Result<Document, FormatError> {
        let content = match document.source_stream() {
            SourceStream::Documentation => format!("{DOCUMENTATION_PREFIX}{}", document.content),
            SourceStream::Issue => {
                let number = document.issue_number()?;
                let state = document.issue_state()?;
                issue_citation(&document.content, number, state)
            }
            SourceStream::ChatThread => format!("{CHAT_THREAD_PREFIX}{}", document.content),
            SourceStream::Unknown => return Ok(document.clone()),
        };

        Ok(Document {
            content,
            metadata: document.metadata.clone(),
        })
    }
}

fn issue_citation(content: &str, number: i64, state: IssueState) -> String {
    format!("{ISSUE_PREFIX}{content}, issue number: {number}, issue state: {state}")
}
