//! Error types for the helpbot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator has its own error enum; the top-level [`Error`] maps
//! them onto the three failure kinds the answer pipeline reports:
//! retrieval, completion, and formatting.

use thiserror::Error;

/// The top-level error type for all helpbot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Retrieval (vector search + query embedding) ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] SearchError),

    // --- Completion (language model) ---
    #[error("Completion error: {0}")]
    Completion(#[from] ProviderError),

    // --- Provenance formatting ---
    #[error("Formatting error: {0}")]
    Formatting(#[from] FormatError),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl Error {
    /// Short machine-friendly label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Retrieval(_) => "retrieval",
            Error::Completion(_) => "completion",
            Error::Formatting(_) => "formatting",
            Error::InvalidQuery(_) => "invalid_query",
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Collaborator errors ---

/// Failures of an HTTP model provider (completion or embedding endpoint).
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of the vector search collaborator.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Query embedding failed: {0}")]
    Embedding(#[from] ProviderError),

    #[error("Index request failed: {message} (status: {status_code})")]
    Index { status_code: u16, message: String },

    #[error("Index authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Index not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid index response: {0}")]
    InvalidResponse(String),

    #[error("Search timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),
}

/// A retrieved document's metadata violates the provenance formatter's
/// expectations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("issue number is not an integer: {value}")]
    InvalidIssueNumber { value: String },

    #[error("issue state is neither open nor closed: {value}")]
    InvalidIssueState { value: String },

    #[error("issue document is missing metadata field '{field}'")]
    MissingField { field: String },
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Channel authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),
}
