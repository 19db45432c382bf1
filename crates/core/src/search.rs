//! Similarity search collaborator traits.
//!
//! The answer pipeline never talks to the embedding model directly: it asks a
//! [`SimilaritySearch`] for the top-K passages, and the search implementation
//! uses an [`Embedder`] internally to turn the query into a vector.

use async_trait::async_trait;

use crate::document::Document;
use crate::error::{ProviderError, SearchError};

/// A vector index that can return the passages most similar to a query.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Backend name (e.g., "pinecone", "in_memory").
    fn name(&self) -> &str;

    /// Return up to `k` documents ordered by descending relevance.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>, SearchError>;
}

/// Turns text into an embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}
