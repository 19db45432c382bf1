//! Contextual retrieval: similarity search plus provenance formatting.

use std::sync::Arc;

use async_trait::async_trait;
use helpbot_core::{Document, Result, SimilaritySearch};
use tracing::debug;

use crate::provenance::ProvenanceFormatter;

/// Number of passages fetched per question unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 4;

/// Fetches the passages a question should be answered from.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>>;
}

/// Wraps a [`SimilaritySearch`] and formats every passage it returns.
///
/// Order and count come straight from the search backend: no filtering,
/// re-ranking or retries.
pub struct ContextualRetriever {
    search: Arc<dyn SimilaritySearch>,
    formatter: ProvenanceFormatter,
    k: usize,
}

impl ContextualRetriever {
    pub fn new(search: Arc<dyn SimilaritySearch>) -> Self {
        Self {
            search,
            formatter: ProvenanceFormatter::new(),
            k: DEFAULT_TOP_K,
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }
}

#[async_trait]
impl Retriever for ContextualRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        let raw = self.search.search(query, self.k).await?;
        debug!(backend = self.search.name(), k = self.k, returned = raw.len(), "Similarity search");

        let formatted = raw
            .iter()
            .take(self.k)
            .map(|doc| self.formatter.format(doc))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(formatted)
    }
}
