//! In-memory index for tests and embedding the pipeline without a hosted store.

use std::sync::Arc;

use async_trait::async_trait;
use helpbot_core::error::SearchError;
use helpbot_core::{Document, Embedder, SimilaritySearch};
use tokio::sync::RwLock;
use tracing::debug;

use crate::vector;

struct Entry {
    document: Document,
    embedding: Vec<f32>,
}

/// A brute-force cosine index over documents held in a Vec.
pub struct InMemoryIndex {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Embed and store a document.
    pub async fn insert(&self, document: Document) -> Result<(), SearchError> {
        let embedding = self.embedder.embed(&document.content).await?;
        self.insert_embedded(document, embedding).await;
        Ok(())
    }

    /// Store a document with a precomputed embedding.
    pub async fn insert_embedded(&self, document: Document, embedding: Vec<f32>) {
        self.entries.write().await.push(Entry {
            document,
            embedding,
        });
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SimilaritySearch for InMemoryIndex {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>, SearchError> {
        let query_embedding = self.embedder.embed(query).await?;
        let entries = self.entries.read().await;

        let ranked = vector::top_k(
            entries.iter().map(|e| e.embedding.as_slice()),
            &query_embedding,
            k,
        );
        debug!(candidates = entries.len(), returned = ranked.len(), "In-memory search");

        Ok(ranked
            .into_iter()
            .map(|(i, _)| entries[i].document.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helpbot_core::error::ProviderError;

    /// Embeds text as keyword counts over a tiny fixed vocabulary.
    struct KeywordEmbedder;

    const VOCAB: [&str; 4] = ["pagination", "auth", "schema", "cursor"];

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            let lower = text.to_lowercase();
            Ok(VOCAB
                .iter()
                .map(|w| lower.matches(w).count() as f32)
                .collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    async fn seeded() -> InMemoryIndex {
        let index = InMemoryIndex::new(Arc::new(KeywordEmbedder));
        for text in [
            "Auth with API keys",
            "Cursor pagination with a cursor field",
            "Schema inference",
            "Page-number pagination",
        ] {
            index.insert(Document::new(text)).await.unwrap();
        }
        index
    }

    #[tokio::test]
    async fn search_returns_most_similar_first() {
        let index = seeded().await;
        let results = index.search("cursor pagination", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "Cursor pagination with a cursor field");
        assert_eq!(results[1].content, "Page-number pagination");
    }

    #[tokio::test]
    async fn search_never_returns_more_than_k() {
        let index = seeded().await;
        assert_eq!(index.len().await, 4);
        assert_eq!(index.search("schema", 10).await.unwrap().len(), 4);
        assert!(index.search("schema", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_index_returns_nothing() {
        let index = InMemoryIndex::new(Arc::new(KeywordEmbedder));
        assert!(index.is_empty().await);
        assert!(index.search("auth", 4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn metadata_survives_search() {
        let index = InMemoryIndex::new(Arc::new(KeywordEmbedder));
        let doc = Document::new("auth header")
            .with_meta("_airbyte_stream", "issues")
            .with_meta("number", 7);
        index.insert_embedded(doc.clone(), vec![0.0, 1.0, 0.0, 0.0]).await;
        let results = index.search("auth", 1).await.unwrap();
        assert_eq!(results, vec![doc]);
    }

    #[tokio::test]
    async fn embedding_failure_is_a_search_error() {
        let index = InMemoryIndex::new(Arc::new(FailingEmbedder));
        let err = index.search("anything", 4).await.unwrap_err();
        assert!(matches!(err, SearchError::Embedding(ProviderError::Network(_))));
    }
}
