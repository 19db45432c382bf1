//! Query embedding through a model provider's embedding endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use helpbot_core::Embedder;
use helpbot_core::error::ProviderError;
use helpbot_core::provider::{EmbeddingRequest, Provider};

/// An [`Embedder`] backed by a [`Provider`]'s `embed` call.
pub struct ProviderEmbedder {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let response = self
            .provider
            .embed(EmbeddingRequest {
                model: self.model.clone(),
                inputs: vec![text.to_string()],
            })
            .await?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 200,
                message: "Embedding response contained no vectors".into(),
            })
    }
}
