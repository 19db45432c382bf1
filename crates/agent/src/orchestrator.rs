//! The answer pipeline: retrieve, assemble, complete.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use helpbot_config::AppConfig;
use helpbot_core::error::{Error, ProviderError, SearchError};
use helpbot_core::{Answerer, Message, Provider, ProviderRequest, Result};
use tracing::{debug, info};

use crate::prompt::PromptAssembler;
use crate::retriever::Retriever;

/// Completion settings for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub model: String,
    pub max_tokens: Option<u32>,
    pub retrieval_timeout: Duration,
    pub completion_timeout: Duration,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.completion.model.clone(),
            max_tokens: Some(config.completion.max_tokens),
            retrieval_timeout: Duration::from_secs(config.retrieval.timeout_secs),
            completion_timeout: Duration::from_secs(config.completion.timeout_secs),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Answers a question from retrieved context in a single completion call.
///
/// Nothing is cached and nothing is retried: every call runs the whole
/// pipeline, and a failed retrieval means the model is never asked.
pub struct AnswerOrchestrator {
    retriever: Arc<dyn Retriever>,
    assembler: PromptAssembler,
    provider: Arc<dyn Provider>,
    settings: OrchestratorSettings,
}

impl AnswerOrchestrator {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        assembler: PromptAssembler,
        provider: Arc<dyn Provider>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            retriever,
            assembler,
            provider,
            settings,
        }
    }

    fn request(&self, prompt: String) -> ProviderRequest {
        ProviderRequest {
            model: self.settings.model.clone(),
            messages: vec![Message::user(prompt)],
            temperature: 0.0,
            max_tokens: self.settings.max_tokens,
            stop: Vec::new(),
        }
    }
}

#[async_trait]
impl Answerer for AnswerOrchestrator {
    async fn answer(&self, query: &str) -> Result<String> {
        if query.trim().is_empty() {
            return Err(Error::InvalidQuery("question is empty".into()));
        }
        let started = Instant::now();

        let documents = tokio::time::timeout(
            self.settings.retrieval_timeout,
            self.retriever.retrieve(query),
        )
        .await
        .map_err(|_| SearchError::Timeout(self.settings.retrieval_timeout.as_secs()))??;

        let prompt = self.assembler.assemble(&documents, query);
        debug!(docs = documents.len(), prompt_len = prompt.len(), "Prompt assembled");

        let response = tokio::time::timeout(
            self.settings.completion_timeout,
            self.provider.complete(self.request(prompt)),
        )
        .await
        .map_err(|_| {
            ProviderError::Timeout(format!(
                "no completion within {}s",
                self.settings.completion_timeout.as_secs()
            ))
        })??;

        // Whitespace is still an answer; nothing at all is not.
        if response.message.content.is_empty() {
            return Err(Error::Completion(ProviderError::ApiError {
                status_code: 200,
                message: "empty completion".into(),
            }));
        }

        info!(
            provider = self.provider.name(),
            model = %response.model,
            docs = documents.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Answered question"
        );

        Ok(response.message.content)
    }
}
