//! Subcommand implementations and the wiring they share.

pub mod ask;
pub mod chat;
pub mod doctor;
pub mod slack;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use helpbot_agent::{AnswerOrchestrator, ContextualRetriever, OrchestratorSettings, PromptAssembler};
use helpbot_config::{AppConfig, ConfigError};
use helpbot_core::SimilaritySearch;
use helpbot_retrieval::{PineconeIndex, ProviderEmbedder};
use tracing::info;

/// Load configuration from an explicit path or the default location.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    }
}

/// Build the Pinecone-backed vector search.
pub fn build_search(
    config: &AppConfig,
) -> Result<Arc<dyn SimilaritySearch>, Box<dyn std::error::Error>> {
    let embedder = Arc::new(ProviderEmbedder::new(
        helpbot_providers::build_embedding_provider(config),
        &config.embedding.model,
    ));

    Ok(Arc::new(PineconeIndex::from_config(
        &config.pinecone,
        embedder,
        Duration::from_secs(config.retrieval.timeout_secs),
    )?))
}

/// Assemble the full answer pipeline from configuration.
pub fn build_answerer(
    config: &AppConfig,
) -> Result<Arc<AnswerOrchestrator>, Box<dyn std::error::Error>> {
    let missing = config.missing_for_answering();
    if !missing.is_empty() {
        return Err(ConfigError::Missing(missing).into());
    }

    let search = build_search(config)?;
    info!(
        backend = search.name(),
        top_k = config.retrieval.top_k,
        model = %config.completion.model,
        policy = ?config.prompt.policy,
        "Answer pipeline ready"
    );

    let retriever = ContextualRetriever::new(search).with_k(config.retrieval.top_k);
    Ok(Arc::new(AnswerOrchestrator::new(
        Arc::new(retriever),
        PromptAssembler::new(config.prompt.policy.into()),
        helpbot_providers::build_from_config(config),
        OrchestratorSettings::from_config(config),
    )))
}
