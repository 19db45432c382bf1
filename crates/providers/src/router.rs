//! Provider selection from configuration.
//!
//! helpbot talks to one completion endpoint and one embedding endpoint. Both
//! speak the OpenAI wire format; they only differ in base URL and key.

use std::sync::Arc;
use std::time::Duration;

use helpbot_config::AppConfig;
use helpbot_core::provider::Provider;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the completion provider from configuration.
pub fn build_from_config(config: &AppConfig) -> Arc<dyn Provider> {
    let completion = &config.completion;
    let base_url = completion
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&completion.provider));
    let api_key = completion.api_key.clone().unwrap_or_default();

    Arc::new(OpenAiCompatProvider::with_timeout(
        &completion.provider,
        base_url,
        api_key,
        Duration::from_secs(completion.timeout_secs),
    ))
}

/// Build the provider used to embed queries.
///
/// Falls back to the completion endpoint and key when the embedding section
/// leaves them unset.
pub fn build_embedding_provider(config: &AppConfig) -> Arc<dyn Provider> {
    let completion = &config.completion;
    let embedding = &config.embedding;

    let base_url = embedding
        .api_url
        .clone()
        .or_else(|| completion.api_url.clone())
        .unwrap_or_else(|| default_base_url(&completion.provider));
    let api_key = embedding
        .api_key
        .clone()
        .or_else(|| completion.api_key.clone())
        .unwrap_or_default();

    Arc::new(OpenAiCompatProvider::with_timeout(
        format!("{}-embeddings", completion.provider),
        base_url,
        api_key,
        Duration::from_secs(config.retrieval.timeout_secs),
    ))
}

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config() {
        let config = AppConfig::default();
        let provider = build_from_config(&config);
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn embedding_provider_is_named_after_completion_provider() {
        let mut config = AppConfig::default();
        config.completion.provider = "ollama".into();
        let provider = build_embedding_provider(&config);
        assert_eq!(provider.name(), "ollama-embeddings");
    }
}
