//! Pinecone index client.
//!
//! The index host is resolved once through the environment's controller
//! (`GET https://controller.{environment}.pinecone.io/databases/{index}`)
//! unless configured explicitly. Queries go to `POST https://{host}/query`
//! with `includeMetadata`; the passage text lives under a metadata key
//! (`text` by default) and the remaining metadata is returned as-is.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use helpbot_config::PineconeConfig;
use helpbot_core::error::SearchError;
use helpbot_core::{Document, Embedder, SimilaritySearch};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    environment: Option<String>,
    index: String,
    namespace: Option<String>,
    text_key: String,
    host: OnceCell<String>,
    embedder: Arc<dyn Embedder>,
    timeout: Duration,
}

impl PineconeIndex {
    /// Build from the `[pinecone]` config section.
    ///
    /// Fails when the key, the index name, or both the host and the
    /// environment are missing.
    pub fn from_config(
        config: &PineconeConfig,
        embedder: Arc<dyn Embedder>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| SearchError::NotConfigured("Pinecone API key is not set".into()))?;
        let index = config
            .index
            .clone()
            .ok_or_else(|| SearchError::NotConfigured("Pinecone index is not set".into()))?;
        if config.host.is_none() && config.environment.is_none() {
            return Err(SearchError::NotConfigured(
                "Pinecone needs either an environment or an explicit host".into(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Network(e.to_string()))?;

        let host = match &config.host {
            Some(h) => OnceCell::new_with(Some(normalize_host(h))),
            None => OnceCell::new(),
        };

        Ok(Self {
            client,
            api_key,
            environment: config.environment.clone(),
            index,
            namespace: config.namespace.clone(),
            text_key: config.text_key.clone(),
            host,
            embedder,
            timeout,
        })
    }

    async fn host(&self) -> Result<&str, SearchError> {
        self.host
            .get_or_try_init(|| self.describe_index())
            .await
            .map(String::as_str)
    }

    /// Ask the controller where the index lives.
    async fn describe_index(&self) -> Result<String, SearchError> {
        let environment = self.environment.as_deref().ok_or_else(|| {
            SearchError::NotConfigured("Pinecone environment is not set".into())
        })?;
        let url = format!(
            "https://controller.{environment}.pinecone.io/databases/{}",
            self.index
        );

        debug!(index = %self.index, environment, "Resolving Pinecone index host");

        let response = self
            .client
            .get(&url)
            .header("Api-Key", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let response = check_status(response).await?;
        let description: IndexDescription = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(format!("index description: {e}")))?;

        Ok(normalize_host(&description.status.host))
    }

    fn send_error(&self, e: reqwest::Error) -> SearchError {
        if e.is_timeout() {
            SearchError::Timeout(self.timeout.as_secs())
        } else {
            SearchError::Network(e.to_string())
        }
    }

    fn query_body(&self, vector: Vec<f32>, k: usize) -> Value {
        let mut body = serde_json::json!({
            "vector": vector,
            "topK": k,
            "includeMetadata": true,
            "includeValues": false,
        });
        if let Some(ns) = &self.namespace {
            body["namespace"] = Value::String(ns.clone());
        }
        body
    }
}

#[async_trait]
impl SimilaritySearch for PineconeIndex {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>, SearchError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedder.embed(query).await?;
        let host = self.host().await?;
        let url = format!("https://{host}/query");

        let response = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&self.query_body(vector, k))
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let response = check_status(response).await?;
        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(format!("query response: {e}")))?;

        let documents = matches_to_documents(body, &self.text_key);
        debug!(index = %self.index, k, returned = documents.len(), "Pinecone query");
        Ok(documents)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
    let status = response.status().as_u16();
    match status {
        200 => Ok(response),
        401 | 403 => Err(SearchError::AuthenticationFailed(
            "Pinecone rejected the API key".into(),
        )),
        _ => {
            let message = response.text().await.unwrap_or_default();
            warn!(status, body = %message, "Pinecone returned error");
            Err(SearchError::Index {
                status_code: status,
                message,
            })
        }
    }
}

fn normalize_host(host: &str) -> String {
    host.trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

/// Turn query matches into documents, preserving Pinecone's order.
///
/// Matches without the text key carry no passage and are skipped.
fn matches_to_documents(body: QueryResponse, text_key: &str) -> Vec<Document> {
    body.matches
        .into_iter()
        .filter_map(|m| {
            let mut metadata = m.metadata.unwrap_or_default();
            match metadata.remove(text_key) {
                Some(Value::String(content)) => Some(Document { content, metadata }),
                _ => {
                    warn!(id = %m.id, text_key, "Match has no passage text, skipping");
                    None
                }
            }
        })
        .collect()
}

// --- Pinecone API types ---

#[derive(Debug, Deserialize)]
struct IndexDescription {
    status: IndexStatus,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    host: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    #[serde(default)]
    id: String,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}
