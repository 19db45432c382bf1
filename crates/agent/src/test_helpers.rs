//! Shared collaborator doubles for agent tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use helpbot_core::channel::{Channel, ChannelId, InboundEvent};
use helpbot_core::error::{ChannelError, Error, ProviderError, SearchError};
use helpbot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use helpbot_core::{Answerer, Document, Message, SimilaritySearch};
use tokio::sync::mpsc;

/// A provider that replays scripted completions in order and records every
/// request it receives.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn answering<'a>(answers: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            script: Mutex::new(answers.into_iter().map(|a| Ok(a.to_string())).collect()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            script: Mutex::new(VecDeque::from([Err(error)])),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider: script exhausted");

        next.map(|text| ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model,
        })
    }
}

/// A search backend returning a fixed list of documents.
pub struct StaticSearch {
    documents: Vec<Document>,
    error: Option<SearchError>,
    respect_k: bool,
    delay: Option<Duration>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl StaticSearch {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            error: None,
            respect_k: true,
            delay: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: SearchError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(Vec::new())
        }
    }

    /// Return every document regardless of the requested `k`.
    pub fn ignoring_k(mut self) -> Self {
        self.respect_k = false;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl SimilaritySearch for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<Document>, SearchError> {
        self.queries.lock().unwrap().push((query.to_string(), k));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        let limit = if self.respect_k { k } else { usize::MAX };
        Ok(self.documents.iter().take(limit).cloned().collect())
    }
}

/// An answerer that returns the same reply (or error) for every question.
pub struct FixedAnswerer {
    reply: Option<String>,
    delay: Option<Duration>,
    questions: Mutex<Vec<String>>,
}

impl FixedAnswerer {
    pub fn ok(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            delay: None,
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            delay: None,
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.questions.lock().unwrap().len()
    }
}

#[async_trait]
impl Answerer for FixedAnswerer {
    async fn answer(&self, query: &str) -> helpbot_core::Result<String> {
        self.questions.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone().ok_or_else(|| {
            Error::Completion(ProviderError::ApiError {
                status_code: 500,
                message: "model unavailable".into(),
            })
        })
    }
}

/// A channel that records posts instead of delivering them.
pub struct RecordingChannel {
    id: ChannelId,
    reject: bool,
    posts: Mutex<Vec<(String, String)>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("recording".into()),
            reject: false,
            posts: Mutex::new(Vec::new()),
        }
    }

    /// Every post fails.
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::new()
        }
    }

    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<InboundEvent, ChannelError>>, ChannelError> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn post(&self, channel_id: &str, text: &str) -> Result<(), ChannelError> {
        if self.reject {
            return Err(ChannelError::DeliveryFailed {
                channel: channel_id.into(),
                reason: "channel_not_found".into(),
            });
        }
        self.posts
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}
