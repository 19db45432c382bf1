//! The question-answering seam shared by the terminal loop and the chat
//! dispatcher.

use async_trait::async_trait;

use crate::error::Result;

/// Anything that can turn a question into an answer.
///
/// The retrieval-augmented orchestrator is the production implementation;
/// front-ends depend on this trait so they can be exercised with stubs.
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, query: &str) -> Result<String>;
}
