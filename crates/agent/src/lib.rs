//! # helpbot agent
//!
//! The retrieval-augmented answer pipeline and the chat event dispatcher.
//!
//! ```text
//! InboundEvent ─► DedupDispatcher ─► AnswerOrchestrator
//!                                     ├─► ContextualRetriever ─► SimilaritySearch
//!                                     │                       └─► ProvenanceFormatter
//!                                     ├─► PromptAssembler
//!                                     └─► Provider (temperature 0)
//! ```

pub mod dispatcher;
pub mod orchestrator;
pub mod prompt;
pub mod provenance;
pub mod retriever;

#[cfg(test)]
mod test_helpers;

pub use dispatcher::{
    DedupDispatcher, DispatchOutcome, DispatchStats, FailurePolicy, HandledMessageRegistry,
    IgnoreReason,
};
pub use orchestrator::{AnswerOrchestrator, OrchestratorSettings};
pub use prompt::{PromptAssembler, PromptPolicy};
pub use provenance::ProvenanceFormatter;
pub use retriever::{ContextualRetriever, Retriever, DEFAULT_TOP_K};
