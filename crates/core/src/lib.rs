//! # helpbot core
//!
//! Domain types, collaborator traits, and error definitions for the helpbot
//! question-answering runtime. This crate has no transport or HTTP
//! dependencies; it defines the model every other crate implements against.
//!
//! ## Design
//!
//! Every external collaborator (completion model, embedding model, vector
//! index, chat transport) is a trait here. Implementations live in their own
//! crates, which keeps the answer pipeline testable with in-process stubs.

pub mod answer;
pub mod channel;
pub mod document;
pub mod error;
pub mod message;
pub mod provider;
pub mod search;

// Re-export key types at crate root for ergonomics
pub use answer::Answerer;
pub use channel::{Channel, ChannelId, EventKind, InboundEvent};
pub use document::{Document, IssueState, SourceStream};
pub use error::{Error, Result};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use search::{Embedder, SimilaritySearch};
