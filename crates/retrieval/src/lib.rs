//! Similarity search backends for helpbot.
//!
//! All backends implement `helpbot_core::SimilaritySearch`. Query embedding
//! goes through an `helpbot_core::Embedder`, usually a [`ProviderEmbedder`].

pub mod embedder;
pub mod in_memory;
pub mod pinecone;
pub mod vector;

pub use embedder::ProviderEmbedder;
pub use in_memory::InMemoryIndex;
pub use pinecone::PineconeIndex;
