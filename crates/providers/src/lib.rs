//! Language model provider implementations for helpbot.
//!
//! All providers implement the `helpbot_core::Provider` trait.
//! [`build_from_config`] picks the endpoint and credentials from configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_embedding_provider, build_from_config, default_base_url};
