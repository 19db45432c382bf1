//! Channel trait: the abstraction over chat platforms.
//!
//! A Channel connects helpbot to a messaging platform. It delivers inbound
//! events as a stream and posts replies back. Connection management,
//! authentication and transport-level acknowledgement are the channel's own
//! business; consumers only see [`InboundEvent`]s.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Unique identifier for a channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of platform event was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The bot was addressed directly
    Mention,
    /// Any other event type, keeping the platform's name for logging
    Other(String),
}

/// An event delivered by a chat transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub kind: EventKind,

    /// Platform-assigned message identifier (opaque, never reused)
    pub message_id: String,

    /// Conversation the reply must go to
    pub channel_id: String,

    /// The message text
    pub text: String,

    /// Sender identifier, when the platform provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
}

impl InboundEvent {
    /// Shorthand for a mention event.
    pub fn mention(
        message_id: impl Into<String>,
        channel_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            kind: EventKind::Mention,
            message_id: message_id.into(),
            channel_id: channel_id.into(),
            text: text.into(),
            sender_id: None,
        }
    }

    pub fn is_mention(&self) -> bool {
        self.kind == EventKind::Mention
    }
}

/// The core Channel trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "slack").
    fn name(&self) -> &str;

    /// Unique ID for this channel instance.
    fn id(&self) -> &ChannelId;

    /// Start listening for inbound events.
    ///
    /// Implementations must acknowledge every event to the platform
    /// themselves before yielding it, so that acknowledgement never waits on
    /// whoever consumes the receiver.
    async fn start(
        &self,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<InboundEvent, ChannelError>>, ChannelError>;

    /// Post a text message to a conversation.
    async fn post(&self, channel_id: &str, text: &str) -> Result<(), ChannelError>;

    /// Stop the channel gracefully.
    async fn stop(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Health check: are the credentials valid and the platform reachable?
    async fn health_check(&self) -> Result<bool, ChannelError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mention_constructor() {
        let event = InboundEvent::mention("m1", "C123", "how do I do X?");
        assert!(event.is_mention());
        assert_eq!(event.message_id, "m1");
        assert_eq!(event.channel_id, "C123");
        assert!(event.sender_id.is_none());
    }

    #[test]
    fn other_kind_is_not_a_mention() {
        let event = InboundEvent {
            kind: EventKind::Other("message".into()),
            ..InboundEvent::mention("m2", "C1", "hi")
        };
        assert!(!event.is_mention());
        let json = serde_json::to_string(&event.kind).unwrap();
        assert_eq!(json, r#"{"other":"message"}"#);
    }
}
