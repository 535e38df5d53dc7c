//! Chat event payloads carried through the queue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// What happened in the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChatEventKind {
    /// A new message was posted
    #[default]
    Message,
    /// An existing message was edited
    Edit,
    /// A reaction was added to a message
    Reaction,
    /// Someone started typing
    Typing,
    /// Membership, topic or other service notice
    System,
}

/// A single event arriving from a chat channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Unique event identifier
    pub id: String,
    /// Channel identifier (e.g., "telegram", "discord")
    pub channel: String,
    /// User identifier
    pub sender_id: String,
    /// Chat/channel identifier
    pub chat_id: String,
    /// Event kind
    #[serde(default)]
    pub kind: ChatEventKind,
    /// Text content (empty for typing notices)
    #[serde(default)]
    pub content: String,
    /// Time the event was received
    pub timestamp: DateTime<Utc>,
    /// Channel-specific metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ChatEvent {
    /// Create a new message event
    pub fn new(
        channel: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            channel: channel.into(),
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            kind: ChatEventKind::Message,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Get the unique session key for this event
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id)
    }

    /// Set the event kind
    pub fn with_kind(mut self, kind: ChatEventKind) -> Self {
        self.kind = kind;
        self
    }

    /// Add metadata to the event
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
