//! Chat messages as they flow through a turn

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in a conversation.
///
/// Histories are append-only: the last element of a `Vec<Message>` is always the
/// most recent turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Opaque unique identifier
    #[serde(default = "new_message_id")]
    pub id: String,

    pub role: MessageRole,

    pub content: String,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    /// Create a message with a fresh id and the current timestamp
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Replace the generated id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(Message::user("hi").role, MessageRole::User);
        assert_eq!(Message::assistant("hello").role, MessageRole::Assistant);
        assert_eq!(Message::system("rules").role, MessageRole::System);
        assert_ne!(Message::user("a").id, Message::user("a").id);
    }

    #[test]
    fn test_deserialize_fills_missing_fields() {
        let json = r#"{"role":"user","content":"What is Rust?"}"#;
        let message: Message = serde_json::from_str(json).unwrap();

        assert_eq!(message.role, MessageRole::User);
        assert_eq!(message.content, "What is Rust?");
        assert!(!message.id.is_empty());
    }

    #[test]
    fn test_wire_format() {
        let message = Message::assistant("ok").with_id("m-1");
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["id"], "m-1");
        assert_eq!(value["role"], "assistant");
        assert!(value.get("createdAt").is_some());
    }
}
