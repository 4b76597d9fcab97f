//! Common types for LLM interactions

use crate::conversation::{Role, Turn};

/// Completion request: the whole transcript, system turn first
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub messages: Vec<LlmMessage>,
}

impl LlmRequest {
    pub fn from_transcript(transcript: &[Turn]) -> Self {
        Self {
            messages: transcript.iter().map(LlmMessage::from).collect(),
        }
    }
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmMessage {
    pub role: MessageRole,
    pub content: String,
}

impl From<&Turn> for LlmMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.into(),
            content: turn.text.clone(),
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::System => MessageRole::System,
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
        }
    }
}
