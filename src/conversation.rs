//! Per-call conversation transcripts
//!
//! The store is the only state shared between concurrent calls. The outer
//! map lock is held just long enough to find or insert an entry; every
//! mutation of a transcript happens under that transcript's own lock, so
//! calls never wait on each other.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Speaker of a transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry of a transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Ordered conversation history of one call. The first turn is always the
/// single system turn.
pub type Transcript = Vec<Turn>;

/// What `create` does when the call key is already registered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateSetupPolicy {
    /// Replace the existing transcript with a fresh one
    #[default]
    Overwrite,
    /// Refuse with `ConversationError::DuplicateSetup`
    Reject,
}

impl FromStr for DuplicateSetupPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(DuplicateSetupPolicy::Overwrite),
            "reject" => Ok(DuplicateSetupPolicy::Reject),
            other => Err(format!(
                "unknown duplicate setup policy '{other}' (expected overwrite or reject)"
            )),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("No conversation for call {0}")]
    UnknownSession(String),
    #[error("Call {0} is already set up")]
    DuplicateSetup(String),
    #[error("System turns can only be added at setup")]
    SystemTurnNotAllowed,
}

/// Concurrency-safe map from call key to transcript
pub struct ConversationStore {
    system_prompt: String,
    duplicate_policy: DuplicateSetupPolicy,
    sessions: RwLock<HashMap<String, Arc<Mutex<Transcript>>>>,
}

impl ConversationStore {
    pub fn new(system_prompt: impl Into<String>, duplicate_policy: DuplicateSetupPolicy) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            duplicate_policy,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a transcript for `key`, seeded with the system instruction.
    pub async fn create(&self, key: &str) -> Result<(), ConversationError> {
        let seeded = Arc::new(Mutex::new(vec![Turn::system(self.system_prompt.clone())]));
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(key) {
            match self.duplicate_policy {
                DuplicateSetupPolicy::Reject => {
                    return Err(ConversationError::DuplicateSetup(key.to_string()));
                }
                DuplicateSetupPolicy::Overwrite => {
                    tracing::warn!(call_id = %key, "Overwriting existing transcript");
                }
            }
        }
        sessions.insert(key.to_string(), seeded);
        Ok(())
    }

    /// Append a user or assistant turn.
    pub async fn append(&self, key: &str, turn: Turn) -> Result<(), ConversationError> {
        if turn.role == Role::System {
            return Err(ConversationError::SystemTurnNotAllowed);
        }
        let entry = self.entry(key).await?;
        entry.lock().await.push(turn);
        Ok(())
    }

    /// Snapshot of the transcript in insertion order.
    pub async fn get(&self, key: &str) -> Result<Transcript, ConversationError> {
        let entry = self.entry(key).await?;
        let transcript = entry.lock().await;
        Ok(transcript.clone())
    }

    /// Drop the transcript. Missing keys are fine.
    pub async fn destroy(&self, key: &str) {
        if self.sessions.write().await.remove(key).is_some() {
            tracing::debug!(call_id = %key, "Transcript discarded");
        }
    }

    #[allow(dead_code)] // API completeness
    pub async fn contains(&self, key: &str) -> bool {
        self.sessions.read().await.contains_key(key)
    }

    /// Number of active calls
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    #[allow(dead_code)] // API completeness
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn entry(&self, key: &str) -> Result<Arc<Mutex<Transcript>>, ConversationError> {
        self.sessions
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ConversationError::UnknownSession(key.to_string()))
    }
}
