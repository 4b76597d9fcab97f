//! Relay session state and per-session policies

use crate::conversation::DuplicateSetupPolicy;
use std::collections::VecDeque;
use std::str::FromStr;

/// Session lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Connected, no call identifier yet
    #[default]
    Unbound,

    Bound {
        call_id: String,
        reply: ReplyState,
        /// Id handed to the next `StartReply`
        next_reply_id: u64,
    },

    /// Terminal; every further event is ignored
    Closed,
}

/// Reply activity within a bound session
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReplyState {
    #[default]
    Idle,

    /// One reply in flight; prompts received meanwhile wait in FIFO order
    Streaming {
        reply_id: u64,
        queued: VecDeque<String>,
    },
}

impl SessionState {
    pub fn call_id(&self) -> Option<&str> {
        match self {
            SessionState::Bound { call_id, .. } => Some(call_id),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }

    #[allow(dead_code)] // Used by tests
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            SessionState::Bound {
                reply: ReplyState::Streaming { .. },
                ..
            }
        )
    }
}

/// What an `interrupt` does to the reply in flight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InterruptPolicy {
    /// Log it; the reply runs to completion
    #[default]
    SignalOnly,
    /// Cancel the reply
    CancelReply,
}

/// What happens to text already spoken when a reply ends early
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PartialReplyPolicy {
    /// The transcript gets no assistant turn
    #[default]
    Discard,
    /// The emitted text becomes the assistant turn
    Commit,
}

/// Immutable per-session configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_field_names)] // policy suffix is meaningful
pub struct SessionContext {
    pub interrupt_policy: InterruptPolicy,
    pub duplicate_setup_policy: DuplicateSetupPolicy,
    pub partial_reply_policy: PartialReplyPolicy,
}

impl FromStr for InterruptPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "signal_only" => Ok(InterruptPolicy::SignalOnly),
            "cancel_reply" => Ok(InterruptPolicy::CancelReply),
            other => Err(format!(
                "unknown interrupt policy '{other}' (expected signal_only or cancel_reply)"
            )),
        }
    }
}

impl FromStr for PartialReplyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discard" => Ok(PartialReplyPolicy::Discard),
            "commit" => Ok(PartialReplyPolicy::Commit),
            other => Err(format!(
                "unknown partial reply policy '{other}' (expected discard or commit)"
            )),
        }
    }
}
