//! Events that can occur in a relay session

use super::ReplyOutcome;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // Relay peer events
    Setup {
        call_id: String,
    },
    Prompt {
        text: String,
    },
    Interrupt {
        /// What the caller heard before barging in
        utterance_until_interrupt: Option<String>,
        duration_until_interrupt_ms: Option<u64>,
    },
    /// Connection closed by either side
    Close,
    Unknown {
        kind: String,
    },

    // Internal events
    /// A reply task ended; `reply_id` matches the `StartReply` that spawned it
    ReplyFinished {
        reply_id: u64,
        outcome: ReplyOutcome,
    },
    /// The store refused to register the key bound by the last setup
    SetupRejected {
        call_id: String,
    },
}

impl Event {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Event::Setup { .. } => "setup",
            Event::Prompt { .. } => "prompt",
            Event::Interrupt { .. } => "interrupt",
            Event::Close => "close",
            Event::Unknown { .. } => "unknown",
            Event::ReplyFinished { .. } => "reply_finished",
            Event::SetupRejected { .. } => "setup_rejected",
        }
    }
}
