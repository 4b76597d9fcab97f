//! Effects produced by state transitions

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Register a transcript seeded with the system turn
    CreateTranscript { call_id: String },

    /// Drop the transcript (no-op if already gone)
    DestroyTranscript { call_id: String },

    AppendUserTurn { call_id: String, text: String },

    /// Stream a reply to the current transcript (spawns as background task)
    StartReply { call_id: String, reply_id: u64 },

    /// Cancel the in-flight reply task
    CancelReply,

    CommitAssistantTurn { call_id: String, text: String },
}

impl Effect {
    /// Effects that begin the reply to `text`: the user turn must land
    /// before the transcript snapshot is taken.
    pub fn begin_reply(call_id: &str, text: String, reply_id: u64) -> [Effect; 2] {
        [
            Effect::AppendUserTurn {
                call_id: call_id.to_string(),
                text,
            },
            Effect::StartReply {
                call_id: call_id.to_string(),
                reply_id,
            },
        ]
    }
}
