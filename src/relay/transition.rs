//! Pure state transition function

use super::{
    Effect, Event, InterruptPolicy, PartialReplyPolicy, ReplyOutcome, ReplyState, SessionContext,
    SessionState,
};
use crate::conversation::DuplicateSetupPolicy;
use std::collections::VecDeque;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Events the current state cannot accept. The state is left unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Prompt received before setup")]
    UnknownSession,
    #[error("Session is already bound to call {0}")]
    DuplicateSetup(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs; all I/O is
/// described by the returned effects.
pub fn transition(
    state: &SessionState,
    context: SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Closed is terminal, and closing before setup has nothing to release
        (SessionState::Closed, _) | (SessionState::Unbound, Event::Close) => {
            Ok(TransitionResult::new(SessionState::Closed))
        }

        // ============================================================
        // Setup
        // ============================================================
        (SessionState::Unbound, Event::Setup { call_id }) => Ok(TransitionResult::new(
            SessionState::Bound {
                call_id: call_id.clone(),
                reply: ReplyState::Idle,
                next_reply_id: 0,
            },
        )
        .with_effect(Effect::CreateTranscript { call_id })),

        (
            SessionState::Bound {
                call_id: bound,
                reply,
                next_reply_id,
            },
            Event::Setup { call_id },
        ) => rebind(
            bound,
            reply,
            *next_reply_id,
            call_id,
            context.duplicate_setup_policy,
        ),

        (SessionState::Bound { call_id: bound, .. }, Event::SetupRejected { call_id })
            if *bound == call_id =>
        {
            Ok(TransitionResult::new(SessionState::Unbound))
        }

        // ============================================================
        // Prompts
        // ============================================================
        (SessionState::Unbound, Event::Prompt { .. }) => Err(TransitionError::UnknownSession),

        (
            SessionState::Bound {
                call_id,
                reply: ReplyState::Idle,
                next_reply_id,
            },
            Event::Prompt { text },
        ) => Ok(start_reply(call_id, text, *next_reply_id, VecDeque::new())),

        // Busy: queue behind the reply in flight
        (
            SessionState::Bound {
                call_id,
                reply: ReplyState::Streaming { reply_id, queued },
                next_reply_id,
            },
            Event::Prompt { text },
        ) => {
            let mut queued = queued.clone();
            queued.push_back(text);
            Ok(TransitionResult::new(SessionState::Bound {
                call_id: call_id.clone(),
                reply: ReplyState::Streaming {
                    reply_id: *reply_id,
                    queued,
                },
                next_reply_id: *next_reply_id,
            }))
        }

        // ============================================================
        // Interrupts
        // ============================================================
        (
            SessionState::Bound {
                reply: ReplyState::Streaming { .. },
                ..
            },
            Event::Interrupt { .. },
        ) if context.interrupt_policy == InterruptPolicy::CancelReply => {
            // The reply task reports back with `ReplyFinished`; state moves on then.
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::CancelReply))
        }

        // ============================================================
        // Reply completion
        // ============================================================
        (
            SessionState::Bound {
                call_id,
                reply: ReplyState::Streaming { reply_id, queued },
                next_reply_id,
            },
            Event::ReplyFinished {
                reply_id: finished,
                outcome,
            },
        ) if *reply_id == finished => Ok(finish_reply(
            call_id,
            queued,
            *next_reply_id,
            outcome,
            context.partial_reply_policy,
        )),

        // ============================================================
        // Close
        // ============================================================
        (SessionState::Bound { call_id, reply, .. }, Event::Close) => {
            let mut result = TransitionResult::new(SessionState::Closed);
            if matches!(reply, ReplyState::Streaming { .. }) {
                result = result.with_effect(Effect::CancelReply);
            }
            Ok(result.with_effect(Effect::DestroyTranscript {
                call_id: call_id.clone(),
            }))
        }

        // Everything else leaves the state alone: unknown message types,
        // interrupts that change nothing, stale reply completions and
        // rejections for keys no longer bound.
        (
            _,
            Event::Unknown { .. }
            | Event::Interrupt { .. }
            | Event::ReplyFinished { .. }
            | Event::SetupRejected { .. },
        ) => Ok(TransitionResult::new(state.clone())),
    }
}

/// Second setup on a bound session
fn rebind(
    bound: &str,
    reply: &ReplyState,
    next_reply_id: u64,
    call_id: String,
    policy: DuplicateSetupPolicy,
) -> Result<TransitionResult, TransitionError> {
    if policy == DuplicateSetupPolicy::Reject {
        return Err(TransitionError::DuplicateSetup(bound.to_string()));
    }

    let mut result = TransitionResult::new(SessionState::Bound {
        call_id: call_id.clone(),
        reply: ReplyState::Idle,
        next_reply_id,
    });
    if matches!(reply, ReplyState::Streaming { .. }) {
        result = result.with_effect(Effect::CancelReply);
    }
    if bound != call_id {
        result = result.with_effect(Effect::DestroyTranscript {
            call_id: bound.to_string(),
        });
    }
    Ok(result.with_effect(Effect::CreateTranscript { call_id }))
}

fn start_reply(
    call_id: &str,
    text: String,
    reply_id: u64,
    queued: VecDeque<String>,
) -> TransitionResult {
    TransitionResult::new(SessionState::Bound {
        call_id: call_id.to_string(),
        reply: ReplyState::Streaming { reply_id, queued },
        next_reply_id: reply_id + 1,
    })
    .with_effects(Effect::begin_reply(call_id, text, reply_id))
}

/// Record the finished reply, then start the next queued prompt if any.
fn finish_reply(
    call_id: &str,
    queued: &VecDeque<String>,
    next_reply_id: u64,
    outcome: ReplyOutcome,
    policy: PartialReplyPolicy,
) -> TransitionResult {
    let commit = committed_text(outcome, policy).map(|text| Effect::CommitAssistantTurn {
        call_id: call_id.to_string(),
        text,
    });

    let mut queued = queued.clone();
    let next = match queued.pop_front() {
        Some(text) => start_reply(call_id, text, next_reply_id, queued),
        None => TransitionResult::new(SessionState::Bound {
            call_id: call_id.to_string(),
            reply: ReplyState::Idle,
            next_reply_id,
        }),
    };

    // The commit lands before the next reply's user turn
    TransitionResult::new(next.new_state).with_effects(commit.into_iter().chain(next.effects))
}

/// Text to record as the assistant turn for a finished reply
fn committed_text(outcome: ReplyOutcome, policy: PartialReplyPolicy) -> Option<String> {
    match outcome {
        ReplyOutcome::Completed { text } => Some(text),
        ReplyOutcome::Failed { emitted, .. } | ReplyOutcome::Cancelled { emitted } => {
            match policy {
                PartialReplyPolicy::Commit if !emitted.trim().is_empty() => Some(emitted),
                _ => None,
            }
        }
    }
}
