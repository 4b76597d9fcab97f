//! Property-based tests for the session state machine

use super::*;
use crate::conversation::DuplicateSetupPolicy;
use crate::llm::LlmError;
use proptest::prelude::*;

fn arb_context() -> impl Strategy<Value = SessionContext> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(cancel, reject, commit)| {
        SessionContext {
            interrupt_policy: if cancel {
                InterruptPolicy::CancelReply
            } else {
                InterruptPolicy::SignalOnly
            },
            duplicate_setup_policy: if reject {
                DuplicateSetupPolicy::Reject
            } else {
                DuplicateSetupPolicy::Overwrite
            },
            partial_reply_policy: if commit {
                PartialReplyPolicy::Commit
            } else {
                PartialReplyPolicy::Discard
            },
        }
    })
}

fn arb_call_id() -> impl Strategy<Value = String> {
    prop_oneof![Just("CA1".to_string()), Just("CA2".to_string())]
}

fn arb_outcome() -> impl Strategy<Value = ReplyOutcome> {
    prop_oneof![
        "[a-z .]{0,12}".prop_map(|text| ReplyOutcome::Completed { text }),
        "[a-z .]{0,12}".prop_map(|emitted| ReplyOutcome::Failed {
            emitted,
            error: LlmError::stream("Stream interrupted"),
        }),
        "[a-z .]{0,12}".prop_map(|emitted| ReplyOutcome::Cancelled { emitted }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_call_id().prop_map(|call_id| Event::Setup { call_id }),
        "[a-z ]{1,10}".prop_map(|text| Event::Prompt { text }),
        Just(Event::Interrupt {
            utterance_until_interrupt: None,
            duration_until_interrupt_ms: None,
        }),
        Just(Event::Close),
        Just(Event::Unknown {
            kind: "dtmf".to_string()
        }),
        (0u64..4, arb_outcome()).prop_map(|(reply_id, outcome)| Event::ReplyFinished {
            reply_id,
            outcome
        }),
        arb_call_id().prop_map(|call_id| Event::SetupRejected { call_id }),
    ]
}

/// Run a sequence, skipping rejected events the way the executor does.
fn run(context: SessionContext, events: Vec<Event>) -> Vec<(SessionState, TransitionResult)> {
    let mut state = SessionState::Unbound;
    let mut steps = Vec::new();
    for event in events {
        if let Ok(result) = transition(&state, context, event) {
            state = result.new_state.clone();
            steps.push((state.clone(), result));
        }
    }
    steps
}

proptest! {
    #[test]
    fn prop_transition_never_panics(
        context in arb_context(),
        events in proptest::collection::vec(arb_event(), 0..40),
    ) {
        let _ = run(context, events);
    }

    #[test]
    fn prop_closed_is_absorbing(
        context in arb_context(),
        event in arb_event(),
    ) {
        let result = transition(&SessionState::Closed, context, event).unwrap();
        prop_assert_eq!(result.new_state, SessionState::Closed);
        prop_assert!(result.effects.is_empty());
    }

    #[test]
    fn prop_at_most_one_reply_in_flight(
        context in arb_context(),
        events in proptest::collection::vec(arb_event(), 0..40),
    ) {
        for (state, result) in run(context, events) {
            let starts = result
                .effects
                .iter()
                .filter(|e| matches!(e, Effect::StartReply { .. }))
                .count();
            prop_assert!(starts <= 1);
            if starts == 1 {
                prop_assert!(state.is_streaming());
            }
        }
    }

    #[test]
    fn prop_user_turn_precedes_reply_start(
        context in arb_context(),
        events in proptest::collection::vec(arb_event(), 0..40),
    ) {
        for (_, result) in run(context, events) {
            if let Some(start) = result
                .effects
                .iter()
                .position(|e| matches!(e, Effect::StartReply { .. }))
            {
                prop_assert!(start > 0);
                let is_user_turn = matches!(result.effects[start - 1], Effect::AppendUserTurn { .. });
                prop_assert!(is_user_turn);
            }
        }
    }

    #[test]
    fn prop_close_always_reaches_closed(
        context in arb_context(),
        events in proptest::collection::vec(arb_event(), 0..20),
    ) {
        let state = run(context, events)
            .pop()
            .map(|(state, _)| state)
            .unwrap_or_default();
        let result = transition(&state, context, Event::Close).unwrap();
        prop_assert_eq!(result.new_state, SessionState::Closed);
        if let Some(call_id) = state.call_id() {
            let destroys = result.effects.iter().any(
                |e| matches!(e, Effect::DestroyTranscript { call_id: id } if id == call_id),
            );
            prop_assert!(destroys);
        }
    }
}
