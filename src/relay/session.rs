//! Relay session executor
//!
//! Owns the session state, feeds events through [`transition`] and executes
//! the resulting effects. Replies run as spawned tasks and report back on an
//! internal channel, so the session keeps accepting events while a reply is
//! streaming.

use super::{
    stream_reply, transition, Effect, Event, OutboundMessage, ReplyOutcome, SessionContext,
    SessionState, TransitionError,
};
use crate::conversation::{ConversationStore, Turn};
use crate::llm::LlmService;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Longest wait for the next LLM fragment before the reply is failed
pub const DEFAULT_FRAGMENT_TIMEOUT: Duration = Duration::from_secs(30);

const REPLY_CHANNEL_SIZE: usize = 8;

pub struct RelaySession {
    state: SessionState,
    context: SessionContext,
    store: Arc<ConversationStore>,
    llm: Arc<dyn LlmService>,
    outbound: mpsc::Sender<OutboundMessage>,
    reply_tx: mpsc::Sender<Event>,
    reply_rx: mpsc::Receiver<Event>,
    reply_cancel: Option<CancellationToken>,
    fragment_timeout: Duration,
}

impl RelaySession {
    pub fn new(
        store: Arc<ConversationStore>,
        llm: Arc<dyn LlmService>,
        context: SessionContext,
        outbound: mpsc::Sender<OutboundMessage>,
    ) -> Self {
        let (reply_tx, reply_rx) = mpsc::channel(REPLY_CHANNEL_SIZE);
        Self {
            state: SessionState::Unbound,
            context,
            store,
            llm,
            outbound,
            reply_tx,
            reply_rx,
            reply_cancel: None,
            fragment_timeout: DEFAULT_FRAGMENT_TIMEOUT,
        }
    }

    pub fn with_fragment_timeout(mut self, timeout: Duration) -> Self {
        self.fragment_timeout = timeout;
        self
    }

    #[allow(dead_code)] // Used by tests
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Process events until the session closes. A closed `inbound` channel
    /// counts as `Close`.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Event>) {
        tracing::info!("Relay session started");

        loop {
            let event = tokio::select! {
                biased;
                event = inbound.recv() => event.unwrap_or(Event::Close),
                Some(event) = self.reply_rx.recv() => event,
            };
            if let Err(e) = self.process_event(event).await {
                tracing::warn!(error = %e, call_id = ?self.state.call_id(), "Event rejected");
            }
            if self.state.is_closed() {
                break;
            }
        }

        tracing::info!("Relay session stopped");
    }

    /// Apply one event and everything it triggers. On error the state is
    /// unchanged.
    pub async fn process_event(&mut self, event: Event) -> Result<(), TransitionError> {
        let mut events = VecDeque::from([event]);

        while let Some(current_event) = events.pop_front() {
            log_event(&current_event);

            let result = transition(&self.state, self.context, current_event)?;
            self.state = result.new_state;

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await {
                    events.push_back(generated_event);
                }
            }
        }

        Ok(())
    }

    async fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::CreateTranscript { call_id } => {
                match self.store.create(&call_id).await {
                    Ok(()) => {
                        tracing::Span::current().record("call_id", call_id.as_str());
                        tracing::info!(call_id = %call_id, "Call bound");
                        None
                    }
                    Err(e) => {
                        tracing::warn!(call_id = %call_id, error = %e, "Setup refused");
                        Some(Event::SetupRejected { call_id })
                    }
                }
            }

            Effect::DestroyTranscript { call_id } => {
                self.store.destroy(&call_id).await;
                None
            }

            Effect::AppendUserTurn { call_id, text } => {
                if let Err(e) = self.store.append(&call_id, Turn::user(text)).await {
                    tracing::warn!(error = %e, "Failed to record prompt");
                }
                None
            }

            Effect::StartReply { call_id, reply_id } => {
                let transcript = match self.store.get(&call_id).await {
                    Ok(transcript) => transcript,
                    Err(e) => {
                        tracing::warn!(error = %e, "Cannot start reply");
                        return Some(Event::ReplyFinished {
                            reply_id,
                            outcome: ReplyOutcome::Cancelled {
                                emitted: String::new(),
                            },
                        });
                    }
                };

                let cancel = CancellationToken::new();
                self.reply_cancel = Some(cancel.clone());

                let llm = self.llm.clone();
                let outbound = self.outbound.clone();
                let reply_tx = self.reply_tx.clone();
                let timeout = self.fragment_timeout;

                tokio::spawn(
                    async move {
                        let outcome =
                            stream_reply(llm.as_ref(), &transcript, &outbound, &cancel, timeout)
                                .await;
                        // The session may already be gone
                        let _ = reply_tx.send(Event::ReplyFinished { reply_id, outcome }).await;
                    }
                    .instrument(tracing::info_span!("reply", reply_id)),
                );
                None
            }

            Effect::CancelReply => {
                if let Some(token) = self.reply_cancel.take() {
                    tracing::info!("Cancelling reply");
                    token.cancel();
                }
                None
            }

            Effect::CommitAssistantTurn { call_id, text } => {
                if let Err(e) = self.store.append(&call_id, Turn::assistant(text)).await {
                    tracing::warn!(error = %e, "Dropping assistant turn");
                }
                None
            }
        }
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        if let Some(token) = self.reply_cancel.take() {
            token.cancel();
        }
    }
}

fn log_event(event: &Event) {
    match event {
        Event::Setup { call_id } => tracing::info!(call_id = %call_id, "Setup received"),
        Event::Prompt { text } => {
            tracing::info!(chars = text.chars().count(), "Prompt received");
        }
        Event::Interrupt {
            utterance_until_interrupt,
            duration_until_interrupt_ms,
        } => tracing::info!(
            heard = ?utterance_until_interrupt,
            after_ms = ?duration_until_interrupt_ms,
            "Caller interrupted"
        ),
        Event::Unknown { kind } => tracing::warn!(kind = %kind, "Ignoring unknown message type"),
        other => tracing::debug!(event = other.name(), "Session event"),
    }
}
