//! HTTP API: call-answer markup, the relay WebSocket and health

mod handlers;
mod twiml;
mod types;
mod ws;

pub use handlers::create_router;

use crate::config::{RelayConfig, VoiceConfig};
use crate::conversation::ConversationStore;
use crate::llm::LlmService;
use crate::relay::SessionContext;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConversationStore>,
    pub llm: Arc<dyn LlmService>,
    pub voice: Arc<VoiceConfig>,
    pub session: SessionContext,
    pub fragment_timeout: Duration,
}

impl AppState {
    pub fn new(config: &RelayConfig, llm: Arc<dyn LlmService>) -> Self {
        let store = ConversationStore::new(
            config.system_prompt.clone(),
            config.session.duplicate_setup_policy,
        );
        Self {
            store: Arc::new(store),
            llm,
            voice: Arc::new(config.voice.clone()),
            session: config.session,
            fragment_timeout: config.fragment_timeout,
        }
    }
}
