//! Scripted LLM and helpers for relay tests
//!
//! Each call to `stream` consumes the next queued script.

use super::OutboundMessage;
use crate::llm::{LlmError, LlmRequest, LlmService, TextStream};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

enum Script {
    /// Yield every fragment, then end normally
    Fragments(Vec<String>),
    /// Yield the fragments, then fail mid-stream
    Failing(Vec<String>, LlmError),
    /// Yield the fragments, then never produce another item
    Stalling(Vec<String>),
    /// Refuse the request before streaming
    Rejection(LlmError),
}

fn owned<S: Into<String>>(fragments: impl IntoIterator<Item = S>) -> Vec<String> {
    fragments.into_iter().map(Into::into).collect()
}

fn ok_items(fragments: Vec<String>) -> impl futures::Stream<Item = Result<String, LlmError>> {
    stream::iter(fragments.into_iter().map(Ok))
}

pub struct ScriptedLlm {
    scripts: Mutex<VecDeque<Script>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_fragments<S: Into<String>>(&self, fragments: impl IntoIterator<Item = S>) {
        self.push(Script::Fragments(owned(fragments)));
    }

    pub fn queue_failing<S: Into<String>>(
        &self,
        fragments: impl IntoIterator<Item = S>,
        error: LlmError,
    ) {
        self.push(Script::Failing(owned(fragments), error));
    }

    pub fn queue_stalling<S: Into<String>>(&self, fragments: impl IntoIterator<Item = S>) {
        self.push(Script::Stalling(owned(fragments)));
    }

    pub fn queue_rejection(&self, error: LlmError) {
        self.push(Script::Rejection(error));
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn push(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmService for ScriptedLlm {
    async fn stream(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self.scripts.lock().unwrap().pop_front();

        match script {
            Some(Script::Fragments(fragments)) => Ok(ok_items(fragments).boxed()),
            Some(Script::Failing(fragments, error)) => Ok(ok_items(fragments)
                .chain(stream::once(async move { Err(error) }))
                .boxed()),
            Some(Script::Stalling(fragments)) => {
                Ok(ok_items(fragments).chain(stream::pending()).boxed())
            }
            Some(Script::Rejection(error)) => Err(error),
            None => Err(LlmError::network("No scripted reply queued")),
        }
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

/// Tokens from every message queued so far
pub fn take_tokens(rx: &mut mpsc::Receiver<OutboundMessage>) -> Vec<String> {
    let mut tokens = Vec::new();
    while let Ok(OutboundMessage::Text { token, .. }) = rx.try_recv() {
        tokens.push(token);
    }
    tokens
}

/// Tokens from every message until all senders are dropped
pub async fn drain_tokens(rx: &mut mpsc::Receiver<OutboundMessage>) -> Vec<String> {
    let mut tokens = Vec::new();
    while let Some(OutboundMessage::Text { token, .. }) = rx.recv().await {
        tokens.push(token);
    }
    tokens
}
