//! `OpenAI`-compatible streaming chat completions

use super::sse::{SseDecoder, SseEvent};
use super::types::LlmRequest;
use super::{LlmError, LlmService, TextStream};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for the chat completions endpoint
#[derive(Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: String,
    /// API root, e.g. `https://api.openai.com/v1` or a compatible gateway
    pub base_url: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl std::fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// OpenAI-compatible service implementation
pub struct OpenAIService {
    client: Client,
    api_key: String,
    url: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

impl OpenAIService {
    pub fn new(config: OpenAIConfig) -> Result<Self, LlmError> {
        // No overall timeout: a reply legitimately streams for a long time.
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key,
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn translate_request(&self, request: &LlmRequest) -> OpenAIRequest {
        OpenAIRequest {
            model: self.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: true,
        }
    }
}

#[async_trait]
impl LlmService for OpenAIService {
    async fn stream(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        let body = self.translate_request(request);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| LlmError::network(format!("Failed to read error body: {e}")))?;
            let message = serde_json::from_str::<OpenAIErrorResponse>(&body)
                .map(|r| r.error.message)
                .unwrap_or(body);
            return Err(LlmError::from_status(status.as_u16(), &message));
        }

        Ok(fragment_stream(response.bytes_stream()))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// Turn an SSE byte stream of chat completion chunks into text fragments.
///
/// The stream is lazy: bytes are only pulled when the consumer asks for the
/// next fragment. It ends cleanly at `[DONE]` (or at EOF after a
/// `finish_reason`), and ends with an error when the body breaks off, when
/// the provider reports an in-band error, or when EOF arrives mid-reply.
pub(crate) fn fragment_stream<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = FragmentState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        completed: false,
        exhausted: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.exhausted {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for event in state.decoder.push(chunk.as_ref()) {
                        state.handle_event(&event);
                    }
                }
                Some(Err(e)) if state.completed => {
                    tracing::debug!(error = %e, "Body broke off after the reply finished");
                    state.exhausted = true;
                }
                Some(Err(e)) => {
                    state.fail(LlmError::stream(format!("Stream interrupted: {e}")));
                }
                None => {
                    if let Some(event) = state.decoder.finish() {
                        state.handle_event(&event);
                    }
                    if !state.completed && !state.exhausted {
                        state.fail(LlmError::stream("Stream ended before completion"));
                    }
                    state.exhausted = true;
                }
            }
        }
    })
    .boxed()
}

struct FragmentState<S> {
    bytes: std::pin::Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    /// `finish_reason` or `[DONE]` seen
    completed: bool,
    /// Nothing more will be read
    exhausted: bool,
}

impl<S> FragmentState<S> {
    fn handle_event(&mut self, event: &SseEvent) {
        if self.exhausted {
            return;
        }
        if event.data == "[DONE]" {
            self.completed = true;
            self.exhausted = true;
            return;
        }

        let chunk: OpenAIStreamChunk = match serde_json::from_str(&event.data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, data = %event.data, "Skipping unparsable stream chunk");
                return;
            }
        };

        if let Some(error) = chunk.error {
            self.fail(LlmError::server_error(format!(
                "Provider error mid-stream: {}",
                error.message
            )));
            return;
        }

        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    self.pending.push_back(Ok(content));
                }
            }
            if choice.finish_reason.is_some() {
                self.completed = true;
            }
        }
    }

    fn fail(&mut self, error: LlmError) {
        self.pending.push_back(Err(error));
        self.exhausted = true;
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    #[serde(default)]
    error: Option<OpenAIError>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}
