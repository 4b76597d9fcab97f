//! LLM provider abstraction
//!
//! A provider turns a transcript into a lazy stream of text fragments. The
//! fragments arrive in generation order and carry no meaning at their
//! boundaries (they may split words).

mod error;
mod openai;
mod sse;
mod types;

#[cfg(test)]
mod proptests;

#[allow(unused_imports)] // Public API re-exports
pub use error::{LlmError, LlmErrorKind};
pub use openai::{OpenAIConfig, OpenAIService, DEFAULT_BASE_URL};
pub use types::*;

use crate::conversation::Turn;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Single-pass stream of reply fragments; ends early with an error if the
/// upstream fails
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

/// Common interface for streaming completion providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Start a completion. Fails if the request is rejected before any
    /// fragment is produced.
    async fn stream(&self, request: &LlmRequest) -> Result<TextStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Stream a reply to the full transcript.
pub async fn stream_transcript(
    service: &dyn LlmService,
    transcript: &[Turn],
) -> Result<TextStream, LlmError> {
    service.stream(&LlmRequest::from_transcript(transcript)).await
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn stream(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        let start = Instant::now();
        let result = self.inner.stream(request).await;

        let stream = match result {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "LLM request failed"
                );
                return Err(e);
            }
        };

        tracing::debug!(
            model = %self.model_id,
            messages = request.messages.len(),
            connect_ms = %start.elapsed().as_millis(),
            "LLM stream opened"
        );

        let stats = StreamStats {
            model_id: self.model_id.clone(),
            start,
            first_fragment: None,
            fragments: 0,
            chars: 0,
            failed: false,
        };
        let logged = futures::stream::unfold((stream, stats), |(mut stream, mut stats)| async move {
            match stream.next().await {
                Some(Ok(fragment)) => {
                    stats.record(&fragment);
                    Some((Ok(fragment), (stream, stats)))
                }
                Some(Err(e)) => {
                    stats.log_failure(&e);
                    Some((Err(e), (stream, stats)))
                }
                None => {
                    if !stats.failed {
                        stats.log_completion();
                    }
                    None
                }
            }
        });
        Ok(logged.boxed())
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

struct StreamStats {
    model_id: String,
    start: Instant,
    first_fragment: Option<Duration>,
    fragments: usize,
    chars: usize,
    failed: bool,
}

impl StreamStats {
    fn record(&mut self, fragment: &str) {
        if self.first_fragment.is_none() {
            self.first_fragment = Some(self.start.elapsed());
        }
        self.fragments += 1;
        self.chars += fragment.chars().count();
    }

    fn log_completion(&self) {
        tracing::info!(
            model = %self.model_id,
            duration_ms = %self.start.elapsed().as_millis(),
            first_fragment_ms = ?self.first_fragment.map(|d| d.as_millis()),
            fragments = self.fragments,
            chars = self.chars,
            "LLM stream completed"
        );
    }

    fn log_failure(&mut self, e: &LlmError) {
        self.failed = true;
        tracing::error!(
            model = %self.model_id,
            duration_ms = %self.start.elapsed().as_millis(),
            fragments = self.fragments,
            error = %e.message,
            retryable = e.kind.is_retryable(),
            "LLM stream failed"
        );
    }
}
