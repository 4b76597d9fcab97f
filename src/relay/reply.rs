//! Reply pipeline: LLM fragments → sentence units → outbound messages
//!
//! Each unit is sent as soon as the segmenter closes it, so the caller hears
//! the first sentence while the rest is still being generated.

use super::OutboundMessage;
use crate::conversation::Turn;
use crate::llm::{stream_transcript, LlmError, LlmService};
use crate::segmenter::{SentenceSegmenter, SentenceUnit};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// How a reply ended
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    /// Stream ended normally; `text` is everything emitted, final flush included
    Completed { text: String },
    /// Upstream failed; units completed before the failure were emitted
    Failed { emitted: String, error: LlmError },
    /// Cancelled, or the connection went away
    Cancelled { emitted: String },
}

/// Stream a reply to `transcript`, sending every sentence unit to `outbound`
/// in generation order.
///
/// `fragment_timeout` bounds the wait for each fragment; a stalled upstream
/// is treated as a failed stream.
pub async fn stream_reply(
    llm: &dyn LlmService,
    transcript: &[Turn],
    outbound: &mpsc::Sender<OutboundMessage>,
    cancel: &CancellationToken,
    fragment_timeout: Duration,
) -> ReplyOutcome {
    let mut emitter = Emitter::new(outbound, cancel);

    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => return emitter.cancelled(),
        result = stream_transcript(llm, transcript) => result,
    };
    let mut fragments = match opened {
        Ok(stream) => stream,
        Err(error) => return emitter.failed(error),
    };

    let mut segmenter = SentenceSegmenter::new();
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return emitter.cancelled(),
            next = tokio::time::timeout(fragment_timeout, fragments.next()) => next,
        };

        let fragment = match next {
            Ok(Some(Ok(fragment))) => fragment,
            Ok(Some(Err(error))) => return emitter.failed(error),
            Ok(None) => break,
            Err(_) => {
                let error = LlmError::stream(format!(
                    "No fragment received for {}ms",
                    fragment_timeout.as_millis()
                ));
                return emitter.failed(error);
            }
        };

        for unit in segmenter.feed(&fragment) {
            if !emitter.emit(unit).await {
                return emitter.cancelled();
            }
        }
    }

    if let Some(unit) = segmenter.finish() {
        if !emitter.emit(unit).await {
            return emitter.cancelled();
        }
    }
    emitter.completed()
}

/// Sends units and keeps what was sent
struct Emitter<'a> {
    outbound: &'a mpsc::Sender<OutboundMessage>,
    cancel: &'a CancellationToken,
    emitted: String,
    units: usize,
    start: Instant,
}

impl<'a> Emitter<'a> {
    fn new(outbound: &'a mpsc::Sender<OutboundMessage>, cancel: &'a CancellationToken) -> Self {
        Self {
            outbound,
            cancel,
            emitted: String::new(),
            units: 0,
            start: Instant::now(),
        }
    }

    /// Returns false if the unit could not be delivered.
    async fn emit(&mut self, unit: SentenceUnit) -> bool {
        let text = unit.as_str().to_string();
        let sent = tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            result = self.outbound.send(OutboundMessage::text(unit)) => result.is_ok(),
        };
        if !sent {
            return false;
        }

        if self.units == 0 {
            tracing::info!(
                first_sentence_ms = %self.start.elapsed().as_millis(),
                "First sentence sent"
            );
        }
        tracing::debug!(unit = self.units, chars = text.chars().count(), "Sentence sent");
        self.units += 1;
        self.emitted.push_str(&text);
        true
    }

    fn completed(self) -> ReplyOutcome {
        tracing::info!(
            units = self.units,
            duration_ms = %self.start.elapsed().as_millis(),
            "Reply completed"
        );
        ReplyOutcome::Completed { text: self.emitted }
    }

    fn failed(self, error: LlmError) -> ReplyOutcome {
        tracing::warn!(
            units = self.units,
            error = %error,
            kind = ?error.kind,
            "Reply terminated by upstream failure"
        );
        ReplyOutcome::Failed {
            emitted: self.emitted,
            error,
        }
    }

    fn cancelled(self) -> ReplyOutcome {
        tracing::info!(units = self.units, "Reply cancelled");
        ReplyOutcome::Cancelled {
            emitted: self.emitted,
        }
    }
}
