//! Relay wire protocol
//!
//! One JSON object per WebSocket text frame, discriminated by `type`.

use super::Event;
use crate::segmenter::SentenceUnit;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Malformed inbound frame
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is not a JSON object")]
    NotAnObject,
    #[error("message has no string `type` field")]
    MissingType,
    #[error("{kind} message is missing `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("invalid {kind} message: {source}")]
    InvalidPayload {
        kind: &'static str,
        source: serde_json::Error,
    },
}

/// Messages received from the relay peer
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Setup {
        call_id: String,
    },
    Prompt {
        voice_prompt: String,
    },
    Interrupt {
        utterance_until_interrupt: Option<String>,
        duration_until_interrupt_ms: Option<u64>,
    },
    /// Any other `type`; carried so it can be logged
    Unknown {
        kind: String,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptPayload {
    voice_prompt: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InterruptPayload {
    utterance_until_interrupt: Option<String>,
    duration_until_interrupt_ms: Option<u64>,
}

impl InboundMessage {
    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        let object = value.as_object().ok_or(DecodeError::NotAnObject)?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingType)?;

        match kind {
            "setup" => {
                // The provider sends `callSid`; `callId` is accepted as well.
                let call_id = object
                    .get("callId")
                    .or_else(|| object.get("callSid"))
                    .and_then(Value::as_str)
                    .ok_or(DecodeError::MissingField {
                        kind: "setup",
                        field: "callId` or `callSid",
                    })?;
                Ok(InboundMessage::Setup {
                    call_id: call_id.to_string(),
                })
            }
            "prompt" => {
                let payload: PromptPayload = serde_json::from_value(value.clone())
                    .map_err(|source| DecodeError::InvalidPayload {
                        kind: "prompt",
                        source,
                    })?;
                Ok(InboundMessage::Prompt {
                    voice_prompt: payload.voice_prompt,
                })
            }
            "interrupt" => {
                let payload: InterruptPayload = serde_json::from_value(value.clone())
                    .map_err(|source| DecodeError::InvalidPayload {
                        kind: "interrupt",
                        source,
                    })?;
                Ok(InboundMessage::Interrupt {
                    utterance_until_interrupt: payload.utterance_until_interrupt,
                    duration_until_interrupt_ms: payload.duration_until_interrupt_ms,
                })
            }
            other => Ok(InboundMessage::Unknown {
                kind: other.to_string(),
            }),
        }
    }

    pub fn into_event(self) -> Event {
        match self {
            InboundMessage::Setup { call_id } => Event::Setup { call_id },
            InboundMessage::Prompt { voice_prompt } => Event::Prompt { text: voice_prompt },
            InboundMessage::Interrupt {
                utterance_until_interrupt,
                duration_until_interrupt_ms,
            } => Event::Interrupt {
                utterance_until_interrupt,
                duration_until_interrupt_ms,
            },
            InboundMessage::Unknown { kind } => Event::Unknown { kind },
        }
    }
}

/// Messages sent to the relay peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// One speakable unit
    Text { token: String, last: bool },
}

impl OutboundMessage {
    pub fn text(unit: SentenceUnit) -> Self {
        OutboundMessage::Text {
            token: unit.text,
            last: unit.last,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
