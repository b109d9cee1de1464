//! Classification of decoded lines into typed stream events.

use serde::Deserialize;
use tracing::{debug, warn};

/// Fixed prefix marking event-bearing lines on the wire. Lines without it
/// are ignored.
pub const EVENT_PREFIX: &str = "data:";

/// A classified event from the response stream.
///
/// At most one `IdAssigned` occurs per stream; any number of `TextDelta`;
/// at most one terminal event (`Completed` or `Failed`) ends processing.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The server confirmed the provisional user-message id.
    IdAssigned { confirmed_id: i64 },
    /// A text fragment to append to the in-progress assistant message.
    TextDelta { chunk: String },
    /// Normal stream completion with optional token counts.
    Completed {
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    /// Backend-reported failure; aborts the stream.
    Failed { reason: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Recognized wire payload shapes. Variant order matters for untagged
/// deserialization; each shape is distinguished by a required field.
#[derive(Deserialize)]
#[serde(untagged)]
enum WirePayload {
    IdAssigned {
        #[serde(rename = "userMessageId")]
        user_message_id: i64,
    },
    Delta {
        chunk: String,
    },
    Done {
        done: bool,
        #[serde(rename = "promptTokens")]
        prompt_tokens: Option<u32>,
        #[serde(rename = "completionTokens")]
        completion_tokens: Option<u32>,
    },
    Failed {
        error: String,
    },
}

/// Classify one decoded line.
///
/// Returns `None` for non-event lines, malformed payloads (logged and
/// skipped) and unrecognized-but-parseable payloads; none of these abort
/// the stream.
pub fn classify(line: &str) -> Option<StreamEvent> {
    let payload = line.strip_prefix(EVENT_PREFIX)?.trim_start();
    if payload.is_empty() {
        return None;
    }

    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            warn!(%err, line = payload, "skipping malformed stream payload");
            return None;
        }
    };

    match serde_json::from_value::<WirePayload>(value) {
        Ok(WirePayload::IdAssigned { user_message_id }) => Some(StreamEvent::IdAssigned {
            confirmed_id: user_message_id,
        }),
        Ok(WirePayload::Delta { chunk }) => Some(StreamEvent::TextDelta { chunk }),
        Ok(WirePayload::Done {
            done: true,
            prompt_tokens,
            completion_tokens,
        }) => Some(StreamEvent::Completed {
            prompt_tokens,
            completion_tokens,
        }),
        Ok(WirePayload::Done { done: false, .. }) => {
            debug!(line = payload, "ignoring non-final done payload");
            None
        }
        Ok(WirePayload::Failed { error }) => Some(StreamEvent::Failed { reason: error }),
        Err(_) => {
            debug!(line = payload, "ignoring unrecognized stream payload");
            None
        }
    }
}
