//! Stream Events
//!
//! Typed events produced from the payloads of the turn stream. This is the
//! only place that inspects payload fields: downstream code matches on
//! [`StreamEvent`] and never looks at JSON again.
//!
//! # Payload Shapes
//!
//! | Payload | Event |
//! |---|---|
//! | `{"token": "..."}` | [`StreamEvent::Token`] |
//! | `{"done": true, "conversation_id": "...", "chunks": [...]}` | [`StreamEvent::Completed`] |
//! | anything else that is valid JSON | dropped |
//! | invalid JSON | [`FrameParseError`] (skipped by the caller) |

use serde::Deserialize;

use crate::error::FrameParseError;
use crate::messages::{Citation, ConversationId};

/// Events produced by the turn stream
#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// A fragment of the answer
    Token {
        /// Text to append to the accumulator
        fragment: String,
    },

    /// The answer is complete
    Completed {
        /// Conversation the turn was recorded in, when the server reports one
        conversation_id: Option<ConversationId>,
        /// Evidence the answer was built from, in retrieval order
        citations: Vec<Citation>,
    },
}

impl StreamEvent {
    /// Short name for logging
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::Completed { .. } => "completed",
        }
    }
}

/// Wire shape shared by both payload kinds
#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default, alias = "conversationId")]
    conversation_id: Option<String>,
    #[serde(default)]
    chunks: Vec<Citation>,
}

/// Interpret one decoded payload
///
/// # Errors
///
/// Returns [`FrameParseError`] when the payload is not valid JSON or a known
/// field carries the wrong type. Callers skip such frames.
pub fn interpret(payload: &str) -> Result<Option<StreamEvent>, FrameParseError> {
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| FrameParseError::new(e.to_string(), payload))?;

    if !value.is_object() {
        return Ok(None);
    }

    let raw: RawPayload =
        serde_json::from_value(value).map_err(|e| FrameParseError::new(e.to_string(), payload))?;

    if raw.done == Some(true) {
        let conversation_id = raw
            .conversation_id
            .filter(|id| !id.is_empty())
            .map(ConversationId);
        return Ok(Some(StreamEvent::Completed {
            conversation_id,
            citations: raw.chunks,
        }));
    }

    Ok(raw
        .token
        .map(|fragment| StreamEvent::Token { fragment }))
}
