//! Error Types
//!
//! `TurnError` aborts a turn. `FrameParseError` never does: a frame that fails
//! to decode is skipped and counted, and the stream continues.

use thiserror::Error;

/// Errors that end a turn
#[derive(Debug, Clone, Error)]
pub enum TurnError {
    /// The backend answered with a non-success status
    #[error("Stream error {status}: {body}")]
    Transport {
        /// HTTP status code
        status: u16,
        /// Full response body, kept as diagnostic text
        body: String,
    },

    /// Connection or read failure
    #[error("Network error: {0}")]
    Network(String),

    /// The response carried no readable body
    #[error("No response body")]
    MissingBody,

    /// A single line grew past the configured limit
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Bytes buffered without a line break
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// A turn is already in flight on this panel
    #[error("A turn is already in progress")]
    Busy,

    /// The credential provider could not produce a token
    #[error("Credential error: {0}")]
    Credential(String),

    /// A non-streaming response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl TurnError {
    /// Whether this is a failure of the transport rather than of the caller
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Network(_) | Self::MissingBody
        )
    }

    /// Best human-readable reason for a transport failure
    ///
    /// JSON error bodies usually carry a `detail` or `message` field; anything
    /// else is returned verbatim.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Transport { body, .. } => serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|json| {
                    json.get("detail")
                        .or_else(|| json.get("message"))
                        .and_then(serde_json::Value::as_str)
                        .map(String::from)
                })
                .unwrap_or_else(|| body.clone()),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for TurnError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// A frame payload that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unparseable frame: {reason}")]
pub struct FrameParseError {
    /// Decoder message
    pub reason: String,
    /// The payload, truncated for logging
    pub payload: String,
}

impl FrameParseError {
    const PAYLOAD_PREVIEW: usize = 120;

    pub(crate) fn new(reason: impl Into<String>, payload: &str) -> Self {
        let payload = payload.chars().take(Self::PAYLOAD_PREVIEW).collect();
        Self {
            reason: reason.into(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display_carries_status_and_body() {
        let err = TurnError::Transport {
            status: 404,
            body: "Project not found".to_string(),
        };
        assert_eq!(err.to_string(), "Stream error 404: Project not found");
        assert!(err.is_transport());
        assert!(!TurnError::Busy.is_transport());
    }

    #[test]
    fn test_detail_prefers_json_fields() {
        let err = TurnError::Transport {
            status: 422,
            body: r#"{"detail":"LLM generation failed"}"#.to_string(),
        };
        assert_eq!(err.detail(), "LLM generation failed");

        let err = TurnError::Transport {
            status: 500,
            body: r#"{"message":"boom"}"#.to_string(),
        };
        assert_eq!(err.detail(), "boom");

        let err = TurnError::Transport {
            status: 502,
            body: "<html>Bad Gateway</html>".to_string(),
        };
        assert_eq!(err.detail(), "<html>Bad Gateway</html>");
    }

    #[test]
    fn test_frame_parse_error_truncates_payload() {
        let long = "x".repeat(500);
        let err = FrameParseError::new("expected value", &long);
        assert_eq!(err.payload.len(), 120);
    }
}
