//! Backend Traits
//!
//! Boundaries to the collaborators the turn pipeline depends on but does not
//! implement: the credential source, the turn-submission endpoint and the
//! persisted message store.
//!
//! # Design Philosophy
//!
//! The orchestrator and the panel only see these traits. The HTTP client, the
//! scripted replay backend and the in-memory store are interchangeable, which
//! keeps every state transition testable without a network.

use async_trait::async_trait;

use crate::error::TurnError;
use crate::messages::{ConversationId, Message, ProjectId, TurnRequest};
use crate::streaming::EventReceiver;

/// Source of the bearer credential attached to backend requests
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Produce a bearer token
    async fn bearer_token(&self) -> Result<String, TurnError>;
}

/// A fixed bearer token
#[derive(Clone)]
pub struct StaticCredential {
    token: String,
}

impl StaticCredential {
    /// Wrap a token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Read the token from `RAGCHAT_TOKEN`
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var("RAGCHAT_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
            .map(Self::new)
    }
}

impl std::fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredential")
            .field("token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn bearer_token(&self) -> Result<String, TurnError> {
        if self.token.is_empty() {
            return Err(TurnError::Credential("empty bearer token".to_string()));
        }
        Ok(self.token.clone())
    }
}

/// Turn-submission endpoint
///
/// Implement this trait to feed the orchestrator from a different transport.
#[async_trait]
pub trait TurnBackend: Send + Sync {
    /// Get the backend name (for logging)
    fn name(&self) -> &str;

    /// Submit a turn and open its event stream
    ///
    /// A non-success response must fail here with [`TurnError::Transport`]
    /// carrying the status and the whole body.
    async fn open_turn(
        &self,
        project: &ProjectId,
        request: &TurnRequest,
    ) -> Result<EventReceiver, TurnError>;
}

/// Authoritative message history
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Fetch the ordered history of one conversation
    async fn fetch_messages(
        &self,
        project: &ProjectId,
        conversation: &ConversationId,
    ) -> Result<Vec<Message>, TurnError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_credential() {
        let credential = StaticCredential::new("secret");
        assert_eq!(credential.bearer_token().await.unwrap(), "secret");
        assert!(!format!("{credential:?}").contains("secret"));

        let empty = StaticCredential::new("");
        assert!(matches!(
            empty.bearer_token().await,
            Err(TurnError::Credential(_))
        ));
    }
}
