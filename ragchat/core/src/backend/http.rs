//! HTTP Backend Implementation
//!
//! Client for the retrieval-augmented chat server.
//!
//! # Chat API
//!
//! All routes live under `{base_url}{api_prefix}/projects/{project}/chat`:
//! - `POST /messages/stream` - Submit a turn and stream the answer
//! - `POST /messages` - Submit a turn and wait for the whole answer
//! - `GET /conversations` - List conversations
//! - `GET /conversations/{id}/messages` - Fetch a conversation's history
//! - `DELETE /conversations/{id}` - Delete a conversation
//!
//! The streaming route answers with `data: <json>` lines; decoding happens in
//! the pump task, see [`crate::streaming`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;

use super::traits::{CredentialProvider, MessageStore, StaticCredential, TurnBackend};
use crate::config::ChatConfig;
use crate::error::TurnError;
use crate::messages::{AnswerResponse, Conversation, ConversationId, Message, ProjectId, TurnRequest};
use crate::streaming::{spawn_event_pump, EventReceiver, StreamConfig};

/// Chat server client
#[derive(Clone)]
pub struct HttpBackend {
    /// Server origin
    base_url: String,
    /// Path prefix of the versioned API
    api_prefix: String,
    /// Bearer token source
    credentials: Arc<dyn CredentialProvider>,
    /// Pump settings for streamed turns
    stream_config: StreamConfig,
    /// Timeout for requests that are not streamed
    request_timeout: Duration,
    /// Page size for history fetches
    page_size: u32,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend for a server origin
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Network`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, TurnError> {
        let mut config = ChatConfig::default();
        config.base_url = base_url.into();
        Self::with_credentials(&config, credentials)
    }

    /// Create from a loaded configuration, using its token
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Credential`] if the configuration has no token.
    pub fn from_config(config: &ChatConfig) -> Result<Self, TurnError> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| TurnError::Credential("no bearer token configured".to_string()))?;
        Self::with_credentials(config, Arc::new(StaticCredential::new(token)))
    }

    /// Create from a loaded configuration and an external credential source
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Network`] if the HTTP client cannot be built.
    pub fn with_credentials(
        config: &ChatConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, TurnError> {
        // Streamed turns have no overall timeout, only a connect timeout.
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TurnError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_prefix: config.api_prefix.trim_end_matches('/').to_string(),
            credentials,
            stream_config: config.stream_config(),
            request_timeout: config.request_timeout,
            page_size: config.history_page_size,
            http_client,
        })
    }

    /// Chat root for a project
    fn chat_url(&self, project: &ProjectId) -> String {
        format!(
            "{}{}/projects/{}/chat",
            self.base_url, self.api_prefix, project
        )
    }

    /// Streaming turn endpoint URL
    fn stream_url(&self, project: &ProjectId) -> String {
        format!("{}/messages/stream", self.chat_url(project))
    }

    /// Non-streaming turn endpoint URL
    fn send_url(&self, project: &ProjectId) -> String {
        format!("{}/messages", self.chat_url(project))
    }

    /// Conversation list endpoint URL
    fn conversations_url(&self, project: &ProjectId) -> String {
        format!("{}/conversations", self.chat_url(project))
    }

    /// Single conversation endpoint URL
    fn conversation_url(&self, project: &ProjectId, conversation: &ConversationId) -> String {
        format!("{}/{}", self.conversations_url(project), conversation)
    }

    /// Conversation history endpoint URL
    fn messages_url(&self, project: &ProjectId, conversation: &ConversationId) -> String {
        format!("{}/messages", self.conversation_url(project, conversation))
    }

    /// Turn a non-success response into a transport error
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TurnError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(TurnError::Transport { status, body })
    }

    /// Decode a JSON body from a successful response
    async fn json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TurnError> {
        let response = Self::check(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| TurnError::Decode(e.to_string()))
    }

    /// List the conversations of a project, newest first
    ///
    /// # Errors
    ///
    /// Returns [`TurnError`] on transport or decode failure.
    pub async fn list_conversations(
        &self,
        project: &ProjectId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Conversation>, TurnError> {
        let token = self.credentials.bearer_token().await?;
        let response = self
            .http_client
            .get(self.conversations_url(project))
            .bearer_auth(token)
            .query(&[("limit", limit), ("offset", offset)])
            .timeout(self.request_timeout)
            .send()
            .await?;
        Self::json(response).await
    }

    /// Fetch one page of a conversation's history
    ///
    /// # Errors
    ///
    /// Returns [`TurnError`] on transport or decode failure.
    pub async fn list_messages(
        &self,
        project: &ProjectId,
        conversation: &ConversationId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Message>, TurnError> {
        let token = self.credentials.bearer_token().await?;
        let response = self
            .http_client
            .get(self.messages_url(project, conversation))
            .bearer_auth(token)
            .query(&[("limit", limit), ("offset", offset)])
            .timeout(self.request_timeout)
            .send()
            .await?;
        Self::json(response).await
    }

    /// Delete a conversation and its messages
    ///
    /// # Errors
    ///
    /// Returns [`TurnError`] on transport failure.
    pub async fn delete_conversation(
        &self,
        project: &ProjectId,
        conversation: &ConversationId,
    ) -> Result<(), TurnError> {
        let token = self.credentials.bearer_token().await?;
        let response = self
            .http_client
            .delete(self.conversation_url(project, conversation))
            .bearer_auth(token)
            .timeout(self.request_timeout)
            .send()
            .await?;
        Self::check(response).await?;
        tracing::info!(%project, %conversation, "Deleted conversation");
        Ok(())
    }

    /// Submit a turn without streaming and wait for the whole answer
    ///
    /// # Errors
    ///
    /// Returns [`TurnError`] on transport or decode failure.
    pub async fn send_message(
        &self,
        project: &ProjectId,
        request: &TurnRequest,
    ) -> Result<AnswerResponse, TurnError> {
        let token = self.credentials.bearer_token().await?;
        let response = self
            .http_client
            .post(self.send_url(project))
            .bearer_auth(token)
            .json(request)
            .timeout(self.request_timeout)
            .send()
            .await?;
        Self::json(response).await
    }
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url)
            .field("api_prefix", &self.api_prefix)
            .field("stream_config", &self.stream_config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TurnBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn open_turn(
        &self,
        project: &ProjectId,
        request: &TurnRequest,
    ) -> Result<EventReceiver, TurnError> {
        let token = self.credentials.bearer_token().await?;
        let url = self.stream_url(project);

        tracing::debug!(%url, new_conversation = request.start_new_conversation, "Opening turn stream");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .header(ACCEPT, "text/event-stream")
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        let response = Self::check(response).await?;
        if response.content_length() == Some(0) {
            return Err(TurnError::MissingBody);
        }

        Ok(spawn_event_pump(
            response.bytes_stream(),
            &self.stream_config,
        ))
    }
}

#[async_trait]
impl MessageStore for HttpBackend {
    async fn fetch_messages(
        &self,
        project: &ProjectId,
        conversation: &ConversationId,
    ) -> Result<Vec<Message>, TurnError> {
        self.list_messages(project, conversation, self.page_size, 0)
            .await
    }
}
