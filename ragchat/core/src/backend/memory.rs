//! In-Memory Message Store
//!
//! Holds conversation histories in process. Used by tests, by the replay
//! command, and anywhere a network store is not wanted.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::traits::MessageStore;
use crate::error::TurnError;
use crate::messages::{ConversationId, Message, ProjectId};

type HistoryKey = (ProjectId, ConversationId);

/// Message histories keyed by project and conversation
#[derive(Debug, Default)]
pub struct InMemoryStore {
    histories: RwLock<HashMap<HistoryKey, Vec<Message>>>,
    fail_next: RwLock<Option<TurnError>>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a conversation's history
    pub fn insert(&self, project: &ProjectId, conversation: &ConversationId, messages: Vec<Message>) {
        self.histories
            .write()
            .insert((project.clone(), conversation.clone()), messages);
    }

    /// Append one message to a conversation's history
    pub fn append(&self, project: &ProjectId, message: Message) {
        self.histories
            .write()
            .entry((project.clone(), message.conversation_id.clone()))
            .or_default()
            .push(message);
    }

    /// Make the next fetch fail with `error`
    pub fn fail_next(&self, error: TurnError) {
        *self.fail_next.write() = Some(error);
    }

    /// Number of stored conversations
    #[must_use]
    pub fn conversation_count(&self) -> usize {
        self.histories.read().len()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn fetch_messages(
        &self,
        project: &ProjectId,
        conversation: &ConversationId,
    ) -> Result<Vec<Message>, TurnError> {
        if let Some(error) = self.fail_next.write().take() {
            return Err(error);
        }
        Ok(self
            .histories
            .read()
            .get(&(project.clone(), conversation.clone()))
            .cloned()
            .unwrap_or_default())
    }
}
