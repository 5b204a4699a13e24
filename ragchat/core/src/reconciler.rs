//! Conversation Reconciler
//!
//! Merges the authoritative history of one conversation with the messages the
//! user submitted locally but the store has not confirmed yet, and decides
//! what a view of the conversation shows while a turn is running.
//!
//! # Rendering Rules
//!
//! ```text
//! authoritative ++ optimistic            every message, with its sources
//! + Thinking                             while the turn is Sending
//! + TransientAssistant(accumulator)      accumulator non-empty AND
//!                                        (Streaming OR last message is not
//!                                         from the assistant)
//! ```
//!
//! The transient bubble stays visible after the turn ends until a refetch
//! brings in the persisted assistant message that replaces it.

use std::collections::HashSet;

use crate::citations::{aggregate_citations, SourceDocument};
use crate::messages::{ConversationId, Message, MessageRole, ProjectId, TurnState};
use crate::orchestrator::TurnSnapshot;

/// One entry of a rendered conversation
#[derive(Clone, Debug, PartialEq)]
pub enum RenderedEntry {
    /// A listed message and the documents it cites
    Message {
        /// The message
        message: Message,
        /// Aggregated source documents
        sources: Vec<SourceDocument>,
    },
    /// Placeholder while waiting for the first stream item
    Thinking,
    /// The answer being streamed
    TransientAssistant {
        /// Accumulated text
        content: String,
        /// Sources of the current turn
        sources: Vec<SourceDocument>,
    },
}

/// Authoritative and optimistic messages of one conversation
#[derive(Clone, Debug)]
pub struct ConversationReconciler {
    project: ProjectId,
    conversation: Option<ConversationId>,
    authoritative: Vec<Message>,
    optimistic: Vec<Message>,
}

impl ConversationReconciler {
    /// Start with an empty view of a conversation (None = not created yet)
    #[must_use]
    pub fn new(project: ProjectId, conversation: Option<ConversationId>) -> Self {
        Self {
            project,
            conversation,
            authoritative: Vec::new(),
            optimistic: Vec::new(),
        }
    }

    /// Project of the current key
    #[must_use]
    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    /// Conversation of the current key
    #[must_use]
    pub fn conversation(&self) -> Option<&ConversationId> {
        self.conversation.as_ref()
    }

    /// Show another conversation, dropping everything held for the old one
    pub fn switch_conversation(&mut self, conversation: Option<ConversationId>) {
        if self.conversation == conversation {
            return;
        }
        self.conversation = conversation;
        self.authoritative.clear();
        self.optimistic.clear();
    }

    /// Bind the view to the id the server assigned to a new conversation
    ///
    /// Returns true if the key changed.
    pub fn adopt_conversation(&mut self, conversation: &ConversationId) -> bool {
        if self.conversation.as_ref() == Some(conversation) {
            return false;
        }
        self.conversation = Some(conversation.clone());
        for message in &mut self.optimistic {
            if message.conversation_id.is_unassigned() {
                message.conversation_id = conversation.clone();
            }
        }
        true
    }

    /// Authoritative messages followed by optimistic ones
    #[must_use]
    pub fn messages(&self) -> Vec<&Message> {
        self.authoritative.iter().chain(&self.optimistic).collect()
    }

    /// Number of messages not yet confirmed by the store
    #[must_use]
    pub fn optimistic_count(&self) -> usize {
        self.optimistic.len()
    }

    /// Record a user submission before the store has seen it
    pub fn push_optimistic(&mut self, text: impl Into<String>) -> &Message {
        let conversation = self.conversation.clone().unwrap_or_default();
        self.optimistic
            .push(Message::optimistic_user(text, conversation));
        &self.optimistic[self.optimistic.len() - 1]
    }

    /// Forget all optimistic messages
    pub fn clear_optimistic(&mut self) {
        self.optimistic.clear();
    }

    /// Replace the authoritative list with a fresh fetch
    ///
    /// An optimistic message whose text arrives as a new user message in the
    /// fetch is dropped, so a late refetch never shows it twice.
    pub fn replace_authoritative(&mut self, messages: Vec<Message>) {
        let known: HashSet<&str> = self
            .authoritative
            .iter()
            .map(|message| message.id.as_str())
            .collect();
        let mut arrived: Vec<&str> = messages
            .iter()
            .filter(|message| {
                message.role == MessageRole::User && !known.contains(message.id.as_str())
            })
            .map(|message| message.content.as_str())
            .collect();

        let before = self.optimistic.len();
        self.optimistic.retain(|pending| {
            match arrived.iter().position(|content| *content == pending.content) {
                Some(index) => {
                    arrived.swap_remove(index);
                    false
                }
                None => true,
            }
        });
        let confirmed = before - self.optimistic.len();
        if confirmed > 0 {
            tracing::debug!(confirmed, "Optimistic messages confirmed by refetch");
        }

        self.authoritative = messages;
    }

    /// Entries to display for the current turn snapshot
    #[must_use]
    pub fn render(&self, snapshot: &TurnSnapshot) -> Vec<RenderedEntry> {
        let mut entries: Vec<RenderedEntry> = self
            .messages()
            .into_iter()
            .map(|message| RenderedEntry::Message {
                message: message.clone(),
                sources: aggregate_citations(message.citations()),
            })
            .collect();

        if snapshot.state == TurnState::Sending {
            entries.push(RenderedEntry::Thinking);
        }

        let last_is_assistant = self
            .messages()
            .last()
            .is_some_and(|message| message.role == MessageRole::Assistant);
        if !snapshot.accumulated_text.is_empty()
            && (snapshot.state == TurnState::Streaming || !last_is_assistant)
        {
            entries.push(RenderedEntry::TransientAssistant {
                content: snapshot.accumulated_text.clone(),
                sources: aggregate_citations(&snapshot.citations),
            });
        }

        entries
    }
}
