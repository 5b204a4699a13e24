//! Chat Panel
//!
//! One conversation view: wires a [`TurnOrchestrator`] to a
//! [`ConversationReconciler`] and the message store, and reports what
//! happened to the UI over a channel.
//!
//! # Message Flow
//!
//! ```text
//! UI ──submit(text)──▶ ChatPanel ──▶ TurnOrchestrator ──▶ TurnBackend
//!  ▲                     │   ▲              │
//!  │   PanelEvent        │   └─ adoption ───┘
//!  └─────────────────────┤
//!                        └──▶ MessageStore (refetch after the turn)
//! ```
//!
//! Tokens are not sent as events; the UI watches [`ChatPanel::subscribe`] and
//! calls [`ChatPanel::render`] for each snapshot.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;

use crate::backend::{MessageStore, TurnBackend};
use crate::error::TurnError;
use crate::messages::{ConversationId, Message, NotifyLevel, ProjectId, TurnRequest};
use crate::orchestrator::{TurnOrchestrator, TurnOutcome, TurnSnapshot};
use crate::reconciler::{ConversationReconciler, RenderedEntry};

/// Events from the panel to the UI
#[derive(Clone, Debug, PartialEq)]
pub enum PanelEvent {
    /// The server created a conversation for the first turn of this panel
    ConversationAdopted {
        /// The new conversation id
        conversation_id: ConversationId,
    },
    /// A turn ran to the end of its stream
    TurnFinished {
        /// Conversation the turn was recorded in
        conversation_id: Option<ConversationId>,
        /// Frames that failed to decode
        skipped_frames: usize,
    },
    /// The authoritative history was reloaded
    HistoryRefreshed {
        /// Conversation that was reloaded
        conversation_id: ConversationId,
        /// Number of persisted messages
        messages: usize,
    },
    /// Show a notification
    Notify {
        /// Severity
        level: NotifyLevel,
        /// Notification text
        message: String,
    },
}

/// A conversation view bound to one project
pub struct ChatPanel<B: ?Sized> {
    backend: Arc<B>,
    orchestrator: TurnOrchestrator<B>,
    view: Mutex<ConversationReconciler>,
    events: mpsc::Sender<PanelEvent>,
}

impl<B> ChatPanel<B>
where
    B: TurnBackend + MessageStore + ?Sized,
{
    /// Create a panel showing `conversation` (None = a conversation not yet created)
    pub fn new(
        backend: Arc<B>,
        project: ProjectId,
        conversation: Option<ConversationId>,
        events: mpsc::Sender<PanelEvent>,
    ) -> Self {
        Self {
            orchestrator: TurnOrchestrator::new(Arc::clone(&backend), project.clone()),
            view: Mutex::new(ConversationReconciler::new(project, conversation)),
            backend,
            events,
        }
    }

    /// Project of this panel
    #[must_use]
    pub fn project(&self) -> &ProjectId {
        self.orchestrator.project()
    }

    /// Conversation currently shown
    #[must_use]
    pub fn conversation(&self) -> Option<ConversationId> {
        self.view.lock().conversation().cloned()
    }

    /// Current turn snapshot
    #[must_use]
    pub fn snapshot(&self) -> TurnSnapshot {
        self.orchestrator.snapshot()
    }

    /// Subscribe to turn snapshot changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TurnSnapshot> {
        self.orchestrator.subscribe()
    }

    /// Turn snapshot changes as a stream, starting with the current value
    #[must_use]
    pub fn updates(&self) -> WatchStream<TurnSnapshot> {
        self.orchestrator.updates()
    }

    /// Listed messages, authoritative first
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.view.lock().messages().into_iter().cloned().collect()
    }

    /// Entries to display for the current snapshot
    #[must_use]
    pub fn render(&self) -> Vec<RenderedEntry> {
        let snapshot = self.orchestrator.snapshot();
        self.view.lock().render(&snapshot)
    }

    /// Show another conversation (None = start a new one on the next submit)
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Busy`] while a turn is in flight.
    pub fn open_conversation(&self, conversation: Option<ConversationId>) -> Result<(), TurnError> {
        if !self.orchestrator.state().is_idle() {
            return Err(TurnError::Busy);
        }
        self.view.lock().switch_conversation(conversation);
        Ok(())
    }

    /// Submit a question
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Busy`] while a turn is in flight, or the error that
    /// ended the turn. A failed refetch after a successful turn is reported as
    /// a warning notification and does not fail the turn.
    pub async fn submit(&self, text: impl Into<String>) -> Result<TurnOutcome, TurnError> {
        let text = text.into();
        let Ok(slot) = self.orchestrator.try_begin() else {
            tracing::debug!("Ignoring submit while a turn is in flight");
            return Err(TurnError::Busy);
        };

        let request = {
            let mut view = self.view.lock();
            view.push_optimistic(text.clone());
            match view.conversation() {
                Some(conversation) => TurnRequest::new(text).with_conversation(conversation.clone()),
                None => TurnRequest::new(text),
            }
        };

        let mut adopted = None;
        let result = self
            .orchestrator
            .run(slot, request, |conversation_id| {
                let mut view = self.view.lock();
                view.clear_optimistic();
                if view.conversation().is_none() && view.adopt_conversation(conversation_id) {
                    adopted = Some(conversation_id.clone());
                }
            })
            .await;

        if let Some(conversation_id) = adopted {
            tracing::info!(%conversation_id, "Adopted new conversation");
            self.emit(PanelEvent::ConversationAdopted { conversation_id })
                .await;
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.notify(NotifyLevel::Error, &e.detail()).await;
                return Err(e);
            }
        };

        self.emit(PanelEvent::TurnFinished {
            conversation_id: outcome.conversation_id.clone(),
            skipped_frames: outcome.skipped_frames,
        })
        .await;

        if let Err(e) = self.load_history().await {
            tracing::warn!(error = %e, "Failed to refresh history after turn");
            self.notify(NotifyLevel::Warning, &format!("Failed to refresh history: {}", e.detail()))
                .await;
        }

        Ok(outcome)
    }

    /// Reload the authoritative history of the current conversation
    ///
    /// Does nothing for a conversation that has not been created yet.
    ///
    /// # Errors
    ///
    /// Returns the store's error; the listed messages are left unchanged.
    pub async fn load_history(&self) -> Result<usize, TurnError> {
        let Some(conversation) = self.conversation() else {
            return Ok(0);
        };

        let messages = self
            .backend
            .fetch_messages(self.project(), &conversation)
            .await?;
        let count = messages.len();

        {
            let mut view = self.view.lock();
            // The user may have switched away while the fetch was running.
            if view.conversation() != Some(&conversation) {
                tracing::debug!(%conversation, "Discarding stale history fetch");
                return Ok(0);
            }
            view.replace_authoritative(messages);
        }

        tracing::debug!(%conversation, messages = count, "History refreshed");
        self.emit(PanelEvent::HistoryRefreshed {
            conversation_id: conversation,
            messages: count,
        })
        .await;
        Ok(count)
    }

    /// Send a notification to the UI
    async fn notify(&self, level: NotifyLevel, message: &str) {
        self.emit(PanelEvent::Notify {
            level,
            message: message.to_string(),
        })
        .await;
    }

    /// Send an event to the UI
    async fn emit(&self, event: PanelEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("Panel event receiver dropped");
        }
    }
}

impl<B: ?Sized> std::fmt::Debug for ChatPanel<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatPanel")
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}
