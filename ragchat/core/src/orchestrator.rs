//! Turn Orchestrator
//!
//! Runs one turn at a time: submits the request, consumes the event stream in
//! arrival order, grows the accumulator, captures citations and the
//! conversation id, and publishes every change as a [`TurnSnapshot`].
//!
//! # State Machine
//!
//! ```text
//!   Idle ──send()──▶ Sending ──first item──▶ Streaming
//!    ▲                  │                        │
//!    └──────────────────┴── exhausted / failed ──┘
//!                           / send() future dropped
//! ```
//!
//! The return to Idle is owned by the [`TurnSlot`] drop guard, so no exit path (error, early
//! return or cancellation of the `send` future) can leave the panel locked.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::backend::TurnBackend;
use crate::error::TurnError;
use crate::events::StreamEvent;
use crate::messages::{Citation, ConversationId, ProjectId, TurnRequest, TurnState};
use crate::streaming::StreamItem;

/// Observable state of one orchestrator
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TurnSnapshot {
    /// Current state
    pub state: TurnState,
    /// Assistant output received so far in the current (or last) turn
    pub accumulated_text: String,
    /// Citations of the current (or last) turn
    pub citations: Vec<Citation>,
    /// Conversation id reported by the last completion
    pub conversation_id: Option<ConversationId>,
    /// Frames skipped because they failed to decode
    pub skipped_frames: usize,
}

/// Result of a completed turn
#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    /// Conversation the turn was recorded in, if the server said so
    pub conversation_id: Option<ConversationId>,
    /// Full assistant output
    pub text: String,
    /// Citations returned with the completion
    pub citations: Vec<Citation>,
    /// Frames skipped because they failed to decode
    pub skipped_frames: usize,
}

/// Per-panel turn state machine
pub struct TurnOrchestrator<B: ?Sized> {
    backend: Arc<B>,
    project: ProjectId,
    state: watch::Sender<TurnSnapshot>,
}

/// Exclusive hold on an orchestrator's single turn slot
///
/// Obtained from [`TurnOrchestrator::try_begin`]. The orchestrator stays out of
/// Idle while the slot is alive and returns to Idle when it is dropped.
#[must_use = "dropping the slot releases the turn"]
pub struct TurnSlot<'a> {
    state: &'a watch::Sender<TurnSnapshot>,
}

impl std::fmt::Debug for TurnSlot<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnSlot")
            .field("state", &self.state.borrow().state)
            .finish()
    }
}

impl Drop for TurnSlot<'_> {
    fn drop(&mut self) {
        self.state.send_if_modified(|snapshot| {
            if snapshot.state.is_idle() {
                return false;
            }
            snapshot.state = TurnState::Idle;
            true
        });
    }
}

impl<B: TurnBackend + ?Sized> TurnOrchestrator<B> {
    /// Create an orchestrator for one project
    pub fn new(backend: Arc<B>, project: ProjectId) -> Self {
        let (state, _) = watch::channel(TurnSnapshot::default());
        Self {
            backend,
            project,
            state,
        }
    }

    /// Project this orchestrator submits to
    #[must_use]
    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> TurnSnapshot {
        self.state.borrow().clone()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> TurnState {
        self.state.borrow().state
    }

    /// Subscribe to snapshot changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TurnSnapshot> {
        self.state.subscribe()
    }

    /// Snapshot changes as a stream, starting with the current value
    #[must_use]
    pub fn updates(&self) -> WatchStream<TurnSnapshot> {
        WatchStream::new(self.state.subscribe())
    }

    /// Claim the turn slot: Idle moves to Sending and the previous turn's
    /// output is cleared
    ///
    /// # Errors
    ///
    /// Returns [`TurnError::Busy`] if a turn is already in flight.
    pub fn try_begin(&self) -> Result<TurnSlot<'_>, TurnError> {
        let acquired = self.state.send_if_modified(|snapshot| {
            if !snapshot.state.is_idle() {
                return false;
            }
            *snapshot = TurnSnapshot {
                state: TurnState::Sending,
                ..TurnSnapshot::default()
            };
            true
        });
        if !acquired {
            tracing::warn!(project = %self.project, "Refusing turn, another turn is in flight");
            return Err(TurnError::Busy);
        }
        Ok(TurnSlot { state: &self.state })
    }

    /// Run one turn
    ///
    /// `on_adopted` is called once, with the conversation id from the
    /// completion record, as soon as that record arrives. It is not called
    /// when the server does not report an id.
    ///
    /// # Errors
    ///
    /// - [`TurnError::Busy`] if a turn is already in flight
    /// - the backend's error if the turn could not be opened
    /// - the pump's error if the stream failed midway
    pub async fn send<F>(&self, request: TurnRequest, on_adopted: F) -> Result<TurnOutcome, TurnError>
    where
        F: FnOnce(&ConversationId),
    {
        let slot = self.try_begin()?;
        self.run(slot, request, on_adopted).await
    }

    /// Run one turn in a slot claimed with [`try_begin`](Self::try_begin)
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), minus [`TurnError::Busy`].
    pub async fn run<F>(
        &self,
        slot: TurnSlot<'_>,
        request: TurnRequest,
        on_adopted: F,
    ) -> Result<TurnOutcome, TurnError>
    where
        F: FnOnce(&ConversationId),
    {
        debug_assert!(std::ptr::eq(slot.state, &self.state));
        let _slot = slot;

        tracing::info!(
            project = %self.project,
            backend = self.backend.name(),
            conversation = ?request.target_conversation_id,
            new_conversation = request.start_new_conversation,
            "Starting turn"
        );

        let mut events = self
            .backend
            .open_turn(&self.project, &request)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Failed to open turn"))?;

        let mut on_adopted = Some(on_adopted);
        let mut tokens: u64 = 0;

        while let Some(item) = events.recv().await {
            self.state.send_if_modified(|snapshot| {
                if snapshot.state != TurnState::Sending {
                    return false;
                }
                snapshot.state = TurnState::Streaming;
                true
            });

            match item {
                StreamItem::Event(StreamEvent::Token { fragment }) => {
                    tokens += 1;
                    self.state
                        .send_modify(|snapshot| snapshot.accumulated_text.push_str(&fragment));
                }
                StreamItem::Event(StreamEvent::Completed {
                    conversation_id,
                    citations,
                }) => {
                    tracing::debug!(
                        conversation = ?conversation_id,
                        citations = citations.len(),
                        "Turn completion received"
                    );
                    self.state.send_modify(|snapshot| {
                        snapshot.citations = citations;
                        snapshot.conversation_id.clone_from(&conversation_id);
                    });
                    if let Some(ref id) = conversation_id {
                        if let Some(adopt) = on_adopted.take() {
                            adopt(id);
                        }
                    }
                }
                StreamItem::Skipped(_) => {
                    self.state.send_modify(|snapshot| snapshot.skipped_frames += 1);
                }
                StreamItem::Failed(e) => {
                    tracing::warn!(error = %e, tokens, "Turn stream failed");
                    return Err(e);
                }
            }
        }

        let snapshot = self.snapshot();
        tracing::info!(
            conversation = ?snapshot.conversation_id,
            tokens,
            chars = snapshot.accumulated_text.len(),
            skipped_frames = snapshot.skipped_frames,
            "Turn finished"
        );

        Ok(TurnOutcome {
            conversation_id: snapshot.conversation_id,
            text: snapshot.accumulated_text,
            citations: snapshot.citations,
            skipped_frames: snapshot.skipped_frames,
        })
    }
}

impl<B: ?Sized> std::fmt::Debug for TurnOrchestrator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnOrchestrator")
            .field("project", &self.project)
            .field("state", &self.state.borrow().state)
            .finish_non_exhaustive()
    }
}
