//! Ragchat Core - Streaming Turn Pipeline for Retrieval-Augmented Chat
//!
//! This crate turns the streamed answer of a question-answering backend into
//! state a conversational UI can render: text that grows token by token, a
//! deduplicated list of cited source documents, and a message list that merges
//! what the user just typed with what the server has persisted.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          UI / CLI                                │
//! │        submit(text) │            ▲ PanelEvent / TurnSnapshot     │
//! └─────────────────────┼────────────┼───────────────────────────────┘
//!                       ▼            │
//! ┌──────────────────────────────────┴───────────────────────────────┐
//! │                           ChatPanel                              │
//! │  ┌──────────────────┐   ┌───────────────────────┐                │
//! │  │ TurnOrchestrator │   │ ConversationReconciler│──▶ citations   │
//! │  └────────┬─────────┘   └───────────▲───────────┘                │
//! │           │ EventReceiver           │ refetch                    │
//! └───────────┼─────────────────────────┼────────────────────────────┘
//!             │                         │
//! ┌───────────┴──────────┐    ┌─────────┴──────────┐
//! │ pump task            │    │ MessageStore       │
//! │ FrameDecoder         │    │ (HttpBackend /     │
//! │ → interpret()        │    │  InMemoryStore)    │
//! └───────────▲──────────┘    └────────────────────┘
//!             │ bytes
//!       TurnBackend (HttpBackend / ScriptedBackend)
//! ```
//!
//! # Key Types
//!
//! - [`ChatPanel`]: One conversation view, the entry point for a UI
//! - [`TurnOrchestrator`]: The per-panel turn state machine
//! - [`ConversationReconciler`]: Merges optimistic and persisted messages
//! - [`FrameDecoder`]: Splits a byte stream into `data:` payloads
//! - [`StreamEvent`]: A decoded token or completion record
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use ragchat_core::{backend::HttpBackend, config::load_config, ChatPanel};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let backend = Arc::new(HttpBackend::from_config(&config)?);
//!     let (tx, mut rx) = mpsc::channel(100);
//!
//!     let panel = ChatPanel::new(backend, "project-id".into(), None, tx);
//!     let outcome = panel.submit("What does the handbook say about leave?").await?;
//!     println!("{}", outcome.text);
//!
//!     while let Ok(event) = rx.try_recv() {
//!         // Render panel events
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`transport`]: Line framing of the response body
//! - [`events`]: Payload interpretation into [`StreamEvent`]s
//! - [`streaming`]: The pump task and its receiver
//! - [`orchestrator`]: Turn state machine
//! - [`reconciler`]: Optimistic/authoritative message merge and rendering
//! - [`citations`]: Source document aggregation
//! - [`panel`]: Conversation view wiring everything together
//! - [`backend`]: Server access traits and implementations
//! - [`messages`]: Shared data model
//! - [`config`]: Layered configuration
//! - [`error`]: Error types

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod citations;
pub mod config;
pub mod error;
pub mod events;
pub mod messages;
pub mod orchestrator;
pub mod panel;
pub mod reconciler;
pub mod streaming;
pub mod transport;

// Re-exports for convenience
pub use backend::{
    CredentialProvider, HttpBackend, InMemoryStore, MessageStore, Script, ScriptedBackend,
    StaticCredential, TurnBackend,
};
pub use citations::{aggregate_citations, source_names, SourceDocument};
pub use config::{load_config, ChatConfig, ConfigError, ConfigOverrides, ConfigSource};
pub use error::{FrameParseError, TurnError};
pub use events::{interpret, StreamEvent};
pub use messages::{
    AnswerResponse, Citation, Conversation, ConversationId, Message, MessageId, MessageRole,
    NotifyLevel, ProjectId, TurnRequest, TurnState,
};
pub use orchestrator::{TurnOrchestrator, TurnOutcome, TurnSlot, TurnSnapshot};
pub use panel::{ChatPanel, PanelEvent};
pub use reconciler::{ConversationReconciler, RenderedEntry};
pub use streaming::{spawn_event_pump, EventReceiver, StreamConfig, StreamItem};
pub use transport::{FrameDecoder, DEFAULT_MAX_FRAME_BYTES};
