//! Chat Backend Integration
//!
//! Access to the chat server through the traits the turn pipeline depends on.
//!
//! # Available Backends
//!
//! - **Http**: the chat server over reqwest (default)
//! - **Scripted**: replays canned response bodies, for tests and captures
//! - **InMemory**: a message store without a server
//!
//! # Usage
//!
//! ```ignore
//! use ragchat_core::backend::{HttpBackend, TurnBackend};
//! use ragchat_core::config::load_config;
//!
//! let backend = HttpBackend::from_config(&load_config()?)?;
//! let mut events = backend.open_turn(&project, &TurnRequest::new("Hello!")).await?;
//! ```

mod http;
mod memory;
mod scripted;
mod traits;

pub use http::HttpBackend;
pub use memory::InMemoryStore;
pub use scripted::{Script, ScriptedBackend};
pub use traits::{CredentialProvider, MessageStore, StaticCredential, TurnBackend};
