//! Streaming Infrastructure for Turn Responses
//!
//! A turn's answer arrives as one response body. The pump task owns that body,
//! runs it through the frame decoder and the event interpreter, and forwards
//! the results over a bounded channel to exactly one consumer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────── pump task ────────────────────────┐
//! │  bytes_stream() ─▶ FrameDecoder ─▶ interpret() ─▶ mpsc tx  │
//! └───────────────────────────────────────────────┬───────────┘
//!                                                 │ StreamItem
//!                                                 ▼
//!                                          EventReceiver
//!                                                 │
//!                                                 ▼
//!                                         TurnOrchestrator
//! ```
//!
//! # Guarantees
//!
//! - **Ordering**: items are sent in the order their frames appear on the wire
//! - **Single use**: an `EventReceiver` cannot be cloned or restarted
//! - **Release**: the body is dropped when the pump finishes, fails, or the
//!   receiver is dropped

mod pump;

pub use pump::{spawn_event_pump, EventReceiver, StreamConfig, StreamItem};
