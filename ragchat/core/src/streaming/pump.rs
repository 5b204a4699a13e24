//! Event Pump Implementation
//!
//! Reads one response body, decodes frames, interprets payloads and forwards
//! the resulting items over a bounded channel, in arrival order.

use std::fmt::Display;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::error::{FrameParseError, TurnError};
use crate::events::{interpret, StreamEvent};
use crate::transport::{FrameDecoder, DEFAULT_MAX_FRAME_BYTES};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the event pump
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Items buffered between the pump and the consumer
    pub channel_capacity: usize,
    /// Longest line accepted by the frame decoder
    pub max_frame_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 100,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

// ============================================================================
// Stream Items
// ============================================================================

/// What the pump hands to the consumer
#[derive(Clone, Debug)]
pub enum StreamItem {
    /// A decoded event
    Event(StreamEvent),
    /// A frame that failed to decode and was skipped
    Skipped(FrameParseError),
    /// The stream failed; no further items follow
    Failed(TurnError),
}

// ============================================================================
// Receiver
// ============================================================================

/// Single-consumer end of a turn stream
///
/// Dropping the receiver aborts the pump task, which drops the response body
/// and closes the connection.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<StreamItem>,
    pump: Option<AbortHandle>,
}

impl EventReceiver {
    /// Wrap a channel that something other than a pump task feeds
    #[must_use]
    pub fn from_channel(rx: mpsc::Receiver<StreamItem>) -> Self {
        Self { rx, pump: None }
    }

    /// Receive the next item, `None` once the stream is exhausted
    pub async fn recv(&mut self) -> Option<StreamItem> {
        self.rx.recv().await
    }

    /// Stop reading the response body
    pub fn abort(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.rx.close();
    }
}

impl Drop for EventReceiver {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Spawn a pump task over a response body
///
/// `body` is any stream of byte chunks; in production it is
/// `reqwest::Response::bytes_stream()`.
pub fn spawn_event_pump<S, B, E>(body: S, config: &StreamConfig) -> EventReceiver
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let decoder = FrameDecoder::with_max_frame_bytes(config.max_frame_bytes);
    let handle = tokio::spawn(run_pump(body, decoder, tx));

    EventReceiver {
        rx,
        pump: Some(handle.abort_handle()),
    }
}

async fn run_pump<S, B, E>(body: S, mut decoder: FrameDecoder, tx: mpsc::Sender<StreamItem>)
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut body = std::pin::pin!(body);
    let mut reads: u64 = 0;

    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                reads += 1;
                decoder.push(bytes.as_ref());
                loop {
                    match decoder.next_payload() {
                        Ok(Some(payload)) => {
                            if !forward(&tx, &payload).await {
                                // Receiver dropped, stop streaming
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            tracing::warn!(error = %e, "Turn stream framing failed");
                            let _ = tx.send(StreamItem::Failed(e)).await;
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, reads, "Turn stream read failed");
                let _ = tx
                    .send(StreamItem::Failed(TurnError::Network(e.to_string())))
                    .await;
                return;
            }
        }
    }

    if let Some(payload) = decoder.finish() {
        forward(&tx, &payload).await;
    }

    tracing::debug!(reads, frames = decoder.frames(), "Turn stream exhausted");
}

/// Interpret a payload and hand it on; false once the receiver is gone
async fn forward(tx: &mpsc::Sender<StreamItem>, payload: &str) -> bool {
    let item = match interpret(payload) {
        Ok(Some(event)) => StreamItem::Event(event),
        Ok(None) => {
            tracing::debug!(payload, "Dropping unrecognized payload");
            return true;
        }
        Err(e) => {
            tracing::warn!(reason = %e.reason, payload = %e.payload, "Skipping unparseable frame");
            StreamItem::Skipped(e)
        }
    };
    tx.send(item).await.is_ok()
}
