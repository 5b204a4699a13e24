//! Scripted Backend
//!
//! Serves pre-recorded response bodies instead of talking to a server. Each
//! call to `open_turn` consumes the next script. Bodies go through the same
//! pump as live responses, so chunking and framing behave identically.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::traits::TurnBackend;
use crate::error::TurnError;
use crate::messages::{ProjectId, TurnRequest};
use crate::streaming::{spawn_event_pump, EventReceiver, StreamConfig};

/// One scripted response
#[derive(Debug)]
pub enum Script {
    /// A complete body delivered as these network chunks
    Chunks(Vec<Vec<u8>>),
    /// A body fed live by the test; an `Err` is a read failure
    Live(mpsc::Receiver<Result<Vec<u8>, String>>),
    /// The request is refused before any body is read
    Reject(TurnError),
}

impl Script {
    /// A body delivered as one chunk per string
    pub fn chunks<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Chunks(
            parts
                .into_iter()
                .map(|part| part.as_ref().as_bytes().to_vec())
                .collect(),
        )
    }

    /// A live body and the sender that feeds it
    #[must_use]
    pub fn live() -> (mpsc::Sender<Result<Vec<u8>, String>>, Self) {
        let (tx, rx) = mpsc::channel(16);
        (tx, Self::Live(rx))
    }
}

/// Backend that replays scripts in order
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<(ProjectId, TurnRequest)>>,
    stream_config: StreamConfig,
}

impl ScriptedBackend {
    /// Create a backend with no scripts
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that serves `scripts` in order
    #[must_use]
    pub fn with_scripts(scripts: impl IntoIterator<Item = Script>) -> Self {
        let backend = Self::new();
        backend.scripts.lock().extend(scripts);
        backend
    }

    /// Use custom pump settings
    #[must_use]
    pub fn with_stream_config(mut self, config: StreamConfig) -> Self {
        self.stream_config = config;
        self
    }

    /// Queue another script
    pub fn push(&self, script: Script) {
        self.scripts.lock().push_back(script);
    }

    /// Requests received so far
    #[must_use]
    pub fn requests(&self) -> Vec<(ProjectId, TurnRequest)> {
        self.requests.lock().clone()
    }

    /// Scripts not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.scripts.lock().len()
    }
}

#[async_trait]
impl TurnBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn open_turn(
        &self,
        project: &ProjectId,
        request: &TurnRequest,
    ) -> Result<EventReceiver, TurnError> {
        self.requests.lock().push((project.clone(), request.clone()));

        let Some(script) = self.scripts.lock().pop_front() else {
            tracing::warn!("Scripted backend has no script left");
            return Err(TurnError::MissingBody);
        };

        match script {
            Script::Chunks(chunks) => {
                let body = futures::stream::iter(chunks.into_iter().map(Ok::<_, String>));
                Ok(spawn_event_pump(body, &self.stream_config))
            }
            Script::Live(rx) => Ok(spawn_event_pump(ReceiverStream::new(rx), &self.stream_config)),
            Script::Reject(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StreamEvent;
    use crate::streaming::StreamItem;

    #[tokio::test]
    async fn test_scripts_served_in_order() {
        let backend = ScriptedBackend::with_scripts([
            Script::chunks(["data: {\"token\":\"first\"}\n\n"]),
            Script::Reject(TurnError::Transport {
                status: 500,
                body: "boom".to_string(),
            }),
        ]);
        let project = ProjectId::from("p");

        let mut rx = backend
            .open_turn(&project, &TurnRequest::new("one"))
            .await
            .unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(StreamItem::Event(StreamEvent::Token { fragment })) if fragment == "first"
        ));

        let second = backend.open_turn(&project, &TurnRequest::new("two")).await;
        assert!(matches!(second, Err(TurnError::Transport { status: 500, .. })));

        let third = backend.open_turn(&project, &TurnRequest::new("three")).await;
        assert!(matches!(third, Err(TurnError::MissingBody)));

        let texts: Vec<String> = backend
            .requests()
            .into_iter()
            .map(|(_, request)| request.text)
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_live_script_read_failure() {
        let (tx, script) = Script::live();
        let backend = ScriptedBackend::with_scripts([script]);
        let mut rx = backend
            .open_turn(&ProjectId::from("p"), &TurnRequest::new("q"))
            .await
            .unwrap();

        tx.send(Err("connection reset".to_string())).await.unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(StreamItem::Failed(TurnError::Network(_)))
        ));
    }
}
