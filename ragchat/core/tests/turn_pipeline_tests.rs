//! Integration tests for the streaming turn pipeline
//!
//! These tests drive whole turns through the public API: bytes go in through a
//! backend, and the tests observe the snapshot, the outcome and the panel.
//! Tests cover:
//! - Chunk-boundary independence of the decoded turn
//! - The four reference scenarios (happy path, dedup, busy guard, failure)
//! - The HTTP backend against a local socket speaking HTTP/1.1

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use ragchat_core::{
    aggregate_citations, ChatPanel, ConversationId, HttpBackend, InMemoryStore,
    MessageStore, PanelEvent, ProjectId, Script, ScriptedBackend, StaticCredential, StreamEvent,
    StreamItem, TurnBackend, TurnError, TurnOrchestrator, TurnRequest, TurnState,
};

const SCENARIO_ONE: &str = concat!(
    "data: {\"token\":\"Hello \"}\n\n",
    "data: {\"token\":\"world\"}\n\n",
    "data: {\"done\":true,\"conversationId\":\"c1\",\"chunks\":[]}\n\n",
);

fn split3(text: &str, a: usize, b: usize) -> Vec<Vec<u8>> {
    let bytes = text.as_bytes();
    vec![bytes[..a].to_vec(), bytes[a..b].to_vec(), bytes[b..].to_vec()]
}

// =============================================================================
// Scenario 1: Tokens and completion split across arbitrary reads
// =============================================================================

#[tokio::test]
async fn test_scenario_one_any_two_split_points() {
    let len = SCENARIO_ONE.len();
    // Every split point pair, sampled with a stride to keep the run short.
    for a in (0..=len).step_by(7) {
        for b in (a..=len).step_by(11) {
            let backend = Arc::new(ScriptedBackend::with_scripts([Script::Chunks(split3(
                SCENARIO_ONE,
                a,
                b,
            ))]));
            let orchestrator = TurnOrchestrator::new(backend, ProjectId::from("p"));

            let mut adopted = None;
            let outcome = orchestrator
                .send(TurnRequest::new("hi"), |id| adopted = Some(id.clone()))
                .await
                .unwrap();

            assert_eq!(outcome.text, "Hello world", "split at {a}/{b}");
            assert_eq!(adopted, Some(ConversationId::from("c1")));
            assert_eq!(outcome.skipped_frames, 0);
            assert_eq!(orchestrator.state(), TurnState::Idle);
        }
    }
}

#[tokio::test]
async fn test_scenario_one_yields_three_events() {
    let backend = ScriptedBackend::with_scripts([Script::Chunks(split3(SCENARIO_ONE, 10, 40))]);
    let mut rx = backend
        .open_turn(&ProjectId::from("p"), &TurnRequest::new("hi"))
        .await
        .unwrap();

    let mut names = Vec::new();
    while let Some(item) = rx.recv().await {
        match item {
            StreamItem::Event(event) => names.push(event.name()),
            other => panic!("Unexpected item {other:?}"),
        }
    }
    assert_eq!(names, vec!["token", "token", "completed"]);
}

#[tokio::test]
async fn test_multibyte_text_split_mid_character() {
    let body = "data: {\"token\":\"Grüße 🌍\"}\n\n";
    let cut = body.find('ü').unwrap() + 1;
    let backend = Arc::new(ScriptedBackend::with_scripts([Script::Chunks(vec![
        body.as_bytes()[..cut].to_vec(),
        body.as_bytes()[cut..].to_vec(),
    ])]));
    let orchestrator = TurnOrchestrator::new(backend, ProjectId::from("p"));

    let outcome = orchestrator
        .send(TurnRequest::new("hi"), |_| {})
        .await
        .unwrap();
    assert_eq!(outcome.text, "Grüße 🌍");
}

// =============================================================================
// Scenario 2: Citation deduplication
// =============================================================================

#[tokio::test]
async fn test_scenario_two_completion_citations_dedup() {
    let backend = Arc::new(ScriptedBackend::with_scripts([Script::chunks([
        "data: {\"done\":true,\"conversation_id\":\"c1\",\"chunks\":[",
        "{\"documentId\":\"d1\"},{\"documentId\":\"d1\"},{\"documentId\":\"d2\"}]}\n\n",
    ])]));
    let orchestrator = TurnOrchestrator::new(backend, ProjectId::from("p"));
    let outcome = orchestrator
        .send(TurnRequest::new("q"), |_| {})
        .await
        .unwrap();

    assert_eq!(outcome.citations.len(), 3);
    let ids: Vec<String> = aggregate_citations(&outcome.citations)
        .into_iter()
        .map(|doc| doc.document_id)
        .collect();
    assert_eq!(ids, vec!["d1", "d2"]);
}

// =============================================================================
// Scenario 3: Submit while streaming
// =============================================================================

#[tokio::test]
async fn test_scenario_three_submit_while_streaming_is_noop() {
    let (feed, script) = Script::live();
    let server = Arc::new(ScriptedBackend::with_scripts([script]));
    let orchestrator = TurnOrchestrator::new(Arc::clone(&server), ProjectId::from("p"));
    let mut updates = orchestrator.subscribe();

    feed.send(Ok(b"data: {\"token\":\"x\"}\n\n".to_vec()))
        .await
        .unwrap();

    let running = orchestrator.send(TurnRequest::new("first"), |_| {});
    let probe = async {
        updates
            .wait_for(|s| s.state == TurnState::Streaming)
            .await
            .unwrap();
        let result = orchestrator.send(TurnRequest::new("second"), |_| {}).await;
        assert_eq!(orchestrator.snapshot().accumulated_text, "x");
        drop(feed);
        result
    };

    let (running, probe) = tokio::join!(running, probe);
    assert!(matches!(probe, Err(TurnError::Busy)));
    assert_eq!(running.unwrap().text, "x");
    assert_eq!(server.requests().len(), 1);
}

// =============================================================================
// Scenario 4: Non-success transport response
// =============================================================================

#[tokio::test]
async fn test_scenario_four_transport_failure() {
    let backend = Arc::new(ScriptedBackend::with_scripts([Script::Reject(
        TurnError::Transport {
            status: 502,
            body: "upstream unavailable".to_string(),
        },
    )]));
    let orchestrator = TurnOrchestrator::new(backend, ProjectId::from("p"));

    let err = orchestrator
        .send(TurnRequest::new("q"), |_| panic!("no adoption on failure"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("502"));
    assert!(err.to_string().contains("upstream unavailable"));
    assert_eq!(orchestrator.state(), TurnState::Idle);
}

#[tokio::test]
async fn test_failure_midstream_keeps_partial_text_and_returns_to_idle() {
    let (feed, script) = Script::live();
    let backend = Arc::new(ScriptedBackend::with_scripts([script]));
    let orchestrator = TurnOrchestrator::new(backend, ProjectId::from("p"));

    feed.send(Ok(b"data: {\"token\":\"half\"}\n\n".to_vec()))
        .await
        .unwrap();
    feed.send(Err("connection reset by peer".to_string()))
        .await
        .unwrap();

    let err = orchestrator
        .send(TurnRequest::new("q"), |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, TurnError::Network(_)));
    assert_eq!(orchestrator.state(), TurnState::Idle);
    assert_eq!(orchestrator.snapshot().accumulated_text, "half");
}

// =============================================================================
// HTTP backend against a local server
// =============================================================================

/// Serve one canned HTTP response and return the raw request
async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        String::from_utf8_lossy(&request).to_string()
    });

    (address, handle)
}

fn http_backend(address: &str) -> HttpBackend {
    HttpBackend::new(address, Arc::new(StaticCredential::new("test-token"))).unwrap()
}

#[tokio::test]
async fn test_http_stream_turn_end_to_end() {
    let body = SCENARIO_ONE;
    let (address, server) = serve_once(format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{body}"
    ))
    .await;

    let backend = Arc::new(http_backend(&address));
    let orchestrator = TurnOrchestrator::new(backend, ProjectId::from("p1"));
    let outcome = orchestrator
        .send(
            TurnRequest::new("What is RAG?").with_conversation(ConversationId::from("c0")),
            |_| {},
        )
        .await
        .unwrap();
    assert_eq!(outcome.text, "Hello world");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/v1/projects/p1/chat/messages/stream HTTP/1.1"));
    assert!(request
        .to_ascii_lowercase()
        .contains("authorization: bearer test-token"));
    assert!(request.contains("\"message\":\"What is RAG?\""));
    assert!(request.contains("\"conversation_id\":\"c0\""));
}

#[tokio::test]
async fn test_http_error_status_carries_body() {
    let body = r#"{"detail":"Project not found"}"#;
    let (address, _server) = serve_once(format!(
        "HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    ))
    .await;

    let backend = http_backend(&address);
    let err = backend
        .open_turn(&ProjectId::from("p1"), &TurnRequest::new("q"))
        .await
        .unwrap_err();

    assert!(matches!(err, TurnError::Transport { status: 404, .. }));
    assert_eq!(err.detail(), "Project not found");
}

#[tokio::test]
async fn test_http_empty_stream_body_is_missing_body() {
    let (address, server) = serve_once(
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            .to_string(),
    )
    .await;

    let backend = Arc::new(http_backend(&address));
    let orchestrator = TurnOrchestrator::new(backend, ProjectId::from("p1"));
    let err = orchestrator
        .send(TurnRequest::new("q"), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, TurnError::MissingBody));
    assert_eq!(orchestrator.state(), TurnState::Idle);
    server.await.unwrap();
}

#[tokio::test]
async fn test_http_fetch_messages() {
    let body = r#"[{"id":"m1","conversation_id":"c1","role":"user","content":"hi","created_at":"2026-01-01T00:00:00Z"},{"id":"m2","conversation_id":"c1","role":"assistant","content":"hello","created_at":"2026-01-01T00:00:01Z","source_documents":[{"document_id":"d1","chunk_ids":["k1","k2"],"document_file_name":"a.pdf"}]}]"#;
    let (address, server) = serve_once(format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    ))
    .await;

    let backend = http_backend(&address);
    let messages = backend
        .fetch_messages(&ProjectId::from("p1"), &ConversationId::from("c1"))
        .await
        .unwrap();

    assert_eq!(messages.len(), 2);
    let sources = aggregate_citations(messages[1].citations());
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].document_name, "a.pdf");
    assert_eq!(sources[0].chunk_ids, vec!["k1", "k2"]);

    let request = server.await.unwrap();
    assert!(request
        .starts_with("GET /api/v1/projects/p1/chat/conversations/c1/messages?limit=50&offset=0 "));
}

// =============================================================================
// Panel over a shared store
// =============================================================================

struct Server {
    turns: ScriptedBackend,
    store: InMemoryStore,
}

#[async_trait::async_trait]
impl TurnBackend for Server {
    fn name(&self) -> &str {
        "server"
    }

    async fn open_turn(
        &self,
        project: &ProjectId,
        request: &TurnRequest,
    ) -> Result<ragchat_core::EventReceiver, TurnError> {
        self.turns.open_turn(project, request).await
    }
}

#[async_trait::async_trait]
impl MessageStore for Server {
    async fn fetch_messages(
        &self,
        project: &ProjectId,
        conversation: &ConversationId,
    ) -> Result<Vec<ragchat_core::Message>, TurnError> {
        self.store.fetch_messages(project, conversation).await
    }
}

#[tokio::test]
async fn test_two_panels_do_not_share_state() {
    let server = Arc::new(Server {
        turns: ScriptedBackend::with_scripts([Script::chunks([
            "data: {\"token\":\"only one\"}\n\n",
        ])]),
        store: InMemoryStore::new(),
    });
    let (tx, _rx) = mpsc::channel::<PanelEvent>(16);

    let left = ChatPanel::new(Arc::clone(&server), ProjectId::from("p"), None, tx.clone());
    let right = ChatPanel::new(Arc::clone(&server), ProjectId::from("p"), None, tx);

    left.submit("question").await.unwrap();
    assert_eq!(left.snapshot().accumulated_text, "only one");
    assert_eq!(right.snapshot(), ragchat_core::TurnSnapshot::default());
    assert!(right.messages().is_empty());
}

#[test]
fn test_stream_event_completed_without_citations_is_empty() {
    let event = ragchat_core::interpret(r#"{"done":true}"#).unwrap();
    assert_eq!(
        event,
        Some(StreamEvent::Completed {
            conversation_id: None,
            citations: Vec::new()
        })
    );
}
