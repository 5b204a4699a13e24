//! Chat Data Model
//!
//! Types shared by every stage of the turn pipeline: identifiers, persisted
//! messages, citations, the turn request and the turn state.
//!
//! # Wire Compatibility
//!
//! The backend speaks snake_case JSON. Some deployments emit camelCase for the
//! streaming completion record, so the fields that appear there also accept a
//! camelCase alias.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix carried by every synthetic (never persisted) message id
pub const OPTIMISTIC_ID_PREFIX: &str = "temp-";

/// Project identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

/// Conversation identifier
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// The provisional id of a conversation the server has not created yet
    #[must_use]
    pub fn unassigned() -> Self {
        Self(String::new())
    }

    /// Whether this id is still provisional
    #[must_use]
    pub fn is_unassigned(&self) -> bool {
        self.0.is_empty()
    }
}

/// Message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a synthetic id for a locally created message
    #[must_use]
    pub fn optimistic() -> Self {
        Self(format!("{OPTIMISTIC_ID_PREFIX}{}", uuid::Uuid::new_v4()))
    }

    /// Whether this id was generated locally and never persisted
    #[must_use]
    pub fn is_optimistic(&self) -> bool {
        self.0.starts_with(OPTIMISTIC_ID_PREFIX)
    }
}

macro_rules! id_conversions {
    ($($ty:ident),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<&str> for $ty {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }

            impl From<String> for $ty {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }

            impl $ty {
                /// Borrow the raw identifier
                #[must_use]
                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }
        )*
    };
}

id_conversions!(ProjectId, ConversationId, MessageId);

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// Generated answer
    Assistant,
    /// System message
    System,
}

/// One retrieved evidence fragment tied to a source document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Fragment identifier
    #[serde(default, alias = "chunkId")]
    pub chunk_id: String,
    /// Source document identifier
    #[serde(alias = "documentId")]
    pub document_id: String,
    /// Human-readable document name, when the backend knows it
    #[serde(
        default,
        rename = "document_file_name",
        alias = "documentName",
        alias = "document_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub document_name: Option<String>,
    /// Fragment text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Retrieval score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Citation {
    /// Create a citation for a fragment of a document
    pub fn new(chunk_id: impl Into<String>, document_id: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            document_id: document_id.into(),
            document_name: None,
            content: None,
            score: None,
        }
    }

    /// Set the document name
    #[must_use]
    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = Some(name.into());
        self
    }

    /// Set the retrieval score
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }
}

/// A citation entry as stored with a persisted message
///
/// Persisted messages group fragments per document
/// (`{document_id, chunk_ids, document_file_name}`), while the streaming
/// completion lists one record per fragment. Both decode into [`Citation`]s.
#[derive(Deserialize)]
#[serde(untagged)]
enum CitationRecord {
    Grouped {
        #[serde(alias = "documentId")]
        document_id: String,
        #[serde(alias = "chunkIds")]
        chunk_ids: Vec<String>,
        #[serde(
            default,
            alias = "documentName",
            alias = "document_name",
            alias = "documentFileName"
        )]
        document_file_name: Option<String>,
    },
    Single(Citation),
}

impl CitationRecord {
    fn expand(self, out: &mut Vec<Citation>) {
        match self {
            Self::Single(citation) => out.push(citation),
            Self::Grouped {
                document_id,
                chunk_ids,
                document_file_name,
            } => {
                let citation = Citation {
                    chunk_id: String::new(),
                    document_id,
                    document_name: document_file_name,
                    content: None,
                    score: None,
                };
                if chunk_ids.is_empty() {
                    out.push(citation);
                    return;
                }
                out.extend(chunk_ids.into_iter().map(|chunk_id| Citation {
                    chunk_id,
                    ..citation.clone()
                }));
            }
        }
    }
}

fn deserialize_citations<'de, D>(deserializer: D) -> Result<Option<Vec<Citation>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let records = Option::<Vec<CitationRecord>>::deserialize(deserializer)?;
    Ok(records.map(|records| {
        let mut citations = Vec::with_capacity(records.len());
        for record in records {
            record.expand(&mut citations);
        }
        citations
    }))
}

/// A message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message id (synthetic for optimistic messages)
    pub id: MessageId,
    /// Owning conversation (unassigned for the first message of a new one)
    pub conversation_id: ConversationId,
    /// Who sent this message
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Evidence the answer was built from
    #[serde(
        default,
        alias = "source_documents",
        deserialize_with = "deserialize_citations",
        skip_serializing_if = "Option::is_none"
    )]
    pub citations: Option<Vec<Citation>>,
    /// Backend-estimated answer reliability (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reliability_percent: Option<u8>,
}

impl Message {
    /// Create an optimistic user message that has not been persisted yet
    #[must_use]
    pub fn optimistic_user(content: impl Into<String>, conversation_id: ConversationId) -> Self {
        Self {
            id: MessageId::optimistic(),
            conversation_id,
            role: MessageRole::User,
            content: content.into(),
            created_at: Utc::now(),
            citations: None,
            reliability_percent: None,
        }
    }

    /// Whether the message only exists locally
    #[must_use]
    pub fn is_optimistic(&self) -> bool {
        self.id.is_optimistic()
    }

    /// Citations attached to the message, empty when there are none
    #[must_use]
    pub fn citations(&self) -> &[Citation] {
        self.citations.as_deref().unwrap_or_default()
    }
}

/// A conversation summary as listed by the backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation id
    pub id: ConversationId,
    /// Owning project
    pub project_id: ProjectId,
    /// Owning user
    pub user_id: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Optional title
    #[serde(default)]
    pub title: Option<String>,
}

/// One user submission
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TurnRequest {
    /// The question text
    #[serde(rename = "message")]
    pub text: String,
    /// Conversation to continue (None = let the server pick or create one)
    #[serde(rename = "conversation_id", skip_serializing_if = "Option::is_none")]
    pub target_conversation_id: Option<ConversationId>,
    /// Force a fresh conversation even if one is targeted
    pub start_new_conversation: bool,
    /// Maximum number of retrieved fragments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl TurnRequest {
    /// Create a request for the given text
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target_conversation_id: None,
            start_new_conversation: false,
            limit: None,
        }
    }

    /// Continue an existing conversation
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: ConversationId) -> Self {
        self.target_conversation_id = Some(conversation_id);
        self
    }

    /// Ask the server to open a new conversation
    #[must_use]
    pub fn new_conversation(mut self) -> Self {
        self.start_new_conversation = true;
        self
    }

    /// Limit the number of retrieved fragments
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Non-streaming answer returned by the plain send endpoint
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct AnswerResponse {
    /// Project the question was asked in
    pub project_id: ProjectId,
    /// Conversation the turn was recorded in
    pub conversation_id: ConversationId,
    /// Echo of the question
    pub message: String,
    /// The full answer
    pub answer: String,
    /// Evidence the answer was built from
    #[serde(default)]
    pub chunks: Vec<Citation>,
}

/// Notification levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
}

/// Turn states
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnState {
    /// Ready for input
    #[default]
    Idle,
    /// Request submitted, nothing received yet
    Sending,
    /// Receiving the answer
    Streaming,
}

impl TurnState {
    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Sending => "Thinking...",
            Self::Streaming => "Responding...",
        }
    }

    /// Whether a new turn may start
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}
