//! Terminal Rendering
//!
//! Plain-text formatting of messages, sources and conversation listings.

use std::fmt::Write;

use ragchat_core::{source_names, Conversation, Message, MessageRole, SourceDocument};

/// Label printed before a message
pub fn role_label(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "you",
        MessageRole::Assistant => "assistant",
        MessageRole::System => "system",
    }
}

/// One message with its sources
pub fn format_message(message: &Message) -> String {
    let mut out = format!("[{}] {}", role_label(message.role), message.content);
    if let Some(reliability) = message.reliability_percent {
        let _ = write!(out, " ({reliability}% reliable)");
    }
    let sources = source_names(message.citations());
    if !sources.is_empty() {
        let _ = write!(out, "\n    sources: {}", sources.join(", "));
    }
    out
}

/// Numbered source list for a finished answer
pub fn format_sources(documents: &[SourceDocument]) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            let fragments = doc.chunk_ids.len();
            if fragments > 1 {
                format!("[{}] {} ({fragments} fragments)", i + 1, doc.document_name)
            } else {
                format!("[{}] {}", i + 1, doc.document_name)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line of a conversation listing
pub fn format_conversation(conversation: &Conversation) -> String {
    let title = conversation.title.as_deref().unwrap_or("(untitled)");
    format!(
        "{}  {}  {}",
        conversation.id,
        conversation.created_at.format("%Y-%m-%d %H:%M"),
        title
    )
}

/// Split a captured body into chunks of at most `size` bytes
pub fn split_chunks(body: &[u8], size: usize) -> Vec<Vec<u8>> {
    body.chunks(size.max(1)).map(<[u8]>::to_vec).collect()
}
