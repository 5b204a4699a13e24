//! Citation Aggregation
//!
//! Collapses a list of cited fragments into the list of source documents they
//! came from. Used for the live citations of the current turn and for the
//! citations stored on historical messages alike.

use std::collections::HashMap;

use serde::Serialize;

use crate::messages::Citation;

/// A cited source document
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SourceDocument {
    /// Document identifier
    pub document_id: String,
    /// Display name (the document id when no name is known)
    pub document_name: String,
    /// Fragments of this document that were cited, in citation order
    pub chunk_ids: Vec<String>,
}

/// Deduplicate citations by document, keeping first-occurrence order
#[must_use]
pub fn aggregate_citations(citations: &[Citation]) -> Vec<SourceDocument> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut documents: Vec<SourceDocument> = Vec::new();

    for citation in citations {
        let name = citation
            .document_name
            .as_deref()
            .filter(|name| !name.is_empty());

        if let Some(&index) = positions.get(citation.document_id.as_str()) {
            let document = &mut documents[index];
            if document.document_name == document.document_id {
                if let Some(name) = name {
                    document.document_name = name.to_string();
                }
            }
            if !citation.chunk_id.is_empty() {
                document.chunk_ids.push(citation.chunk_id.clone());
            }
            continue;
        }

        positions.insert(&citation.document_id, documents.len());
        documents.push(SourceDocument {
            document_id: citation.document_id.clone(),
            document_name: name.unwrap_or(&citation.document_id).to_string(),
            chunk_ids: if citation.chunk_id.is_empty() {
                Vec::new()
            } else {
                vec![citation.chunk_id.clone()]
            },
        });
    }

    documents
}

/// Display names of the cited documents, in first-occurrence order
#[must_use]
pub fn source_names(citations: &[Citation]) -> Vec<String> {
    aggregate_citations(citations)
        .into_iter()
        .map(|document| document.document_name)
        .collect()
}
