//! Data types for chunks and retrieval results.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A passage of source text with its embedding, produced by ingestion.
///
/// The core never mutates chunks; it only reads them back from a
/// [`VectorStore`](crate::VectorStore).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk.
    pub id: String,
    /// The chunk text as extracted from the source.
    pub raw_text: String,
    /// The chunk text annotated with surrounding context, when ingestion produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enriched_text: Option<String>,
    /// The vector embedding for this chunk's text.
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Metadata such as `document_id`, `page` and `chunk_index`.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    /// The project this chunk belongs to. Textbook chunks have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
}

impl Chunk {
    /// Create a chunk with the given id and raw text.
    pub fn new(id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_text: raw_text.into(),
            enriched_text: None,
            embedding: Vec::new(),
            metadata: HashMap::new(),
            project_id: None,
        }
    }

    /// Set the context-enriched text.
    pub fn with_enriched_text(mut self, text: impl Into<String>) -> Self {
        self.enriched_text = Some(text.into());
        self
    }

    /// Set the embedding vector.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    /// Tag the chunk with its parent document.
    pub fn with_document_id(self, document_id: impl Into<String>) -> Self {
        self.with_metadata("document_id", Value::String(document_id.into()))
    }

    /// Tag the chunk with its owning project.
    pub fn with_project_id(mut self, project_id: i64) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Insert a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The parent document id from `metadata.document_id`.
    pub fn document_id(&self) -> Option<&str> {
        self.metadata.get("document_id").and_then(Value::as_str)
    }

    /// The owning project, falling back to `metadata.project_id` for chunks
    /// written before the column existed.
    pub fn scope_project_id(&self) -> Option<i64> {
        self.project_id.or_else(|| self.metadata.get("project_id").and_then(Value::as_i64))
    }

    /// The text used for grounding: enriched text when present and non-empty.
    pub fn context_text(&self) -> &str {
        match self.enriched_text.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => &self.raw_text,
        }
    }
}

/// A retrieved [`Chunk`] paired with its similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// `1 - cosine_distance` between the chunk and the query.
    pub similarity: f32,
}

/// Order by similarity descending, then by chunk id ascending.
pub(crate) fn rank_order(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    b.similarity.total_cmp(&a.similarity).then_with(|| a.chunk.id.cmp(&b.chunk.id))
}

/// The ranked outcome of a retrieval.
///
/// Entries are sorted by similarity descending with ties broken by chunk id,
/// every similarity is strictly above the query threshold, and there are at
/// most `top_k` entries. An empty result is a valid outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RetrievalResult {
    entries: Vec<ScoredChunk>,
}

impl RetrievalResult {
    /// A result with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a result from unordered candidates, applying the threshold,
    /// ranking and `top_k` bound.
    pub fn from_candidates(
        candidates: impl IntoIterator<Item = ScoredChunk>,
        similarity_threshold: f32,
        top_k: usize,
    ) -> Self {
        let mut entries: Vec<ScoredChunk> =
            candidates.into_iter().filter(|c| c.similarity > similarity_threshold).collect();
        entries.sort_by(rank_order);
        entries.truncate(top_k);
        Self { entries }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no chunk cleared the threshold.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in rank order.
    pub fn iter(&self) -> std::slice::Iter<'_, ScoredChunk> {
        self.entries.iter()
    }

    /// Entries in rank order.
    pub fn entries(&self) -> &[ScoredChunk] {
        &self.entries
    }

    /// Similarities in rank order.
    pub fn similarities(&self) -> Vec<f32> {
        self.entries.iter().map(|e| e.similarity).collect()
    }

    /// Consume the result, returning its entries.
    pub fn into_entries(self) -> Vec<ScoredChunk> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a ScoredChunk;
    type IntoIter = std::slice::Iter<'a, ScoredChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
