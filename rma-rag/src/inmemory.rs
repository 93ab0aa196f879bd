//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `HashMap` protected by a `tokio::sync::RwLock`. It is suitable for
//! development, tests, and small corpora such as a single textbook.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::document::{Chunk, ScoredChunk, rank_order};
use crate::error::{RagError, Result};
use crate::query::ScopeFilter;
use crate::vectorstore::VectorStore;

/// An in-memory vector store using cosine similarity for search.
///
/// Collections are stored as nested `HashMap`s: collection name → chunk ID → chunk.
/// All operations are async-safe via `tokio::sync::RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, HashMap<String, Chunk>>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks in a collection, or `None` if it does not exist.
    pub async fn len(&self, collection: &str) -> Option<usize> {
        self.collections.read().await.get(collection).map(HashMap::len)
    }

    fn missing(collection: &str) -> RagError {
        RagError::StoreUnavailable {
            backend: "InMemory".to_string(),
            message: format!("collection '{collection}' does not exist"),
        }
    }
}

/// Compute cosine similarity (`1 - cosine_distance`) between two vectors.
///
/// Returns `None` when the dimensions differ and `0.0` if either vector has
/// zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    Some(dot / (norm_a * norm_b))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, _dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;
        for chunk in chunks {
            store.insert(chunk.id.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;
        for id in ids {
            store.remove(*id);
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        filter: &ScopeFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| Self::missing(collection))?;

        let mut scored: Vec<ScoredChunk> = store
            .values()
            .filter(|chunk| filter.matches(chunk))
            .filter_map(|chunk| match cosine_similarity(&chunk.embedding, embedding) {
                Some(similarity) => Some(ScoredChunk { chunk: chunk.clone(), similarity }),
                None => {
                    warn!(
                        chunk.id = %chunk.id,
                        stored = chunk.embedding.len(),
                        query = embedding.len(),
                        "skipping chunk with mismatched embedding dimensions"
                    );
                    None
                }
            })
            .collect();

        scored.sort_by(rank_order);
        scored.truncate(limit);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, embedding: Vec<f32>) -> Chunk {
        Chunk::new(id, format!("text of {id}")).with_embedding(embedding)
    }

    #[test]
    fn cosine_similarity_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
    }

    #[tokio::test]
    async fn search_on_missing_collection_is_store_unavailable() {
        let store = InMemoryVectorStore::new();
        let err =
            store.search("nope", &[1.0], &ScopeFilter::unrestricted(), 3).await.unwrap_err();
        assert!(matches!(err, RagError::StoreUnavailable { .. }));
    }

    #[tokio::test]
    async fn search_applies_filter_and_limit() {
        let store = InMemoryVectorStore::new();
        store.create_collection("sources", 2).await.unwrap();
        store
            .upsert(
                "sources",
                &[
                    chunk("a", vec![1.0, 0.0]).with_project_id(1).with_document_id("d1"),
                    chunk("b", vec![0.9, 0.1]).with_project_id(1).with_document_id("d2"),
                    chunk("c", vec![1.0, 0.0]).with_project_id(2).with_document_id("d3"),
                ],
            )
            .await
            .unwrap();

        let filter = ScopeFilter { project_id: Some(1), document_ids: None };
        let hits = store.search("sources", &[1.0, 0.0], &filter, 10).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let hits = store.search("sources", &[1.0, 0.0], &filter, 1).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn mismatched_dimensions_are_skipped() {
        let store = InMemoryVectorStore::new();
        store.create_collection("book", 2).await.unwrap();
        store
            .upsert("book", &[chunk("short", vec![1.0]), chunk("ok", vec![1.0, 0.0])])
            .await
            .unwrap();
        let hits =
            store.search("book", &[1.0, 0.0], &ScopeFilter::unrestricted(), 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.id, "ok");
        assert_eq!(store.len("book").await, Some(2));
    }

    #[tokio::test]
    async fn delete_removes_chunks() {
        let store = InMemoryVectorStore::new();
        store.create_collection("book", 2).await.unwrap();
        store.upsert("book", &[chunk("a", vec![1.0, 0.0])]).await.unwrap();
        store.delete("book", &["a"]).await.unwrap();
        assert_eq!(store.len("book").await, Some(0));
        store.delete_collection("book").await.unwrap();
        assert_eq!(store.len("book").await, None);
    }
}
