//! Vector store trait for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{Chunk, ScoredChunk};
use crate::error::Result;
use crate::query::ScopeFilter;

/// A storage backend for chunk embeddings with cosine-similarity search.
///
/// Implementations manage named collections of [`Chunk`]s. The textbook and
/// the per-project uploaded sources typically live in separate collections.
/// Ingestion (an external collaborator) writes through
/// [`upsert`](VectorStore::upsert); the query pipeline only calls
/// [`search`](VectorStore::search).
///
/// Connectivity or query failures are reported as
/// [`RagError::StoreUnavailable`](crate::RagError::StoreUnavailable). A search
/// that matches nothing returns an empty `Vec`.
///
/// # Example
///
/// ```rust,ignore
/// use rma_rag::{InMemoryVectorStore, ScopeFilter, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("sources", 768).await?;
/// store.upsert("sources", &chunks).await?;
/// let hits = store.search("sources", &query_embedding, &ScopeFilter::unrestricted(), 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Upsert chunks into a collection. Chunks must have embeddings set.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Delete chunks by their IDs from a collection.
    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// Search for at most `limit` chunks inside `filter` most similar to `embedding`.
    ///
    /// Returns results ordered by descending similarity, where similarity is
    /// `1 - cosine_distance`.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        filter: &ScopeFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>>;
}
