//! Deterministic fake collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rma_rag::{
    Chunk, EmbeddingProvider, GenerationProvider, RagConfig, RagError, Result, ScopeFilter,
    ScopeResolver, ScoredChunk, VectorStore,
};

pub const DIM: usize = 3;

/// A config whose embedding dimensionality matches the fakes.
pub fn config() -> RagConfig {
    RagConfig::builder().embedding_dimensions(DIM).build().unwrap()
}

pub fn textbook_chunk(id: &str, text: &str) -> Chunk {
    Chunk::new(id, text)
}

pub fn upload_chunk(id: &str, project_id: i64, document_id: &str) -> Chunk {
    Chunk::new(id, format!("uploaded passage {id}"))
        .with_project_id(project_id)
        .with_document_id(document_id)
}

pub fn scored(chunk: Chunk, similarity: f32) -> ScoredChunk {
    ScoredChunk { chunk, similarity }
}

// ── Embedding ──────────────────────────────────────────────────────

/// Returns the same vector for every text and records what it embedded.
#[derive(Default)]
pub struct RecordingEmbedder {
    pub texts: Mutex<Vec<String>>,
    pub vector_len: Option<usize>,
}

impl RecordingEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produce vectors of the wrong length.
    pub fn with_vector_len(len: usize) -> Self {
        Self { texts: Mutex::new(Vec::new()), vector_len: Some(len) }
    }

    pub fn embedded(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for RecordingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.texts.lock().unwrap().push(text.to_string());
        Ok(vec![1.0; self.vector_len.unwrap_or(DIM)])
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError { provider: "failing".into(), message: "connection refused".into() })
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

pub struct SlowEmbedder;

#[async_trait]
impl EmbeddingProvider for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(vec![1.0; DIM])
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

// ── Vector store ───────────────────────────────────────────────────

/// Serves fixed similarities per collection, honouring the scope filter and
/// limit like a real store.
#[derive(Default)]
pub struct ScriptedStore {
    hits: HashMap<String, Vec<ScoredChunk>>,
    pub searches: Mutex<Vec<(String, ScopeFilter, usize)>>,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hits(mut self, collection: &str, hits: Vec<ScoredChunk>) -> Self {
        self.hits.entry(collection.to_string()).or_default().extend(hits);
        self
    }

    pub fn search_log(&self) -> Vec<(String, ScopeFilter, usize)> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorStore for ScriptedStore {
    async fn create_collection(&self, _name: &str, _dimensions: usize) -> Result<()> {
        Ok(())
    }

    async fn delete_collection(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, _collection: &str, _chunks: &[Chunk]) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _collection: &str, _ids: &[&str]) -> Result<()> {
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        _embedding: &[f32],
        filter: &ScopeFilter,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        self.searches.lock().unwrap().push((collection.to_string(), filter.clone(), limit));
        let mut hits: Vec<ScoredChunk> = self
            .hits
            .get(collection)
            .map(|hits| hits.iter().filter(|h| filter.matches(&h.chunk)).cloned().collect())
            .unwrap_or_default();
        hits.sort_by(|a, b| {
            b.similarity.total_cmp(&a.similarity).then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

pub struct FailingStore;

#[async_trait]
impl VectorStore for FailingStore {
    async fn create_collection(&self, _name: &str, _dimensions: usize) -> Result<()> {
        Ok(())
    }

    async fn delete_collection(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, _collection: &str, _chunks: &[Chunk]) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _collection: &str, _ids: &[&str]) -> Result<()> {
        Ok(())
    }

    async fn search(
        &self,
        _collection: &str,
        _embedding: &[f32],
        _filter: &ScopeFilter,
        _limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        Err(RagError::StoreUnavailable { backend: "failing".into(), message: "connection reset".into() })
    }
}

pub struct SlowStore;

#[async_trait]
impl VectorStore for SlowStore {
    async fn create_collection(&self, _name: &str, _dimensions: usize) -> Result<()> {
        Ok(())
    }

    async fn delete_collection(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, _collection: &str, _chunks: &[Chunk]) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _collection: &str, _ids: &[&str]) -> Result<()> {
        Ok(())
    }

    async fn search(
        &self,
        _collection: &str,
        _embedding: &[f32],
        _filter: &ScopeFilter,
        _limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Vec::new())
    }
}

// ── Scope ──────────────────────────────────────────────────────────

pub struct FailingResolver;

#[async_trait]
impl ScopeResolver for FailingResolver {
    async fn allowed_documents(&self, _project_id: i64) -> Result<BTreeSet<String>> {
        Err(RagError::StoreUnavailable { backend: "projects-db".into(), message: "timeout".into() })
    }
}

// ── Generation ─────────────────────────────────────────────────────

/// Replies with a fixed text and records every prompt.
pub struct ScriptedGenerator {
    reply: String,
    pub prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn replying(reply: &str) -> Self {
        Self { reply: reply.to_string(), prompts: Mutex::new(Vec::new()), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub struct FailingGenerator;

#[async_trait]
impl GenerationProvider for FailingGenerator {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(RagError::GenerationError { provider: "failing".into(), message: "rate limited".into() })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

pub struct SlowGenerator;

#[async_trait]
impl GenerationProvider for SlowGenerator {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("too late".to_string())
    }

    fn name(&self) -> &str {
        "slow"
    }
}
