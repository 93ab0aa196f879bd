//! Scoped similarity retrieval over one or more sources.
//!
//! The [`Retriever`] embeds a question, searches every configured [`Source`]
//! with the query's scope filter, merges the hits and applies the threshold,
//! ranking and `top_k` invariants of [`RetrievalResult`].

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, error, info, info_span};

use crate::config::RagConfig;
use crate::document::{RetrievalResult, ScoredChunk};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::query::{Query, ScopeFilter};
use crate::reformulation::QueryReformulator;
use crate::scope::ScopeResolver;
use crate::timeout::bounded;
use crate::vectorstore::VectorStore;

/// How a source applies the query scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceScope {
    /// Shared by every project (the textbook); project scope is not applied,
    /// an explicit document selection is.
    Shared,
    /// Project and document filters apply (uploaded sources).
    ProjectScoped,
}

/// A named collection the retriever searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Name used in logs.
    pub name: String,
    /// Vector store collection holding the chunks.
    pub collection: String,
    /// Whether query scope filters apply.
    pub scope: SourceScope,
}

impl Source {
    /// A source shared by all projects.
    pub fn shared(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self { name: name.into(), collection: collection.into(), scope: SourceScope::Shared }
    }

    /// A source filtered by project and document scope.
    pub fn project_scoped(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self { name: name.into(), collection: collection.into(), scope: SourceScope::ProjectScoped }
    }
}

/// Fetches the chunks most similar to a query.
///
/// Read-only and stateless between calls; share it behind an `Arc`.
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    sources: Vec<Source>,
    scope_resolver: Option<Arc<dyn ScopeResolver>>,
    reformulator: Option<QueryReformulator>,
    num_queries: usize,
    dimensions: usize,
    embed_timeout: Duration,
    search_timeout: Duration,
}

impl Retriever {
    /// Create a retriever over `sources`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `sources` is empty.
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        sources: Vec<Source>,
        config: &RagConfig,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(RagError::ConfigError("at least one source is required".to_string()));
        }
        Ok(Self {
            embedding_provider,
            vector_store,
            sources,
            scope_resolver: None,
            reformulator: None,
            num_queries: config.reformulation.num_queries,
            dimensions: config.embedding_dimensions,
            embed_timeout: config.embed_timeout(),
            search_timeout: config.search_timeout(),
        })
    }

    /// Resolve project scopes through `resolver`.
    pub fn with_scope_resolver(mut self, resolver: Arc<dyn ScopeResolver>) -> Self {
        self.scope_resolver = Some(resolver);
        self
    }

    /// Run several reformulated searches per query.
    pub fn with_reformulator(mut self, reformulator: QueryReformulator) -> Self {
        self.reformulator = Some(reformulator);
        self
    }

    /// The configured sources.
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Retrieve the chunks most similar to `query`.
    ///
    /// An empty result (no chunk clears the threshold, or the scope matches
    /// nothing) is not an error.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidQuery`] if the query violates its constraints
    /// - [`RagError::EmbeddingError`] if embedding fails or times out
    /// - [`RagError::StoreUnavailable`] if a search fails or times out
    /// - [`RagError::ScopeResolutionError`] if the project scope cannot be resolved
    pub async fn retrieve(&self, query: &Query) -> Result<RetrievalResult> {
        query.validate()?;
        let span = info_span!(
            "rag.retrieve",
            top_k = query.top_k,
            threshold = query.similarity_threshold,
            project_id = ?query.project_id
        );
        self.retrieve_validated(query).instrument(span).await
    }

    async fn retrieve_validated(&self, query: &Query) -> Result<RetrievalResult> {
        let (allowed_documents, embeddings) =
            tokio::try_join!(self.resolve_scope(query), self.embed_search_texts(query))?;
        let filter = scope_filter(query, allowed_documents);
        let shared = shared_filter(query);
        debug!(?filter, search_queries = embeddings.len(), "resolved scope");

        let mut best: HashMap<String, ScoredChunk> = HashMap::new();
        for embedding in &embeddings {
            self.search_sources(embedding, &filter, &shared, query.top_k, &mut best).await?;
        }
        let mut result =
            RetrievalResult::from_candidates(best.values().cloned(), query.similarity_threshold, query.top_k);

        if let Some(reformulator) = &self.reformulator {
            if result.len() < query.top_k {
                let synthesis =
                    reformulator.synthesis_query(&query.text, query.project_info.as_deref()).await;
                debug!(%synthesis, "topping up with synthesis query");
                let embedding = self.embed_all(&[synthesis.as_str()]).await?;
                self.search_sources(&embedding[0], &filter, &shared, query.top_k, &mut best).await?;
                result = RetrievalResult::from_candidates(
                    best.into_values(),
                    query.similarity_threshold,
                    query.top_k,
                );
            }
        }

        info!(result_count = result.len(), "retrieval completed");
        Ok(result)
    }

    async fn search_texts(&self, query: &Query) -> Vec<String> {
        match &self.reformulator {
            Some(reformulator) if self.num_queries > 1 => {
                reformulator
                    .search_queries(&query.text, self.num_queries, query.project_info.as_deref())
                    .await
            }
            _ => vec![query.text.clone()],
        }
    }

    async fn embed_search_texts(&self, query: &Query) -> Result<Vec<Vec<f32>>> {
        let search_texts = self.search_texts(query).await;
        let texts: Vec<&str> = search_texts.iter().map(String::as_str).collect();
        self.embed_all(&texts).await
    }

    async fn embed_all(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let provider = self.embedding_provider.name().to_string();
        let embeddings = bounded(self.embed_timeout, self.embedding_provider.embed_batch(texts), |limit| {
            RagError::EmbeddingError {
                provider: provider.clone(),
                message: format!("timed out after {limit:?}"),
            }
        })
        .await
        .inspect_err(|e| error!(error = %e, "query embedding failed"))?;

        if embeddings.len() != texts.len() {
            return Err(RagError::EmbeddingError {
                provider,
                message: format!("expected {} embeddings, got {}", texts.len(), embeddings.len()),
            });
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != self.dimensions) {
            error!(expected = self.dimensions, actual = bad.len(), "embedding dimension mismatch");
            return Err(RagError::EmbeddingError {
                provider,
                message: format!(
                    "expected {}-dimensional embedding, got {}",
                    self.dimensions,
                    bad.len()
                ),
            });
        }
        Ok(embeddings)
    }

    async fn resolve_scope(&self, query: &Query) -> Result<Option<BTreeSet<String>>> {
        let (Some(project_id), Some(resolver)) = (query.project_id, &self.scope_resolver) else {
            return Ok(None);
        };

        let allowed = bounded(self.search_timeout, resolver.allowed_documents(project_id), |limit| {
            RagError::ScopeResolutionError {
                project_id,
                message: format!("timed out after {limit:?}"),
            }
        })
        .await
        .map_err(|e| match e {
            e @ RagError::ScopeResolutionError { .. } => e,
            other => RagError::ScopeResolutionError { project_id, message: other.to_string() },
        })
        .inspect_err(|e| error!(project_id, error = %e, "scope resolution failed"))?;

        debug!(project_id, allowed = allowed.len(), "resolved project documents");
        Ok(Some(allowed))
    }

    async fn search_sources(
        &self,
        embedding: &[f32],
        filter: &ScopeFilter,
        shared: &ScopeFilter,
        limit: usize,
        best: &mut HashMap<String, ScoredChunk>,
    ) -> Result<()> {
        for source in &self.sources {
            let source_filter = match source.scope {
                SourceScope::Shared => shared,
                SourceScope::ProjectScoped => filter,
            };
            let hits = bounded(
                self.search_timeout,
                self.vector_store.search(&source.collection, embedding, source_filter, limit),
                |elapsed| RagError::StoreUnavailable {
                    backend: source.collection.clone(),
                    message: format!("search timed out after {elapsed:?}"),
                },
            )
            .await
            .inspect_err(|e| error!(source = %source.name, error = %e, "vector search failed"))?;

            debug!(source = %source.name, hits = hits.len(), "searched source");
            merge_hits(best, hits);
        }
        Ok(())
    }
}

/// Combine the query's selected documents with the project's allowed documents.
fn scope_filter(query: &Query, allowed_documents: Option<BTreeSet<String>>) -> ScopeFilter {
    let document_ids = match (query.selected_document_ids.clone(), allowed_documents) {
        (Some(selected), Some(allowed)) => Some(selected.intersection(&allowed).cloned().collect()),
        (Some(selected), None) => Some(selected),
        (None, allowed) => allowed,
    };
    ScopeFilter { project_id: query.project_id, document_ids }
}

/// Shared sources skip project tagging but honour an explicit document selection.
fn shared_filter(query: &Query) -> ScopeFilter {
    ScopeFilter { project_id: None, document_ids: query.selected_document_ids.clone() }
}

/// Keep the highest similarity seen for each chunk id.
fn merge_hits(best: &mut HashMap<String, ScoredChunk>, hits: Vec<ScoredChunk>) {
    for hit in hits {
        match best.get(&hit.chunk.id) {
            Some(existing) if existing.similarity >= hit.similarity => {}
            _ => {
                best.insert(hit.chunk.id.clone(), hit);
            }
        }
    }
}
