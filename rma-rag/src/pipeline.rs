//! Query pipeline orchestrator.
//!
//! The [`RagPipeline`] wires retrieval → context assembly → generation →
//! (optional) methodology classification. It holds no per-request state and
//! can serve many concurrent requests behind an `Arc`, bounded by
//! `max_concurrent_requests`.
//!
//! # Example
//!
//! ```rust,ignore
//! use rma_rag::{InMemoryVectorStore, Query, RagConfig, RagPipeline, Source};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .generation_provider(Arc::new(my_llm))
//!     .source(Source::shared("textbook", "book_chunks"))
//!     .source(Source::project_scoped("uploads", "sources"))
//!     .build()?;
//!
//! let query = Query::new("Which design fits my study?").with_project(12);
//! let (answer, label) = pipeline.answer_and_classify(&query, &history).await?;
//! ```

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, info_span, warn};

use crate::classifier::{MethodologyLabel, classify};
use crate::config::RagConfig;
use crate::context::assemble;
use crate::conversation::{ConversationTurn, GeneratedAnswer, GroundedAnswer};
use crate::document::RetrievalResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{AnswerGenerator, GenerationProvider};
use crate::query::Query;
use crate::reformulation::QueryReformulator;
use crate::retriever::{Retriever, Source};
use crate::scope::ScopeResolver;
use crate::vectorstore::VectorStore;

/// Collection searched when no source is configured explicitly.
pub const DEFAULT_COLLECTION: &str = "sources";

/// The query pipeline orchestrator. Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    retriever: Retriever,
    generator: AnswerGenerator,
    permits: Semaphore,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the retriever.
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Retrieve passages for `query` without generating an answer.
    pub async fn retrieve(&self, query: &Query) -> Result<RetrievalResult> {
        let _permit = self.acquire().await?;
        self.retriever.retrieve(query).await
    }

    /// Answer `query` given prior conversation turns.
    ///
    /// # Errors
    ///
    /// Retrieval failures (`EmbeddingError`, `StoreUnavailable`,
    /// `ScopeResolutionError`) are returned as-is and the generator is never
    /// called. Generation failures surface as `GenerationError`.
    pub async fn answer_query(
        &self,
        query: &Query,
        history: &[ConversationTurn],
    ) -> Result<GeneratedAnswer> {
        Ok(self.answer_with_sources(query, history).await?.answer)
    }

    /// Answer `query` and classify the answer into a methodology label.
    pub async fn answer_and_classify(
        &self,
        query: &Query,
        history: &[ConversationTurn],
    ) -> Result<(GeneratedAnswer, MethodologyLabel)> {
        let answer = self.answer_query(query, history).await?;
        let label = info_span!("rag.classify").in_scope(|| {
            let label = classify(&answer.text);
            info!(%label, "classified answer");
            label
        });
        Ok((answer, label))
    }

    /// Answer `query`, returning the retrieved passages alongside the answer.
    ///
    /// [`GroundedAnswer::is_grounded`] is `false` when no passage reached the
    /// prompt, either because none cleared the threshold or because the
    /// top-ranked one exceeds `max_context_chars`.
    pub async fn answer_with_sources(
        &self,
        query: &Query,
        history: &[ConversationTurn],
    ) -> Result<GroundedAnswer> {
        let _permit = self.acquire().await?;

        let retrieval = self
            .retriever
            .retrieve(query)
            .await
            .inspect_err(|e| error!(error = %e, "retrieval failed, not generating"))?;

        let context = info_span!("rag.assemble", chunks = retrieval.len()).in_scope(|| {
            let context = assemble(&retrieval, self.config.max_context_chars);
            if context.is_empty() && !retrieval.is_empty() {
                warn!(
                    max_context_chars = self.config.max_context_chars,
                    "top-ranked chunk exceeds the context budget"
                );
            }
            info!(context_chars = context.chars().count(), "assembled context");
            context
        });

        let answer = self
            .generator
            .generate_for_project(&context, history, &query.text, query.project_info.as_deref())
            .await?;

        let context_chars = context.chars().count();
        Ok(GroundedAnswer { answer, retrieval, context_chars })
    }

    async fn acquire(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.permits
            .acquire()
            .await
            .map_err(|_| RagError::ConfigError("pipeline request limiter is closed".to_string()))
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider`, `vector_store` and `generation_provider`
/// are required. Without any [`source`](RagPipelineBuilder::source) the
/// pipeline searches a single project-scoped [`DEFAULT_COLLECTION`].
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    scope_resolver: Option<Arc<dyn ScopeResolver>>,
    sources: Vec<Source>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the answer-generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Set the project → documents resolver.
    pub fn scope_resolver(mut self, resolver: Arc<dyn ScopeResolver>) -> Self {
        self.scope_resolver = Some(resolver);
        self
    }

    /// Add a source to search. Sources are searched in insertion order.
    pub fn source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing, the
    /// configuration is invalid, or the embedding provider's dimensionality
    /// differs from `config.embedding_dimensions`.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::ConfigError("generation_provider is required".to_string()))?;

        if embedding_provider.dimensions() != config.embedding_dimensions {
            return Err(RagError::ConfigError(format!(
                "embedding provider '{}' produces {} dimensions but config expects {}",
                embedding_provider.name(),
                embedding_provider.dimensions(),
                config.embedding_dimensions
            )));
        }

        let sources = if self.sources.is_empty() {
            vec![Source::project_scoped(DEFAULT_COLLECTION, DEFAULT_COLLECTION)]
        } else {
            self.sources
        };

        let mut retriever = Retriever::new(embedding_provider, vector_store, sources, &config)?;
        if let Some(resolver) = self.scope_resolver {
            retriever = retriever.with_scope_resolver(resolver);
        }
        if config.reformulation.enabled {
            retriever = retriever.with_reformulator(QueryReformulator::new(
                generation_provider.clone(),
                config.generation_timeout(),
            ));
        }

        let generator = AnswerGenerator::new(generation_provider, config.generation_timeout());
        let permits = Semaphore::new(config.max_concurrent_requests);

        Ok(RagPipeline { config, retriever, generator, permits })
    }
}
