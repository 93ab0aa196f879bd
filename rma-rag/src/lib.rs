//! # rma-rag
//!
//! Retrieval-augmented query pipeline for the Research Methodology Assistant.
//!
//! ## Overview
//!
//! A user question is answered in four stages:
//!
//! 1. **Retrieve** – embed the question and search the textbook and the
//!    project's uploaded sources ([`Retriever`]).
//! 2. **Assemble** – concatenate the ranked passages under a character
//!    budget ([`assemble`]).
//! 3. **Generate** – prompt the language model with context, history and
//!    the question ([`AnswerGenerator`]).
//! 4. **Classify** – optionally map a recommendation answer to a
//!    [`MethodologyLabel`] ([`classify`]).
//!
//! [`RagPipeline`] wires the stages together. Backends plug in through the
//! [`EmbeddingProvider`], [`VectorStore`], [`GenerationProvider`] and
//! [`ScopeResolver`] traits.
//!
//! ## Features
//!
//! | Feature | Adds |
//! |---------|------|
//! | `openai` | [`openai::OpenAIEmbeddingProvider`], [`openai::OpenAIGenerationProvider`] |
//! | `gemini` | [`gemini::GeminiGenerationProvider`] |
//! | `ollama` | [`ollama::OllamaEmbeddingProvider`] |
//! | `pgvector` | [`pgvector::PgVectorStore`] |
//! | `full` | all of the above |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rma_rag::{InMemoryVectorStore, Query, RagConfig, RagPipeline, Source};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .generation_provider(Arc::new(llm))
//!     .source(Source::shared("textbook", "book_chunks"))
//!     .build()?;
//!
//! let answer = pipeline.answer_query(&Query::new("What is a cohort study?"), &[]).await?;
//! ```

pub mod classifier;
pub mod config;
pub mod context;
pub mod conversation;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod inmemory;
pub mod pipeline;
pub mod query;
pub mod reformulation;
pub mod retriever;
pub mod scope;
mod timeout;
pub mod vectorstore;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pgvector")]
pub mod pgvector;

pub use classifier::{MethodologyLabel, classify};
pub use config::{RagConfig, RagConfigBuilder, ReformulationConfig};
pub use context::{CONTEXT_DELIMITER, ContextAssembler, assemble};
pub use conversation::{ConversationTurn, GeneratedAnswer, GroundedAnswer, Role};
pub use document::{Chunk, RetrievalResult, ScoredChunk};
pub use embedding::EmbeddingProvider;
pub use error::{FailureStage, RagError, Result};
pub use generation::{AnswerGenerator, GenerationProvider, build_prompt};
pub use inmemory::{InMemoryVectorStore, cosine_similarity};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use query::{Query, ScopeFilter};
pub use reformulation::QueryReformulator;
pub use retriever::{Retriever, Source, SourceScope};
pub use scope::{ScopeResolver, StaticScopeResolver};
pub use vectorstore::VectorStore;
