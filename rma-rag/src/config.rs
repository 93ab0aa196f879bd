//! Configuration for the query pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default number of chunks returned by a query.
pub const DEFAULT_TOP_K: usize = 5;
/// Default minimum similarity a chunk must strictly exceed.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;
/// Default embedding dimensionality (`nomic-embed-text`).
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;

/// Settings for multi-query retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReformulationConfig {
    /// Whether the retriever asks the generation provider for extra search queries.
    pub enabled: bool,
    /// Total number of search queries, the original question included.
    pub num_queries: usize,
}

impl Default for ReformulationConfig {
    fn default() -> Self {
        Self { enabled: false, num_queries: 3 }
    }
}

/// Configuration parameters for the query pipeline.
///
/// Deserializes from partial documents; missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Number of top results used when a query does not override it.
    pub top_k: usize,
    /// Minimum similarity used when a query does not override it.
    pub similarity_threshold: f32,
    /// Upper bound on the assembled context, in characters.
    pub max_context_chars: usize,
    /// Dimensionality `D` of every embedding vector.
    pub embedding_dimensions: usize,
    /// Timeout for one embedding call, in milliseconds.
    pub embed_timeout_ms: u64,
    /// Timeout for one vector search or scope lookup, in milliseconds.
    pub search_timeout_ms: u64,
    /// Timeout for one generation call, in milliseconds.
    pub generation_timeout_ms: u64,
    /// Maximum number of requests the pipeline serves concurrently.
    pub max_concurrent_requests: usize,
    /// Multi-query retrieval settings.
    pub reformulation: ReformulationConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_context_chars: 12_000,
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            embed_timeout_ms: 10_000,
            search_timeout_ms: 10_000,
            generation_timeout_ms: 60_000,
            max_concurrent_requests: 16,
            reformulation: ReformulationConfig::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Parse a configuration from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RagConfig = serde_json::from_str(json)
            .map_err(|e| RagError::ConfigError(format!("invalid configuration JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Timeout applied to each embedding call.
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }

    /// Timeout applied to each vector search and scope lookup.
    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    /// Timeout applied to each generation call.
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `top_k == 0`
    /// - `similarity_threshold` is outside `[0, 1)`
    /// - `max_context_chars`, `embedding_dimensions` or `max_concurrent_requests` is zero
    /// - `reformulation.num_queries == 0`
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if !(0.0..1.0).contains(&self.similarity_threshold) {
            return Err(RagError::ConfigError(format!(
                "similarity_threshold ({}) must be in [0, 1)",
                self.similarity_threshold
            )));
        }
        if self.max_context_chars == 0 {
            return Err(RagError::ConfigError(
                "max_context_chars must be greater than zero".to_string(),
            ));
        }
        if self.embedding_dimensions == 0 {
            return Err(RagError::ConfigError(
                "embedding_dimensions must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(RagError::ConfigError(
                "max_concurrent_requests must be greater than zero".to_string(),
            ));
        }
        if self.reformulation.num_queries == 0 {
            return Err(RagError::ConfigError(
                "reformulation.num_queries must be at least one".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the default number of results per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the default similarity threshold.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the context size bound in characters.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Set the embedding dimensionality.
    pub fn embedding_dimensions(mut self, dimensions: usize) -> Self {
        self.config.embedding_dimensions = dimensions;
        self
    }

    /// Set the embedding call timeout.
    pub fn embed_timeout(mut self, timeout: Duration) -> Self {
        self.config.embed_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the vector search and scope lookup timeout.
    pub fn search_timeout(mut self, timeout: Duration) -> Self {
        self.config.search_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the generation call timeout.
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.config.generation_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the number of requests served concurrently.
    pub fn max_concurrent_requests(mut self, limit: usize) -> Self {
        self.config.max_concurrent_requests = limit;
        self
    }

    /// Enable multi-query retrieval with the given total number of queries.
    pub fn reformulation(mut self, num_queries: usize) -> Self {
        self.config.reformulation = ReformulationConfig { enabled: true, num_queries };
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
