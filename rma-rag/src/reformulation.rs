//! Query reformulation for multi-query retrieval.
//!
//! A single phrasing of a question often misses passages that use different
//! vocabulary. The [`QueryReformulator`] asks the generation provider for
//! alternative search queries and for one synthesis-oriented query aimed at
//! reviews and meta-analyses. Reformulation is best-effort: any provider
//! failure degrades to the original question.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::timeout::bounded;

/// Minimum length of a usable synthesis query.
const MIN_SYNTHESIS_LEN: usize = 10;

/// Generates alternative search queries with a [`GenerationProvider`].
#[derive(Clone)]
pub struct QueryReformulator {
    provider: Arc<dyn GenerationProvider>,
    timeout: Duration,
}

impl QueryReformulator {
    /// Create a reformulator with the given per-call timeout.
    pub fn new(provider: Arc<dyn GenerationProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Produce up to `num_queries` search queries for `question`.
    ///
    /// At most `num_queries - 1` generated lines are kept and the original
    /// question is always included. Never fails; a provider error yields
    /// `[question]`.
    pub async fn search_queries(
        &self,
        question: &str,
        num_queries: usize,
        project_info: Option<&str>,
    ) -> Vec<String> {
        let num_queries = num_queries.max(1);
        if num_queries == 1 {
            return vec![question.to_string()];
        }

        let prompt = search_queries_prompt(question, num_queries, project_info);
        let response = match self.complete(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "query reformulation failed, using the original question");
                return vec![question.to_string()];
            }
        };

        let queries = parse_search_queries(&response, question, num_queries);
        info!(query_count = queries.len(), "generated search queries");
        queries
    }

    /// Produce one query aimed at overviews, reviews and meta-analyses.
    ///
    /// Falls back to a boolean review query when the provider fails or
    /// returns something too short to be useful.
    pub async fn synthesis_query(&self, question: &str, project_info: Option<&str>) -> String {
        let prompt = synthesis_prompt(question, project_info);
        match self.complete(&prompt).await {
            Ok(response) if response.trim().chars().count() >= MIN_SYNTHESIS_LEN => {
                response.trim().to_string()
            }
            Ok(_) => fallback_synthesis_query(question),
            Err(e) => {
                warn!(error = %e, "synthesis query generation failed, using fallback");
                fallback_synthesis_query(question)
            }
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let provider = self.provider.name().to_string();
        bounded(self.timeout, self.provider.complete(prompt), |limit| RagError::GenerationError {
            provider,
            message: format!("reformulation timed out after {limit:?}"),
        })
        .await
    }
}

fn project_context(project_info: Option<&str>) -> String {
    match project_info.map(str::trim).filter(|info| !info.is_empty()) {
        Some(info) => format!("\nProject context:\n{info}\n"),
        None => String::new(),
    }
}

fn search_queries_prompt(question: &str, num_queries: usize, project_info: Option<&str>) -> String {
    format!(
        "I need to search for information to answer this question:\n\"{question}\"\n{}\n\
         Generate {num_queries} different search queries that would help find relevant information.\n\
         The queries should cover different aspects of the question, use different keywords or \
         phrasings, be specific, and match the project context if one is given.\n\
         Return only the {num_queries} search queries, one per line, without numbering or \
         additional text.",
        project_context(project_info)
    )
}

fn synthesis_prompt(question: &str, project_info: Option<&str>) -> String {
    format!(
        "I need to synthesize multiple sources about:\n\"{question}\"\n{}\n\
         Generate one search query that would find overviews of the topic, comparative \
         information, meta-analyses or literature reviews, and different perspectives.\n\
         Return only the search query, without any additional text.",
        project_context(project_info)
    )
}

/// Split a provider response into search queries.
pub(crate) fn parse_search_queries(response: &str, question: &str, num_queries: usize) -> Vec<String> {
    let mut queries: Vec<String> = response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(num_queries.saturating_sub(1))
        .map(str::to_string)
        .collect();
    if !queries.iter().any(|q| q == question) {
        queries.push(question.to_string());
    }
    queries.truncate(num_queries);
    queries
}

/// Boolean review query used when the provider cannot supply one.
pub(crate) fn fallback_synthesis_query(question: &str) -> String {
    format!("(review OR meta-analysis OR \"systematic review\") AND ({question})")
}
