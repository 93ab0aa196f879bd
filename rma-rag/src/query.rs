//! Query and scope filter types.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TOP_K, RagConfig};
use crate::document::Chunk;
use crate::error::{RagError, Result};

/// A user question plus its retrieval scope. Created per request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Query {
    /// The question text.
    pub text: String,
    /// Restrict retrieval to chunks tagged with this project.
    #[serde(default)]
    pub project_id: Option<i64>,
    /// Further restrict retrieval to these documents.
    #[serde(default)]
    pub selected_document_ids: Option<BTreeSet<String>>,
    /// Maximum number of chunks to return.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Chunks must have a similarity strictly above this value.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Free-text description of the research project, used to tailor the answer.
    #[serde(default)]
    pub project_info: Option<String>,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_similarity_threshold() -> f32 {
    DEFAULT_SIMILARITY_THRESHOLD
}

impl Query {
    /// Create an unscoped query with `top_k = 5` and a threshold of `0.5`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            project_id: None,
            selected_document_ids: None,
            top_k: DEFAULT_TOP_K,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            project_info: None,
        }
    }

    /// Create an unscoped query using the defaults from `config`.
    pub fn from_config(text: impl Into<String>, config: &RagConfig) -> Self {
        Self::new(text).with_top_k(config.top_k).with_similarity_threshold(config.similarity_threshold)
    }

    /// Restrict to a project.
    pub fn with_project(mut self, project_id: i64) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Restrict to a set of documents.
    pub fn with_documents<I, S>(mut self, document_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_document_ids = Some(document_ids.into_iter().map(Into::into).collect());
        self
    }

    /// Set the maximum number of results.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the similarity threshold.
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Attach a description of the research project.
    pub fn with_project_info(mut self, info: impl Into<String>) -> Self {
        self.project_info = Some(info.into());
        self
    }

    /// Check the input constraints.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidQuery`] if the text is blank, `top_k` is zero
    /// or the threshold is outside `[0, 1)`.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(RagError::InvalidQuery("query text must not be empty".to_string()));
        }
        if self.top_k == 0 {
            return Err(RagError::InvalidQuery("top_k must be at least 1".to_string()));
        }
        if !(0.0..1.0).contains(&self.similarity_threshold) {
            return Err(RagError::InvalidQuery(format!(
                "similarity_threshold ({}) must be in [0, 1)",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

/// Store-level restriction on which chunks are eligible for a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeFilter {
    /// Only chunks tagged with this project.
    pub project_id: Option<i64>,
    /// Only chunks whose `metadata.document_id` is in this set.
    pub document_ids: Option<BTreeSet<String>>,
}

impl ScopeFilter {
    /// A filter that admits every chunk.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Whether the filter admits every chunk.
    pub fn is_unrestricted(&self) -> bool {
        self.project_id.is_none() && self.document_ids.is_none()
    }

    /// Whether `chunk` falls inside the scope.
    pub fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(project_id) = self.project_id {
            if chunk.scope_project_id() != Some(project_id) {
                return false;
            }
        }
        if let Some(document_ids) = &self.document_ids {
            match chunk.document_id() {
                Some(id) if document_ids.contains(id) => {}
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_query_uses_documented_defaults() {
        let query = Query::new("What is a case study?");
        assert_eq!(query.top_k, 5);
        assert_eq!(query.similarity_threshold, 0.5);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_input() {
        assert!(matches!(Query::new("   ").validate(), Err(RagError::InvalidQuery(_))));
        assert!(Query::new("q").with_top_k(0).validate().is_err());
        assert!(Query::new("q").with_similarity_threshold(1.0).validate().is_err());
        assert!(Query::new("q").with_similarity_threshold(0.0).validate().is_ok());
    }

    #[test]
    fn deserializes_with_default_limits() {
        let query: Query = serde_json::from_str(r#"{"text":"What is triangulation?","project_id":4}"#).unwrap();
        assert_eq!(query.top_k, 5);
        assert_eq!(query.similarity_threshold, 0.5);
        assert_eq!(query.project_id, Some(4));
        assert_eq!(query.selected_document_ids, None);
    }

    #[test]
    fn from_config_copies_defaults() {
        let config = RagConfig::builder().top_k(9).similarity_threshold(0.3).build().unwrap();
        let query = Query::from_config("q", &config);
        assert_eq!(query.top_k, 9);
        assert_eq!(query.similarity_threshold, 0.3);
    }

    #[test]
    fn filter_matches_project_and_documents() {
        let chunk = Chunk::new("1", "t").with_project_id(3).with_document_id("paper-a");
        let textbook = Chunk::new("2", "t").with_document_id("book");

        assert!(ScopeFilter::unrestricted().matches(&chunk));
        assert!(ScopeFilter::unrestricted().matches(&textbook));

        let by_project = ScopeFilter { project_id: Some(3), document_ids: None };
        assert!(by_project.matches(&chunk));
        assert!(!by_project.matches(&textbook));

        let by_document = ScopeFilter {
            project_id: Some(3),
            document_ids: Some(BTreeSet::from(["paper-b".to_string()])),
        };
        assert!(!by_document.matches(&chunk));
    }

    #[test]
    fn empty_document_set_matches_nothing() {
        let filter = ScopeFilter { project_id: None, document_ids: Some(BTreeSet::new()) };
        assert!(!filter.matches(&Chunk::new("1", "t").with_document_id("a")));
    }
}
