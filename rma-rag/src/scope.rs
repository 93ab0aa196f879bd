//! Project → document scope resolution.
//!
//! The project/document metadata store is an external collaborator. The
//! retriever consults a [`ScopeResolver`] to learn which documents a project
//! may search before building its [`ScopeFilter`](crate::ScopeFilter).

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;

use crate::error::Result;

/// Looks up the documents that belong to a project.
///
/// Implementations report lookup failures as
/// [`RagError::ScopeResolutionError`](crate::RagError::ScopeResolutionError).
/// A project without documents resolves to an empty set, which makes the
/// project-scoped search return nothing rather than fail.
#[async_trait]
pub trait ScopeResolver: Send + Sync {
    /// Return the ids of the documents `project_id` is allowed to search.
    async fn allowed_documents(&self, project_id: i64) -> Result<BTreeSet<String>>;
}

/// A [`ScopeResolver`] over a fixed project → documents table.
///
/// # Example
///
/// ```rust,ignore
/// use rma_rag::StaticScopeResolver;
///
/// let resolver = StaticScopeResolver::new()
///     .with_project(1, ["survey-design.pdf", "pilot-results.pdf"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticScopeResolver {
    projects: HashMap<i64, BTreeSet<String>>,
}

impl StaticScopeResolver {
    /// Create an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the documents of a project.
    pub fn with_project<I, S>(mut self, project_id: i64, document_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projects
            .entry(project_id)
            .or_default()
            .extend(document_ids.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl ScopeResolver for StaticScopeResolver {
    async fn allowed_documents(&self, project_id: i64) -> Result<BTreeSet<String>> {
        Ok(self.projects.get(&project_id).cloned().unwrap_or_default())
    }
}
