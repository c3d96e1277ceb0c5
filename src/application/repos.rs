//! Collaborator traits describing the content platform behind the pipeline.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{content::ContentNode, culture::Culture, domains::DomainRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("content store unavailable: {0}")]
    Unavailable(String),
}

impl RepoError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Published content lookups. Missing or unpublished nodes are `Ok(None)`.
#[async_trait]
pub trait ContentRepo: Send + Sync {
    async fn get_content_by_id(&self, id: i64) -> Result<Option<ContentNode>, RepoError>;

    /// Like [`ContentRepo::get_content_by_id`] but unpublished nodes are
    /// returned as well.
    async fn get_preview_content_by_id(&self, id: i64) -> Result<Option<ContentNode>, RepoError>;

    /// Resolve `path` below the site root `site_id`.
    async fn get_content_by_route(
        &self,
        site_id: i64,
        path: &str,
        culture: Option<&Culture>,
    ) -> Result<Option<ContentNode>, RepoError>;

    /// Published children of `id`, in sort order.
    async fn get_children(&self, id: i64) -> Result<Vec<ContentNode>, RepoError>;
}

#[async_trait]
pub trait DomainRepo: Send + Sync {
    /// Domains assigned directly to `node_id`, wildcards excluded.
    async fn get_assigned_domains(&self, node_id: i64) -> Result<Vec<DomainRecord>, RepoError>;

    async fn get_all_domains(&self, include_wildcards: bool)
    -> Result<Vec<DomainRecord>, RepoError>;

    /// Whether the node a domain is bound to is published.
    async fn is_published(&self, domain: &DomainRecord) -> Result<bool, RepoError>;

    /// Exact (case-insensitive) lookup by domain name, e.g. `a.com:8080`.
    async fn find_domain_by_name(&self, name: &str) -> Result<Option<DomainRecord>, RepoError>;

    async fn default_culture(&self) -> Result<Option<Culture>, RepoError>;
}

#[async_trait]
pub trait RedirectRepo: Send + Sync {
    /// Destination node id of the most recent redirect registered for
    /// `route` (`{site_id}{path}` without trailing slash).
    async fn get_most_recent_redirect(&self, route: &str) -> Result<Option<i64>, RepoError>;
}

/// Decides whether the presented identity may use preview mode.
#[async_trait]
pub trait AccessGate: Send + Sync {
    async fn is_authenticated(&self, identity: Option<&str>) -> bool;
}
