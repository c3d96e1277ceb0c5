//! In-process content store backed by a JSON fixture.
//!
//! Implements the content, domain and redirect collaborators of the
//! pipeline. The fixture is loaded once and never mutated.

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    application::repos::{ContentRepo, DomainRepo, RedirectRepo, RepoError},
    domain::{content::ContentNode, culture::Culture, domains::DomainRecord},
};

use super::error::InfraError;

const MAX_TREE_DEPTH: usize = 64;

/// Serialized form of a content tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentFixture {
    pub default_culture: Option<Culture>,
    pub domains: Vec<DomainRecord>,
    /// Nodes in sort order.
    pub content: Vec<ContentNode>,
    /// Inbound redirects, oldest first.
    pub redirects: Vec<RedirectRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectRecord {
    /// `{site_id}{path}` without trailing slash, e.g. `1/old-page`.
    pub route: String,
    pub destination_id: i64,
}

#[derive(Debug, Default)]
pub struct MemoryContentStore {
    fixture: ContentFixture,
    index: HashMap<i64, usize>,
}

impl MemoryContentStore {
    pub fn from_fixture(fixture: ContentFixture) -> Result<Self, InfraError> {
        let mut index = HashMap::with_capacity(fixture.content.len());
        for (position, node) in fixture.content.iter().enumerate() {
            if index.insert(node.id, position).is_some() {
                return Err(InfraError::configuration(format!(
                    "content fixture contains duplicate node id {}",
                    node.id
                )));
            }
        }
        Ok(Self { fixture, index })
    }

    pub fn from_json(json: &str) -> Result<Self, InfraError> {
        let fixture: ContentFixture = serde_json::from_str(json).map_err(|err| {
            InfraError::configuration(format!("invalid content fixture: {err}"))
        })?;
        Self::from_fixture(fixture)
    }

    pub async fn load(path: &Path) -> Result<Self, InfraError> {
        let data = tokio::fs::read_to_string(path).await?;
        Self::from_json(&data)
    }

    pub fn node_count(&self) -> usize {
        self.fixture.content.len()
    }

    fn node(&self, id: i64) -> Option<&ContentNode> {
        self.index
            .get(&id)
            .and_then(|position| self.fixture.content.get(*position))
    }

    fn published(&self, id: i64) -> Option<&ContentNode> {
        self.node(id).filter(|node| node.published)
    }

    /// Id of the root above `node`, following published parents only.
    fn site_of(&self, node: &ContentNode) -> Option<i64> {
        let mut current = node;
        for _ in 0..MAX_TREE_DEPTH {
            if current.is_root() {
                return Some(current.id);
            }
            current = self.published(current.parent_id)?;
        }
        None
    }
}

fn normalize_route(route: &str) -> String {
    let trimmed = route.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_prefix('/').unwrap_or(trimmed);
    format!("/{}", trimmed.to_ascii_lowercase())
}

#[async_trait]
impl ContentRepo for MemoryContentStore {
    async fn get_content_by_id(&self, id: i64) -> Result<Option<ContentNode>, RepoError> {
        Ok(self.published(id).cloned())
    }

    async fn get_preview_content_by_id(&self, id: i64) -> Result<Option<ContentNode>, RepoError> {
        Ok(self.node(id).cloned())
    }

    async fn get_content_by_route(
        &self,
        site_id: i64,
        path: &str,
        culture: Option<&Culture>,
    ) -> Result<Option<ContentNode>, RepoError> {
        let wanted = normalize_route(path);
        let candidates: Vec<&ContentNode> = self
            .fixture
            .content
            .iter()
            .filter(|node| node.published)
            .filter(|node| normalize_route(node.route()) == wanted)
            .filter(|node| self.site_of(node) == Some(site_id))
            .collect();

        let matched = culture
            .and_then(|culture| {
                candidates
                    .iter()
                    .find(|node| node.culture.as_ref() == Some(culture))
            })
            .or_else(|| candidates.first());

        Ok(matched.map(|node| (*node).clone()))
    }

    async fn get_children(&self, id: i64) -> Result<Vec<ContentNode>, RepoError> {
        Ok(self
            .fixture
            .content
            .iter()
            .filter(|node| node.published && node.parent_id == id && node.id != id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DomainRepo for MemoryContentStore {
    async fn get_assigned_domains(&self, node_id: i64) -> Result<Vec<DomainRecord>, RepoError> {
        Ok(self
            .fixture
            .domains
            .iter()
            .filter(|domain| domain.content_id == node_id && !domain.is_wildcard)
            .cloned()
            .collect())
    }

    async fn get_all_domains(
        &self,
        include_wildcards: bool,
    ) -> Result<Vec<DomainRecord>, RepoError> {
        Ok(self
            .fixture
            .domains
            .iter()
            .filter(|domain| include_wildcards || !domain.is_wildcard)
            .cloned()
            .collect())
    }

    async fn is_published(&self, domain: &DomainRecord) -> Result<bool, RepoError> {
        Ok(self.published(domain.content_id).is_some())
    }

    async fn find_domain_by_name(&self, name: &str) -> Result<Option<DomainRecord>, RepoError> {
        let name = name.trim().trim_end_matches('/');
        Ok(self
            .fixture
            .domains
            .iter()
            .filter(|domain| !domain.is_wildcard)
            .find(|domain| domain.name.trim().trim_end_matches('/').eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn default_culture(&self) -> Result<Option<Culture>, RepoError> {
        Ok(self.fixture.default_culture.clone())
    }
}

#[async_trait]
impl RedirectRepo for MemoryContentStore {
    async fn get_most_recent_redirect(&self, route: &str) -> Result<Option<i64>, RepoError> {
        Ok(self
            .fixture
            .redirects
            .iter()
            .rev()
            .find(|redirect| redirect.route.eq_ignore_ascii_case(route))
            .map(|redirect| redirect.destination_id))
    }
}
