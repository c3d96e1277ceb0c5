//! Shaping content nodes into the wire sub-models.

use std::{future::Future, pin::Pin};

use spa_api_types::{ContentModel, NavigationItem, NavigationModel, SiteModel};

use crate::domain::{
    content::{ContentNode, NOT_FOUND_PAGE_PROPERTY, SITE_NAME_PROPERTY},
    culture::Culture,
};

use super::repos::{ContentRepo, RepoError};

/// Guard against cyclic parent chains in broken content trees.
const MAX_ANCESTOR_DEPTH: usize = 64;

/// Deepest navigation tree built, whatever the request asks for.
const MAX_NAVIGATION_LEVELS: u32 = 16;

type RepoFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepoError>> + Send + 'a>>;

/// The site of a request together with its settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSite {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub culture_id: Option<i64>,
    pub not_found_page: Option<ContentNode>,
}

impl ResolvedSite {
    /// Read site settings from `site`, letting `culture_node` override the
    /// not-found page.
    pub async fn resolve(
        repo: &dyn ContentRepo,
        site: &ContentNode,
        culture_node: Option<&ContentNode>,
    ) -> Result<Self, RepoError> {
        let settings = culture_node.unwrap_or(site);
        let not_found_id = settings
            .property_i64(NOT_FOUND_PAGE_PROPERTY)
            .or_else(|| site.property_i64(NOT_FOUND_PAGE_PROPERTY));

        let not_found_page = match not_found_id {
            Some(id) if id > 0 => repo.get_content_by_id(id).await?,
            _ => None,
        };

        Ok(Self {
            id: site.id,
            name: settings
                .property_str(SITE_NAME_PROPERTY)
                .or_else(|| site.property_str(SITE_NAME_PROPERTY))
                .unwrap_or(&site.name)
                .to_string(),
            url: site.url.clone(),
            culture_id: culture_node.map(|node| node.id),
            not_found_page,
        })
    }

    pub fn to_model(&self) -> SiteModel {
        SiteModel {
            id: self.id,
            name: self.name.clone(),
            url: self.url.clone(),
            culture_id: self.culture_id,
        }
    }
}

pub fn content_model(node: &ContentNode, culture: Option<&Culture>) -> ContentModel {
    ContentModel {
        id: node.id,
        name: node.name.clone(),
        url: node.url.clone(),
        template: node.template.clone(),
        culture: node
            .culture
            .as_ref()
            .or(culture)
            .map(|culture| culture.to_string()),
        properties: node.properties.clone(),
    }
}

/// Navigation tree below `site`, `levels` deep (at most
/// `MAX_NAVIGATION_LEVELS`). Hidden nodes are skipped. With `current`, the
/// id path from the site down to it is included.
pub async fn build_navigation(
    repo: &dyn ContentRepo,
    site: &ContentNode,
    levels: u32,
    current: Option<&ContentNode>,
) -> Result<NavigationModel, RepoError> {
    let levels = levels.min(MAX_NAVIGATION_LEVELS);
    let items = if levels == 0 {
        Vec::new()
    } else {
        navigation_items(repo, site.id, 1, levels).await?
    };

    let context = match current {
        Some(node) => {
            let mut path: Vec<i64> = ancestors_or_self(repo, node)
                .await?
                .into_iter()
                .map(|node| node.id)
                .collect();
            path.reverse();
            path
        }
        None => Vec::new(),
    };

    Ok(NavigationModel { items, context })
}

fn navigation_items(
    repo: &dyn ContentRepo,
    parent_id: i64,
    level: u32,
    max_levels: u32,
) -> RepoFuture<'_, Vec<NavigationItem>> {
    Box::pin(async move {
        let mut items = Vec::new();
        for child in repo.get_children(parent_id).await? {
            if child.hidden {
                continue;
            }

            let (children, has_children) = if level < max_levels {
                let children = navigation_items(repo, child.id, level + 1, max_levels).await?;
                let has_children = !children.is_empty();
                (children, has_children)
            } else {
                let grandchildren = repo.get_children(child.id).await?;
                (Vec::new(), grandchildren.iter().any(|node| !node.hidden))
            };

            items.push(NavigationItem {
                id: child.id,
                title: child.title().to_string(),
                url: child.url.clone(),
                parent_id: child.parent_id,
                template: child.template.clone(),
                culture: child.culture.as_ref().map(ToString::to_string),
                has_children,
                children,
            });
        }
        Ok(items)
    })
}

/// `node` followed by its published ancestors, nearest first.
pub async fn ancestors_or_self(
    repo: &dyn ContentRepo,
    node: &ContentNode,
) -> Result<Vec<ContentNode>, RepoError> {
    let mut chain = vec![node.clone()];
    let mut parent_id = node.parent_id;

    while parent_id > 0 && chain.len() < MAX_ANCESTOR_DEPTH {
        let Some(parent) = repo.get_content_by_id(parent_id).await? else {
            break;
        };
        parent_id = parent.parent_id;
        chain.push(parent);
    }

    Ok(chain)
}
