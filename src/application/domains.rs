//! Domain lookups backed by the domain registry.

use url::Url;

use crate::domain::{
    content::ContentNode,
    culture::Culture,
    domains::{DomainAndUri, DomainRecord},
    resolver::DomainResolver,
};

use super::{
    error::SpaError,
    models::ancestors_or_self,
    repos::{ContentRepo, DomainRepo},
};

/// Outcome of resolving the domain of a request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainResolution {
    pub domain: Option<DomainAndUri>,
    /// Culture of the matched domain, else the registry default.
    pub culture: Option<Culture>,
}

/// Match the logical request URI against every published, non-wildcard
/// domain.
pub async fn find_domain(
    domains: &dyn DomainRepo,
    resolver: &DomainResolver,
    uri: &Url,
    culture: Option<&Culture>,
) -> Result<DomainResolution, SpaError> {
    let mut published = Vec::new();
    for domain in domains.get_all_domains(false).await? {
        if domains.is_published(&domain).await? {
            published.push(domain);
        }
    }

    let default_culture = domains.default_culture().await?;
    let domain = resolver.select_domain(published, Some(uri), culture, default_culture.as_ref())?;

    let culture = domain
        .as_ref()
        .and_then(DomainAndUri::culture)
        .cloned()
        .or(default_culture);

    Ok(DomainResolution { domain, culture })
}

/// Domain assigned to `node` or its nearest ancestor that has one, selected
/// by culture only.
pub async fn domain_for_node(
    content: &dyn ContentRepo,
    domains: &dyn DomainRepo,
    resolver: &DomainResolver,
    node: &ContentNode,
    culture: Option<&Culture>,
) -> Result<Option<DomainAndUri>, SpaError> {
    let default_culture = domains.default_culture().await?;

    for candidate in ancestors_or_self(content, node).await? {
        let assigned: Vec<DomainRecord> = domains.get_assigned_domains(candidate.id).await?;
        if assigned.is_empty() {
            continue;
        }
        if let Some(domain) =
            resolver.select_domain(assigned, None, culture, default_culture.as_ref())?
        {
            return Ok(Some(domain));
        }
    }

    Ok(None)
}
