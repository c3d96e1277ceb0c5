//! Domain and culture resolution.
//!
//! Matches a request URI and an optional culture hint against registered
//! domain records. Candidates are ordered by descending URI string so a more
//! specific path (`a.com/foo/`) is considered before its parent (`a.com/`).

use std::sync::Arc;

use tracing::warn;
use url::Url;

use super::{
    culture::Culture,
    domains::{DomainAndUri, DomainRecord, is_base_of, with_trailing_slash, without_port},
    error::DomainError,
};

/// Custom matching hook consulted when neither culture nor base-URI matching
/// selects a domain. It receives the culture subset when one exists,
/// otherwise every candidate, and must return a domain.
pub type DomainMapper = dyn Fn(&[DomainAndUri], &Url, Option<&Culture>, Option<&Culture>) -> Option<DomainAndUri>
    + Send
    + Sync;

#[derive(Clone, Default)]
pub struct DomainResolver {
    mapper: Option<Arc<DomainMapper>>,
}

impl DomainResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapper(mapper: Arc<DomainMapper>) -> Self {
        Self {
            mapper: Some(mapper),
        }
    }

    /// Select the best domain for a request.
    ///
    /// Returns `Ok(None)` when there are no usable candidates, or when a URI
    /// was given, nothing matched and no mapper is installed. A mapper that
    /// returns `None` is an invariant violation.
    pub fn select_domain(
        &self,
        candidates: impl IntoIterator<Item = DomainRecord>,
        request_uri: Option<&Url>,
        culture: Option<&Culture>,
        default_culture: Option<&Culture>,
    ) -> Result<Option<DomainAndUri>, DomainError> {
        let mut domains: Vec<DomainAndUri> = candidates
            .into_iter()
            .filter(|domain| !domain.is_wildcard)
            .filter_map(|domain| {
                let name = domain.name.clone();
                match DomainAndUri::new(domain, request_uri) {
                    Ok(domain) => Some(domain),
                    Err(err) => {
                        warn!(domain = %name, error = %err, "Skipping unparsable domain");
                        None
                    }
                }
            })
            .collect();

        if domains.is_empty() {
            return Ok(None);
        }

        domains.sort_by(|a, b| b.uri.as_str().cmp(a.uri.as_str()));

        let Some(uri) = request_uri else {
            return Ok(by_culture(domains, culture, default_culture));
        };

        // The default culture must not narrow this subset.
        let culture_domains = select_by_culture(&domains, culture);

        let considered = match &culture_domains {
            Some(subset) if subset.len() == 1 => return Ok(subset.first().cloned()),
            Some(subset) => subset.as_slice(),
            None => domains.as_slice(),
        };

        if let Some(domain) = select_by_base(considered, uri) {
            return Ok(Some(domain.clone()));
        }

        let Some(mapper) = &self.mapper else {
            return Ok(None);
        };

        let pool = culture_domains.as_deref().unwrap_or(&domains);
        mapper(pool, uri, culture, default_culture)
            .map(Some)
            .ok_or_else(|| DomainError::invariant("domain mapper returned no domain"))
    }
}

fn select_by_culture(
    domains: &[DomainAndUri],
    culture: Option<&Culture>,
) -> Option<Vec<DomainAndUri>> {
    let culture = culture?;
    let subset: Vec<DomainAndUri> = domains
        .iter()
        .filter(|domain| domain.matches_culture(culture))
        .cloned()
        .collect();
    (!subset.is_empty()).then_some(subset)
}

fn select_by_base<'a>(domains: &'a [DomainAndUri], uri: &Url) -> Option<&'a DomainAndUri> {
    let current = with_trailing_slash(uri);
    domains
        .iter()
        .find(|domain| is_base_of(&domain.uri, &current))
        .or_else(|| {
            let current = without_port(&current);
            domains
                .iter()
                .find(|domain| is_base_of(&domain.uri, &current))
        })
}

fn by_culture(
    domains: Vec<DomainAndUri>,
    culture: Option<&Culture>,
    default_culture: Option<&Culture>,
) -> Option<DomainAndUri> {
    let position = [culture, default_culture]
        .into_iter()
        .flatten()
        .find_map(|wanted| domains.iter().position(|d| d.matches_culture(wanted)))
        .unwrap_or(0);

    domains.into_iter().nth(position)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn domain(id: i64, name: &str, culture: &str) -> DomainRecord {
        DomainRecord {
            id,
            content_id: 1,
            name: name.to_string(),
            culture: Culture::new(culture),
            is_wildcard: false,
        }
    }

    fn culture(tag: &str) -> Culture {
        Culture::new(tag).expect("culture")
    }

    fn url(value: &str) -> Url {
        Url::parse(value).expect("url")
    }

    fn select(
        resolver: &DomainResolver,
        domains: Vec<DomainRecord>,
        uri: Option<&str>,
        requested: Option<&str>,
        default: Option<&str>,
    ) -> Option<i64> {
        let uri = uri.map(url);
        let requested = requested.map(culture);
        let default = default.map(culture);
        resolver
            .select_domain(domains, uri.as_ref(), requested.as_ref(), default.as_ref())
            .expect("selection")
            .map(|d| d.domain.id)
    }

    #[test]
    fn no_candidates_yields_none() {
        let resolver = DomainResolver::new();
        assert_eq!(
            select(&resolver, vec![], Some("http://a.com/"), None, None),
            None
        );
    }

    #[test]
    fn wildcard_domains_are_ignored() {
        let resolver = DomainResolver::new();
        let mut wildcard = domain(1, "*1", "en-US");
        wildcard.is_wildcard = true;
        assert_eq!(
            select(&resolver, vec![wildcard], None, Some("en-US"), None),
            None
        );
    }

    #[test]
    fn single_culture_match_wins_regardless_of_base() {
        let resolver = DomainResolver::new();
        let domains = vec![domain(1, "a.com", "en-US"), domain(2, "b.com", "da-DK")];
        assert_eq!(
            select(
                &resolver,
                domains,
                Some("http://a.com/about/"),
                Some("da-dk"),
                None
            ),
            Some(2)
        );
    }

    #[test]
    fn more_specific_path_wins() {
        let resolver = DomainResolver::new();
        let domains = vec![domain(1, "example.com", "en-US"), domain(2, "example.com/foo", "en-US")];
        assert_eq!(
            select(&resolver, domains, Some("http://example.com/foo/bar"), None, None),
            Some(2)
        );
    }

    #[test]
    fn culture_subset_restricts_base_matching() {
        let resolver = DomainResolver::new();
        let domains = vec![
            domain(1, "a.com", "en-US"),
            domain(2, "a.com/foo", "en-US"),
            domain(3, "a.com/foo", "da-DK"),
        ];
        assert_eq!(
            select(&resolver, domains, Some("http://a.com/foo/x"), Some("en-US"), None),
            Some(2)
        );
    }

    #[test]
    fn default_culture_does_not_narrow_uri_matching() {
        let resolver = DomainResolver::new();
        let domains = vec![domain(1, "a.com/en", "en-US"), domain(2, "a.com/da", "da-DK")];
        assert_eq!(
            select(
                &resolver,
                domains,
                Some("http://a.com/en/page/"),
                None,
                Some("da-DK")
            ),
            Some(1)
        );
    }

    #[test]
    fn port_is_ignored_on_second_attempt() {
        let resolver = DomainResolver::new();
        let domains = vec![domain(1, "a.com", "en-US")];
        assert_eq!(
            select(&resolver, domains, Some("http://a.com:8080/x/"), None, None),
            Some(1)
        );
    }

    #[test]
    fn culture_precedence_without_uri() {
        let resolver = DomainResolver::new();
        let domains = || {
            vec![
                domain(1, "a.com", "en-US"),
                domain(2, "b.com", "da-DK"),
                domain(3, "c.com", "de-DE"),
            ]
        };

        assert_eq!(
            select(&resolver, domains(), None, Some("da-DK"), Some("de-DE")),
            Some(2)
        );
        assert_eq!(
            select(&resolver, domains(), None, Some("sv-SE"), Some("en-us")),
            Some(1)
        );
        // Descending URI order puts c.com first.
        assert_eq!(
            select(&resolver, domains(), None, Some("sv-SE"), Some("nb-NO")),
            Some(3)
        );
        assert_eq!(select(&resolver, domains(), None, None, None), Some(3));
    }

    #[test]
    fn unmatched_uri_without_mapper_yields_none() {
        let resolver = DomainResolver::new();
        let domains = vec![domain(1, "a.com", "en-US")];
        assert_eq!(
            select(&resolver, domains, Some("http://other.org/"), None, None),
            None
        );
    }

    #[test]
    fn mapper_receives_culture_subset() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let resolver = DomainResolver::with_mapper(Arc::new(move |pool, _uri, _c, _d| {
            seen.fetch_add(pool.len(), Ordering::SeqCst);
            pool.last().cloned()
        }));
        let domains = vec![
            domain(1, "a.com", "en-US"),
            domain(2, "b.com", "en-US"),
            domain(3, "c.com", "da-DK"),
        ];

        assert_eq!(
            select(&resolver, domains, Some("http://other.org/"), Some("en-US"), None),
            Some(1)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn mapper_returning_none_is_an_invariant_violation() {
        let resolver = DomainResolver::with_mapper(Arc::new(|_, _, _, _| None));
        let uri = url("http://other.org/");
        let result = resolver.select_domain(vec![domain(1, "a.com", "en-US")], Some(&uri), None, None);
        assert!(matches!(result, Err(DomainError::Invariant { .. })));
    }
}
