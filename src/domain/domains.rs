//! Domain records and their URI-normalized form.

use serde::{Deserialize, Serialize};
use url::Url;

use super::{culture::Culture, error::DomainError};

const DEFAULT_SCHEME: &str = "http";

/// A configured binding of a host (and optional path) to a content node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRecord {
    #[serde(default)]
    pub id: i64,
    pub content_id: i64,
    /// Host with an optional path, e.g. `example.com/da`. May also carry a
    /// scheme or start with `/` for a path relative to the request host.
    pub name: String,
    #[serde(default)]
    pub culture: Option<Culture>,
    #[serde(default)]
    pub is_wildcard: bool,
}

/// A domain record paired with an absolute URI whose path ends in `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainAndUri {
    pub domain: DomainRecord,
    pub uri: Url,
}

impl DomainAndUri {
    /// Build the normalized URI of `domain`, inheriting the scheme (and, for
    /// relative names, the authority) of `current`.
    pub fn new(domain: DomainRecord, current: Option<&Url>) -> Result<Self, DomainError> {
        let uri = domain_uri(&domain.name, current)?;
        Ok(Self { domain, uri })
    }

    pub fn content_id(&self) -> i64 {
        self.domain.content_id
    }

    pub fn culture(&self) -> Option<&Culture> {
        self.domain.culture.as_ref()
    }

    pub fn matches_culture(&self, culture: &Culture) -> bool {
        self.culture() == Some(culture)
    }

    /// Path of the domain URI, always ending in `/`.
    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

fn domain_uri(name: &str, current: Option<&Url>) -> Result<Url, DomainError> {
    let name = name.trim();
    let scheme = current.map(Url::scheme).unwrap_or(DEFAULT_SCHEME);

    let candidate = if name.starts_with('/') {
        let current = current.ok_or_else(|| {
            DomainError::validation(format!(
                "relative domain `{name}` cannot be resolved without a request uri"
            ))
        })?;
        format!("{scheme}://{}{name}", authority(current))
    } else if name.contains("://") {
        name.to_string()
    } else {
        format!("{scheme}://{name}")
    };

    let mut uri = Url::parse(&candidate)
        .map_err(|err| DomainError::validation(format!("invalid domain `{name}`: {err}")))?;
    uri.set_query(None);
    uri.set_fragment(None);
    Ok(with_trailing_slash(&uri))
}

fn authority(uri: &Url) -> String {
    let host = uri.host_str().unwrap_or_default();
    match uri.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Copy of `uri` whose path ends in `/`. Query and fragment are kept.
pub fn with_trailing_slash(uri: &Url) -> Url {
    let mut uri = uri.clone();
    if !uri.path().ends_with('/') {
        let path = format!("{}/", uri.path());
        uri.set_path(&path);
    }
    uri
}

/// Copy of `uri` with any explicit port removed.
pub fn without_port(uri: &Url) -> Url {
    let mut uri = uri.clone();
    // Only fails for cannot-be-a-base URLs, which never reach here.
    let _ = uri.set_port(None);
    uri
}

/// Whether `base` is a path prefix of `uri` on the same scheme, host and port.
pub fn is_base_of(base: &Url, uri: &Url) -> bool {
    if base.scheme() != uri.scheme() {
        return false;
    }
    let same_host = match (base.host_str(), uri.host_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    };
    if !same_host || base.port_or_known_default() != uri.port_or_known_default() {
        return false;
    }

    let base_path = base.path().to_ascii_lowercase();
    uri.path().to_ascii_lowercase().starts_with(&base_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> DomainRecord {
        DomainRecord {
            id: 1,
            content_id: 10,
            name: name.to_string(),
            culture: Culture::new("en-US"),
            is_wildcard: false,
        }
    }

    fn url(value: &str) -> Url {
        Url::parse(value).expect("valid url")
    }

    #[test]
    fn inherits_request_scheme_and_appends_slash() {
        let current = url("https://a.com/en/about/");
        let domain = DomainAndUri::new(record("a.com/da"), Some(&current)).expect("domain");
        assert_eq!(domain.uri.as_str(), "https://a.com/da/");
    }

    #[test]
    fn defaults_to_http_without_request() {
        let domain = DomainAndUri::new(record("a.com"), None).expect("domain");
        assert_eq!(domain.uri.as_str(), "http://a.com/");
    }

    #[test]
    fn relative_names_use_request_authority() {
        let current = url("http://localhost:8080/x");
        let domain = DomainAndUri::new(record("/en"), Some(&current)).expect("domain");
        assert_eq!(domain.uri.as_str(), "http://localhost:8080/en/");

        assert!(DomainAndUri::new(record("/en"), None).is_err());
    }

    #[test]
    fn base_matching_respects_port_and_path() {
        let base = url("http://a.com/da/");
        assert!(is_base_of(&base, &url("http://a.com/da/about/")));
        assert!(is_base_of(&base, &url("http://A.com/DA/")));
        assert!(!is_base_of(&base, &url("http://a.com/dansk/")));
        assert!(!is_base_of(&base, &url("http://a.com:8080/da/")));
        assert!(is_base_of(
            &base,
            &without_port(&url("http://a.com:8080/da/"))
        ));
    }
}
