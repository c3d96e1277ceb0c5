//! Request argument parsing.
//!
//! Raw transport data is captured once in [`RawRequest`] and turned into the
//! normalized [`RequestArguments`] the pipeline works with. Query parameter
//! names are matched case-insensitively.

use spa_api_types::ApiPart;
use url::Url;

use crate::{
    cache::cache_key,
    domain::{culture::Culture, error::DomainError},
};

use super::{error::SpaError, options::SpaOptions};

const DEFAULT_NAV_LEVELS: u32 = 1;
const PREVIEW_MARKER: &str = "/umbraco/preview/";

/// Transport-level view of an inbound request.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    /// Scheme the request physically arrived on.
    pub scheme: String,
    /// Host the request physically arrived on, without port.
    pub host: String,
    /// Explicit port, when the `Host` header carried one.
    pub port: Option<u16>,
    pub query: Vec<(String, String)>,
    pub accept: Option<String>,
    pub user_agent: Option<String>,
    pub remote_addr: Option<String>,
    /// Credential presented for preview access.
    pub identity: Option<String>,
}

impl RawRequest {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// First non-blank value of the named query parameter.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .filter(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
            .find(|value| !value.is_empty())
    }

    fn physical_port(&self) -> (u16, bool) {
        let default = default_port(&self.scheme);
        match self.port {
            Some(port) => (port, Some(port) == default),
            None => (default.unwrap_or(80), true),
        }
    }
}

/// Normalized arguments of a SPA request.
///
/// Fields are public so phases can reconcile them (e.g. `update_arguments`
/// rewriting `url` from a resolved page). The cache key is derived on demand
/// so it always reflects the current values.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestArguments {
    pub page_id: i64,
    pub site_id: i64,
    pub url: String,
    /// Logical URI: `{protocol}://{host}{url}`.
    pub uri: Url,
    /// Culture hint from the query string.
    pub culture: Option<Culture>,
    pub is_preview: bool,
    /// Never empty.
    pub parts: Vec<ApiPart>,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub is_default_port: bool,
    pub nav_levels: u32,
    pub nav_context: bool,
    pub enable_caching: bool,
    pub show_html_errors: bool,
    pub accept: String,
    pub user_agent: String,
    pub remote_addr: String,
}

impl RequestArguments {
    pub fn parse(raw: &RawRequest, options: &SpaOptions) -> Result<Self, SpaError> {
        let host = raw
            .query_value("appHost")
            .map(str::to_string)
            .unwrap_or_else(|| raw.host.clone());
        let protocol = raw
            .query_value("appProtocol")
            .map(str::to_string)
            .unwrap_or_else(|| raw.scheme.clone());
        let (port, is_default_port) = raw.physical_port();

        let url = normalize_url(raw.query_value("url").unwrap_or("/"));
        let uri = logical_uri(&protocol, &host, &url)?;

        let mut page_id = parse_i64(raw.query_value("pageId"), -1);
        let mut is_preview = false;
        if let Some(preview_id) = try_get_preview_id(&url) {
            page_id = preview_id;
            is_preview = true;
        }

        let development = options.environment.is_development();
        let accept = raw.accept.clone().unwrap_or_default();
        let enable_caching = !development
            && parse_bool(raw.query_value("cache")).unwrap_or(true)
            && !is_preview;
        let show_html_errors = development && accept.contains("text/html");

        Ok(Self {
            page_id,
            site_id: parse_i64(raw.query_value("siteId"), -1),
            url,
            uri,
            culture: raw.query_value("culture").and_then(Culture::new),
            is_preview,
            parts: parse_parts(raw.query_value("parts")),
            protocol,
            host,
            port,
            is_default_port,
            nav_levels: raw
                .query_value("navLevels")
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_NAV_LEVELS),
            nav_context: parse_bool(raw.query_value("navContext")).unwrap_or(false),
            enable_caching,
            show_html_errors,
            accept,
            user_agent: raw.user_agent.clone().unwrap_or_default(),
            remote_addr: raw.remote_addr.clone().unwrap_or_default(),
        })
    }

    pub fn parts(&self) -> &[ApiPart] {
        &self.parts
    }

    pub fn has_part(&self, part: ApiPart) -> bool {
        self.parts.contains(&part)
    }

    pub fn cache_key(&self) -> String {
        cache_key(self)
    }

    /// Replace the logical URL and rebuild the logical URI to match.
    pub fn set_url(&mut self, url: &str) -> Result<(), SpaError> {
        let url = normalize_url(url);
        self.uri = logical_uri(&self.protocol, &self.host, &url)?;
        self.url = url;
        Ok(())
    }
}

fn logical_uri(protocol: &str, host: &str, url: &str) -> Result<Url, SpaError> {
    let candidate = format!("{protocol}://{host}{url}");
    Url::parse(&candidate).map_err(|err| {
        SpaError::Domain(DomainError::validation(format!(
            "invalid request uri `{candidate}`: {err}"
        )))
    })
}

fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        "/".to_string()
    } else if url.starts_with('/') {
        url.to_string()
    } else {
        format!("/{url}")
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme.to_ascii_lowercase().as_str() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Detect a preview request from its URL and return the previewed node id.
///
/// Recognizes `/umbraco/preview/?id=<id>` style URLs as well as bare
/// `/<id>` and `/<id>.aspx` paths.
pub fn try_get_preview_id(url: &str) -> Option<i64> {
    if url.contains(PREVIEW_MARKER) {
        return url
            .split('=')
            .nth(1)
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|id| *id > 0);
    }

    let path = url.split('?').next().unwrap_or_default().trim_end_matches('/');
    let digits = path.strip_prefix('/')?;
    let digits = digits.strip_suffix(".aspx").unwrap_or(digits);
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse::<i64>().ok().filter(|id| *id > 0)
}

/// Parse a comma separated list of part names.
///
/// Blank input, or input naming no known part, selects every part. Unknown
/// names are dropped and the caller's order is kept.
pub fn parse_parts(value: Option<&str>) -> Vec<ApiPart> {
    let parts: Vec<ApiPart> = value
        .unwrap_or_default()
        .split(',')
        .filter_map(ApiPart::parse)
        .collect();

    if parts.is_empty() {
        ApiPart::ALL.to_vec()
    } else {
        parts
    }
}

/// Lenient boolean parsing for query strings.
pub fn parse_bool(value: Option<&str>) -> Option<bool> {
    match value?.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_i64(value: Option<&str>, default: i64) -> i64 {
    value
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
