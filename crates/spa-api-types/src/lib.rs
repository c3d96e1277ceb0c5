//! Shared wire types for the SPA content API.
//!
//! Everything here is plain serde data. The server builds these values, the
//! micro-cache stores them and clients deserialize them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named subset of the response payload a caller may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiPart {
    Content,
    Navigation,
    Site,
}

impl ApiPart {
    /// All parts in their canonical order.
    pub const ALL: [ApiPart; 3] = [ApiPart::Content, ApiPart::Navigation, ApiPart::Site];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiPart::Content => "Content",
            ApiPart::Navigation => "Navigation",
            ApiPart::Site => "Site",
        }
    }

    /// Parse a part name, ignoring ASCII case and surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|part| part.as_str().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for ApiPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status block carried inside a data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    pub code: u16,
}

impl Default for ResponseMeta {
    fn default() -> Self {
        Self { code: 200 }
    }
}

/// The successful payload of a SPA request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModel {
    pub page_id: i64,
    pub site_id: i64,
    /// Micro-cache generation the model was built under. Clients compare it
    /// across responses to detect content changes.
    pub content_generation: u64,
    pub meta: ResponseMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<SiteModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation: Option<NavigationModel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentModel>,
    pub is_cached: bool,
    /// Milliseconds from request start to model completion, `-1` while unset.
    pub execute_time_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteModel {
    pub id: i64,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub culture_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationModel {
    pub items: Vec<NavigationItem>,
    /// Ancestor ids of the current page, root first. Only filled when the
    /// caller asked for navigation context.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationItem {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub parent_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub culture: Option<String>,
    pub has_children: bool,
    #[serde(default)]
    pub children: Vec<NavigationItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentModel {
    pub id: i64,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub culture: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMeta {
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Structured error body: `{"meta": {"code", "error"}, "data"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub meta: ErrorMeta,
    #[serde(default)]
    pub data: Value,
}

impl ErrorEnvelope {
    pub fn new(code: u16, error: Option<String>) -> Self {
        Self {
            meta: ErrorMeta { code, error },
            data: Value::Null,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// `data` block of a redirect envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectData {
    pub url: String,
    pub permanent: bool,
}
