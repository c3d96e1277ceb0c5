use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::culture::Culture;

/// Property holding the display name of a site root.
pub const SITE_NAME_PROPERTY: &str = "siteName";
/// Property on a site root holding the id of its not-found page.
pub const NOT_FOUND_PAGE_PROPERTY: &str = "notFoundPage";

/// A published (or previewable) content node as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    pub id: i64,
    /// `-1` for site roots.
    #[serde(default = "no_parent")]
    pub parent_id: i64,
    pub name: String,
    /// Public URL of the node.
    pub url: String,
    /// Path relative to the site root used by route lookups. Defaults to `url`.
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub culture: Option<Culture>,
    #[serde(default = "published")]
    pub published: bool,
    /// Excluded from navigation.
    #[serde(default)]
    pub hidden: bool,
    /// Serve another node in place of this one.
    #[serde(default)]
    pub internal_redirect_id: Option<i64>,
    #[serde(default)]
    pub outbound_redirect: Option<OutboundRedirect>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRedirect {
    pub url: String,
    #[serde(default = "published")]
    pub permanent: bool,
}

fn no_parent() -> i64 {
    -1
}

fn published() -> bool {
    true
}

impl ContentNode {
    pub fn is_root(&self) -> bool {
        self.parent_id <= 0
    }

    pub fn route(&self) -> &str {
        self.route.as_deref().unwrap_or(&self.url)
    }

    pub fn property_str(&self, alias: &str) -> Option<&str> {
        self.properties
            .get(alias)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// Numeric property value. Numeric strings are accepted as well.
    pub fn property_i64(&self, alias: &str) -> Option<i64> {
        match self.properties.get(alias)? {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Display title: the `title` property, else the node name.
    pub fn title(&self) -> &str {
        self.property_str("title").unwrap_or(&self.name)
    }
}
