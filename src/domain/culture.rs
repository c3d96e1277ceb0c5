use std::{
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

/// A language/region tag such as `en-US`.
///
/// Equality ignores ASCII case and treats `_` and `-` as the same separator,
/// so `en_us` and `en-US` name the same culture. The original spelling is
/// kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Culture(String);

impl Culture {
    /// Returns `None` for blank tags.
    pub fn new(tag: impl Into<String>) -> Option<Self> {
        let tag = tag.into();
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn normalized(&self) -> impl Iterator<Item = u8> + '_ {
        self.0.bytes().map(|byte| match byte {
            b'_' => b'-',
            other => other.to_ascii_lowercase(),
        })
    }
}

impl PartialEq for Culture {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len() && self.normalized().eq(other.normalized())
    }
}

impl Eq for Culture {}

impl Hash for Culture {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.normalized() {
            state.write_u8(byte);
        }
    }
}

impl fmt::Display for Culture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
