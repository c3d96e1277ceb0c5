//! Content change notifications.
//!
//! Any change to published content invalidates the whole micro-cache; the
//! event only says what happened and to which nodes, for logging.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentEventKind {
    Saved,
    MovedToTrash,
    Deleted,
}

impl ContentEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentEventKind::Saved => "saved",
            ContentEventKind::MovedToTrash => "moved_to_trash",
            ContentEventKind::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ContentEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEvent {
    /// Correlates log lines of one notification.
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub kind: ContentEventKind,
    #[serde(default)]
    pub ids: Vec<i64>,
}

impl ContentEvent {
    pub fn new(kind: ContentEventKind, ids: impl Into<Vec<i64>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            ids: ids.into(),
        }
    }
}
