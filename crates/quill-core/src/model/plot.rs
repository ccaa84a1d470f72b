//! Plots: the smallest content-bearing units (scene cards / chapter bodies).
//!
//! A plot's metadata (title, order) and its serialized document body are
//! persisted through different endpoints and tracked as independently dirty:
//! editing the body never enqueues a metadata update, and vice versa.

use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// The serialized form of a document with no content. Bodies equal to this
/// sentinel are never pushed to the content endpoint.
pub const EMPTY_DOC: &str = "{}";

/// A scene card (script works) or chapter body (novel works).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Plot {
    pub id: EntityId,
    pub episode_id: EntityId,
    pub title: String,
    pub order_index: i64,
    /// Opaque serialized rich-text document. Large; synced through the
    /// content endpoint, not with the metadata record.
    pub content: String,
    /// Server-generated scene synopsis, if any.
    pub summary: Option<String>,
}

impl Default for Plot {
    fn default() -> Self {
        Self {
            id: 0,
            episode_id: 0,
            title: String::new(),
            order_index: 0,
            content: EMPTY_DOC.to_string(),
            summary: None,
        }
    }
}

impl Plot {
    #[must_use]
    pub fn new(id: EntityId, episode_id: EntityId, title: impl Into<String>, order_index: i64) -> Self {
        Self {
            id,
            episode_id,
            title: title.into(),
            order_index,
            content: EMPTY_DOC.to_string(),
            summary: None,
        }
    }

    /// Whether the body carries anything worth persisting.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !is_empty_document(&self.content)
    }
}

/// True for the empty-document sentinel and for a blank body.
#[must_use]
pub fn is_empty_document(content: &str) -> bool {
    content.is_empty() || content == EMPTY_DOC
}
