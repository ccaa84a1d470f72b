//! Characters and the directed relations between them.

use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// Default display color assigned to new characters.
pub const DEFAULT_CHARACTER_COLOR: &str = "#6366f1";

/// A character belonging to one work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Character {
    pub id: EntityId,
    pub work_id: EntityId,
    pub name: String,
    /// Display color (`#rrggbb`).
    pub color: String,
    /// Free-form key/value property list, serialized as JSON text.
    pub properties: String,
    pub memo: String,
    /// Optional portrait as a data URI.
    pub image: Option<String>,
    /// Server-generated character study, if any.
    pub summary: Option<String>,
}

impl Default for Character {
    fn default() -> Self {
        Self {
            id: 0,
            work_id: 0,
            name: String::new(),
            color: DEFAULT_CHARACTER_COLOR.to_string(),
            properties: "{}".to_string(),
            memo: String::new(),
            image: None,
            summary: None,
        }
    }
}

impl Character {
    #[must_use]
    pub fn new(
        id: EntityId,
        work_id: EntityId,
        name: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            id,
            work_id,
            name: name.into(),
            color: color.into(),
            ..Self::default()
        }
    }
}

/// A directed, labeled edge between two characters of the same work.
///
/// Carries no work id of its own; the owning work is derived by following
/// `from_character_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Relation {
    pub id: EntityId,
    pub from_character_id: EntityId,
    pub to_character_id: EntityId,
    pub label: String,
}

impl Default for Relation {
    fn default() -> Self {
        Self {
            id: 0,
            from_character_id: 0,
            to_character_id: 0,
            label: String::new(),
        }
    }
}

impl Relation {
    #[must_use]
    pub fn new(
        id: EntityId,
        from_character_id: EntityId,
        to_character_id: EntityId,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id,
            from_character_id,
            to_character_id,
            label: label.into(),
        }
    }

    /// Whether `character_id` is either endpoint.
    #[must_use]
    pub const fn touches(&self, character_id: EntityId) -> bool {
        self.from_character_id == character_id || self.to_character_id == character_id
    }
}
