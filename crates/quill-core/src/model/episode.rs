//! Episodes: chapters/installments within a work.

use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// A chapter within a work. `order_index` orders siblings under the same
/// work; it is dense (`0..n`) after a reorder but may carry gaps after
/// deletes — appends therefore use `max + 1`, never bucket length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Episode {
    pub id: EntityId,
    pub work_id: EntityId,
    pub title: String,
    pub order_index: i64,
    /// Server-generated chapter synopsis, if any.
    pub summary: Option<String>,
}

impl Default for Episode {
    fn default() -> Self {
        Self {
            id: 0,
            work_id: 0,
            title: String::new(),
            order_index: 0,
            summary: None,
        }
    }
}

impl Episode {
    #[must_use]
    pub fn new(id: EntityId, work_id: EntityId, title: impl Into<String>, order_index: i64) -> Self {
        Self {
            id,
            work_id,
            title: title.into(),
            order_index,
            summary: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Episode;

    #[test]
    fn json_roundtrip_preserves_ordering_fields() {
        let ep = Episode::new(9, 5, "Act One", 2);
        let json = serde_json::to_string(&ep).unwrap();
        let back: Episode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ep);
    }

    #[test]
    fn missing_summary_deserializes_to_none() {
        let ep: Episode =
            serde_json::from_str(r#"{"id":1,"work_id":2,"title":"x","order_index":0}"#).unwrap();
        assert!(ep.summary.is_none());
    }
}
