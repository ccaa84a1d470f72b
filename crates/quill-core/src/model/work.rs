//! The work aggregate: a script or novel project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::id::EntityId;

/// The two authoring formats a work can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkKind {
    /// Scene/dialogue-structured script.
    Plot,
    /// Prose chapters.
    Novel,
}

impl WorkKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Plot => "plot",
            Self::Novel => "novel",
        }
    }
}

impl Default for WorkKind {
    fn default() -> Self {
        Self::Plot
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing a work kind from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWorkKindError {
    pub got: String,
}

impl fmt::Display for ParseWorkKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid work kind '{}': expected plot or novel", self.got)
    }
}

impl std::error::Error for ParseWorkKindError {}

impl FromStr for WorkKind {
    type Err = ParseWorkKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plot" => Ok(Self::Plot),
            "novel" => Ok(Self::Novel),
            _ => Err(ParseWorkKindError { got: s.to_string() }),
        }
    }
}

/// Root aggregate. Owns episodes, characters, and (transitively) plots and
/// relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Work {
    pub id: EntityId,
    pub title: String,
    pub kind: WorkKind,
    pub created_at: DateTime<Utc>,
    /// Free-text planning document, edited as one blob.
    pub planning_doc: String,
    /// Server-generated synopsis, if any. Read-only on the client.
    pub summary: Option<String>,
}

impl Default for Work {
    fn default() -> Self {
        Self {
            id: 0,
            title: String::new(),
            kind: WorkKind::Plot,
            created_at: DateTime::UNIX_EPOCH,
            planning_doc: String::new(),
            summary: None,
        }
    }
}

impl Work {
    /// A fresh work minted this session.
    #[must_use]
    pub fn new(id: EntityId, title: impl Into<String>, kind: WorkKind, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            kind,
            created_at,
            planning_doc: String::new(),
            summary: None,
        }
    }
}
