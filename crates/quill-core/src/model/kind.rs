//! The five entity kinds tracked by the pending-change ledger.

use std::fmt;

/// Entity kinds, listed parent-first.
///
/// The order of [`EntityKind::ALL`] is the remote **create** order (parents
/// before children); the reconciler iterates it reversed for deletes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    /// Top-level authored project (a script or a novel).
    Work,
    /// A chapter/installment within a work.
    Episode,
    /// Smallest content-bearing unit; holds the serialized document body.
    Plot,
    /// A character belonging to a work.
    Character,
    /// Directed, named edge between two characters of the same work.
    Relation,
}

impl EntityKind {
    /// All kinds in parent-first (create-safe) order.
    pub const ALL: [Self; 5] = [
        Self::Work,
        Self::Episode,
        Self::Plot,
        Self::Character,
        Self::Relation,
    ];

    /// Lowercase name used in logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Episode => "episode",
            Self::Plot => "plot",
            Self::Character => "character",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::EntityKind;

    #[test]
    fn all_lists_every_kind_once() {
        assert_eq!(EntityKind::ALL.len(), 5);
        let mut seen = std::collections::HashSet::new();
        for kind in EntityKind::ALL {
            assert!(seen.insert(kind.as_str()), "duplicate {kind}");
        }
    }

    #[test]
    fn create_order_is_parent_first() {
        let order: Vec<_> = EntityKind::ALL.to_vec();
        assert_eq!(order[0], EntityKind::Work);
        assert_eq!(order[4], EntityKind::Relation);
    }

    #[test]
    fn display_matches_as_str() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }
}
