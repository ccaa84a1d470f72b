//! Pending-change bookkeeping between explicit saves.
//!
//! The ledger is one state machine per entity kind instead of three
//! parallel create/update/delete collections: each tracked id is in exactly
//! one [`ChangeState`], and an untracked id is clean. The net operation
//! sets the reconciler needs fall out by construction — a created-then-
//! deleted id simply leaves the ledger, so it can never reach the server.
//!
//! # Transitions
//!
//! | current          | `record_create` | `record_update` | `record_delete` |
//! |------------------|-----------------|-----------------|-----------------|
//! | (clean)          | PendingCreate   | PendingUpdate   | PendingDelete   |
//! | PendingCreate    | —               | PendingCreate   | **removed**     |
//! | PendingUpdate    | —               | PendingUpdate   | PendingDelete   |
//! | PendingDelete    | —               | PendingDelete   | PendingDelete   |
//!
//! A created entity never needs an update entry because create-time sync
//! sends the latest in-memory state. Deleting a pending create is the
//! "ephemeral annihilation" case: the server never heard of the id, so the
//! ledger forgets it entirely.
//!
//! Plot bodies are tracked separately in a dirty-content set; body edits
//! and metadata edits are independent.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{EntityId, EntityKind};

/// The sync state of one tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeState {
    /// Minted this session, never sent; create-time sync sends latest state.
    PendingCreate,
    /// Durable entity with unsaved metadata edits.
    PendingUpdate,
    /// Durable entity awaiting a remote delete.
    PendingDelete,
}

/// Per-kind change state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeLedger {
    entries: BTreeMap<EntityId, ChangeState>,
}

impl ChangeLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_create(&mut self, id: EntityId) {
        self.entries.insert(id, ChangeState::PendingCreate);
    }

    pub fn record_update(&mut self, id: EntityId) {
        self.entries.entry(id).or_insert(ChangeState::PendingUpdate);
    }

    pub fn record_delete(&mut self, id: EntityId) {
        match self.entries.get(&id) {
            Some(ChangeState::PendingCreate) => {
                // Ephemeral annihilation: nothing to tell the server.
                self.entries.remove(&id);
            }
            _ => {
                self.entries.insert(id, ChangeState::PendingDelete);
            }
        }
    }

    #[must_use]
    pub fn state(&self, id: EntityId) -> Option<ChangeState> {
        self.entries.get(&id).copied()
    }

    #[must_use]
    pub fn is_pending_create(&self, id: EntityId) -> bool {
        self.state(id) == Some(ChangeState::PendingCreate)
    }

    /// Ids to create remotely, in mint order (ids are monotonic).
    #[must_use]
    pub fn creates(&self) -> Vec<EntityId> {
        self.ids_in(ChangeState::PendingCreate)
    }

    /// Ids needing a metadata update remotely.
    #[must_use]
    pub fn updates(&self) -> Vec<EntityId> {
        self.ids_in(ChangeState::PendingUpdate)
    }

    /// Ids to delete remotely.
    #[must_use]
    pub fn deletes(&self) -> Vec<EntityId> {
        self.ids_in(ChangeState::PendingDelete)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn ids_in(&self, state: ChangeState) -> Vec<EntityId> {
        self.entries
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(id, _)| *id)
            .collect()
    }
}

/// All unsaved changes of a session: one ledger per kind plus the
/// dirty-content set for plot bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingChanges {
    works: ChangeLedger,
    episodes: ChangeLedger,
    plots: ChangeLedger,
    characters: ChangeLedger,
    relations: ChangeLedger,
    dirty_content: BTreeSet<EntityId>,
}

impl PendingChanges {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ledger(&self, kind: EntityKind) -> &ChangeLedger {
        match kind {
            EntityKind::Work => &self.works,
            EntityKind::Episode => &self.episodes,
            EntityKind::Plot => &self.plots,
            EntityKind::Character => &self.characters,
            EntityKind::Relation => &self.relations,
        }
    }

    pub fn ledger_mut(&mut self, kind: EntityKind) -> &mut ChangeLedger {
        match kind {
            EntityKind::Work => &mut self.works,
            EntityKind::Episode => &mut self.episodes,
            EntityKind::Plot => &mut self.plots,
            EntityKind::Character => &mut self.characters,
            EntityKind::Relation => &mut self.relations,
        }
    }

    /// Mark a plot body as edited. Does not touch the metadata ledger.
    pub fn mark_content_dirty(&mut self, plot_id: EntityId) {
        self.dirty_content.insert(plot_id);
    }

    /// Forget a plot body edit (plot deleted, or content synced).
    pub fn clear_content_dirty(&mut self, plot_id: EntityId) {
        self.dirty_content.remove(&plot_id);
    }

    #[must_use]
    pub fn dirty_content(&self) -> &BTreeSet<EntityId> {
        &self.dirty_content
    }

    /// The session-wide dirty flag: anything at all unsaved?
    ///
    /// Derived rather than stored; it goes false exactly when a successful
    /// reconciliation or an explicit discard empties every ledger.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty_content.is_empty()
            || EntityKind::ALL
                .iter()
                .any(|kind| !self.ledger(*kind).is_empty())
    }

    /// Drop every pending change (save success or explicit discard).
    pub fn clear_all(&mut self) {
        for kind in EntityKind::ALL {
            self.ledger_mut(kind).clear();
        }
        self.dirty_content.clear();
    }
}
