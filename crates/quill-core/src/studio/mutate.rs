//! The mutation API.
//!
//! Every operation performs the in-memory edit and records it in the
//! pending ledger in the same borrow, so the two can never disagree.
//! Deletes cascade: the descendant set is computed from the store *before*
//! anything is mutated, so the set stays stable while the cascade loop
//! edits the buckets underneath it.

use chrono::Utc;
use std::collections::BTreeSet;

use super::Studio;
use crate::error::ErrorCode;
use crate::model::{
    Character, EntityId, EntityKind, Episode, Plot, Relation, Work, WorkKind,
};
use crate::remote::RemoteError;

/// Error from a mutation call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutateError {
    #[error("work {0} not found")]
    WorkNotFound(EntityId),
    #[error("episode {0} not found")]
    EpisodeNotFound(EntityId),
    #[error("plot {0} not found")]
    PlotNotFound(EntityId),
    #[error("character {0} not found")]
    CharacterNotFound(EntityId),
    #[error("relation {0} not found")]
    RelationNotFound(EntityId),
    #[error("characters {from} and {to} belong to different works")]
    CrossWorkRelation { from: EntityId, to: EntityId },
    #[error("reorder list does not match the current siblings under {parent}")]
    ReorderMismatch { parent: EntityId },
}

impl MutateError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::WorkNotFound(_) => ErrorCode::WorkNotFound,
            Self::EpisodeNotFound(_) => ErrorCode::EpisodeNotFound,
            Self::PlotNotFound(_) => ErrorCode::PlotNotFound,
            Self::CharacterNotFound(_) => ErrorCode::CharacterNotFound,
            Self::RelationNotFound(_) => ErrorCode::RelationNotFound,
            Self::CrossWorkRelation { .. } => ErrorCode::CrossWorkRelation,
            Self::ReorderMismatch { .. } => ErrorCode::ReorderMismatch,
        }
    }
}

impl Studio {
    // -- works ---------------------------------------------------------------

    /// Create a work locally and queue it for the next save.
    pub fn create_work(&self, title: impl Into<String>, kind: WorkKind) -> EntityId {
        let mut state = self.state().borrow_mut();
        let id = state.minter.mint();
        state.store.push_work(Work::new(id, title, kind, Utc::now()));
        state.pending.ledger_mut(EntityKind::Work).record_create(id);
        tracing::debug!(id, "queued work create");
        id
    }

    /// Create a work and push it to the server immediately (optimistic).
    ///
    /// The work is visible in the store while the call is in flight. On
    /// rejection it is removed again and nothing is queued — the caller
    /// decides whether to retry or fall back to [`Studio::create_work`].
    ///
    /// # Errors
    ///
    /// The [`RemoteError`] from the create call, after the local insert has
    /// been rolled back.
    pub async fn create_work_eager(
        &self,
        title: impl Into<String>,
        kind: WorkKind,
    ) -> Result<EntityId, RemoteError> {
        let work = {
            let mut state = self.state().borrow_mut();
            let id = state.minter.mint();
            let work = Work::new(id, title, kind, Utc::now());
            state.store.push_work(work.clone());
            work
        };
        match self.remote().create_work(&work).await {
            Ok(()) => {
                tracing::debug!(id = work.id, "eager work create accepted");
                Ok(work.id)
            }
            Err(err) => {
                self.state().borrow_mut().store.remove_work(work.id);
                tracing::warn!(id = work.id, %err, "eager work create rejected; rolled back");
                Err(err)
            }
        }
    }

    /// # Errors
    ///
    /// [`MutateError::WorkNotFound`] if the work is not in the store.
    pub fn rename_work(&self, id: EntityId, title: impl Into<String>) -> Result<(), MutateError> {
        let mut state = self.state().borrow_mut();
        let work = state.store.work_mut(id).ok_or(MutateError::WorkNotFound(id))?;
        work.title = title.into();
        state.pending.ledger_mut(EntityKind::Work).record_update(id);
        Ok(())
    }

    /// Replace a work's planning document. The blob rides on the work's
    /// metadata record, so this is an ordinary work update.
    ///
    /// # Errors
    ///
    /// [`MutateError::WorkNotFound`] if the work is not in the store.
    pub fn set_planning_doc(
        &self,
        id: EntityId,
        doc: impl Into<String>,
    ) -> Result<(), MutateError> {
        let mut state = self.state().borrow_mut();
        let work = state.store.work_mut(id).ok_or(MutateError::WorkNotFound(id))?;
        work.planning_doc = doc.into();
        state.pending.ledger_mut(EntityKind::Work).record_update(id);
        Ok(())
    }

    /// Delete a work and everything it owns: episodes, their plots, the
    /// work's characters, and every relation touching those characters.
    ///
    /// # Errors
    ///
    /// [`MutateError::WorkNotFound`] if the work is not in the store.
    pub fn delete_work(&self, id: EntityId) -> Result<(), MutateError> {
        let mut state = self.state().borrow_mut();
        if state.store.work(id).is_none() {
            return Err(MutateError::WorkNotFound(id));
        }

        // Cascade set, snapshotted before any mutation.
        let episode_ids: Vec<EntityId> =
            state.store.episodes_of(id).iter().map(|e| e.id).collect();
        let plot_ids: Vec<EntityId> = episode_ids
            .iter()
            .flat_map(|&eid| state.store.plots_of(eid).iter().map(|p| p.id))
            .collect();
        let character_ids: Vec<EntityId> =
            state.store.characters_of(id).iter().map(|c| c.id).collect();
        let relation_ids: BTreeSet<EntityId> = character_ids
            .iter()
            .flat_map(|&cid| state.store.relations_touching(cid))
            .collect();

        for &rid in &relation_ids {
            state.pending.ledger_mut(EntityKind::Relation).record_delete(rid);
            state.store.remove_relation(rid);
        }
        for &cid in &character_ids {
            state.pending.ledger_mut(EntityKind::Character).record_delete(cid);
        }
        state.store.drop_characters_of(id);
        for &pid in &plot_ids {
            state.pending.ledger_mut(EntityKind::Plot).record_delete(pid);
            state.pending.clear_content_dirty(pid);
        }
        for &eid in &episode_ids {
            state.pending.ledger_mut(EntityKind::Episode).record_delete(eid);
            state.store.drop_plots_of(eid);
        }
        state.store.drop_episodes_of(id);
        state.pending.ledger_mut(EntityKind::Work).record_delete(id);
        state.store.remove_work(id);
        state.prune_selection();
        tracing::debug!(
            id,
            episodes = episode_ids.len(),
            plots = plot_ids.len(),
            characters = character_ids.len(),
            relations = relation_ids.len(),
            "deleted work with cascade"
        );
        Ok(())
    }

    // -- episodes ------------------------------------------------------------

    /// # Errors
    ///
    /// [`MutateError::WorkNotFound`] if the owning work is not in the store.
    pub fn create_episode(
        &self,
        work_id: EntityId,
        title: impl Into<String>,
    ) -> Result<EntityId, MutateError> {
        let mut state = self.state().borrow_mut();
        if state.store.work(work_id).is_none() {
            return Err(MutateError::WorkNotFound(work_id));
        }
        let id = state.minter.mint();
        let order = state.store.next_episode_order(work_id);
        state.store.push_episode(Episode::new(id, work_id, title, order));
        state.pending.ledger_mut(EntityKind::Episode).record_create(id);
        Ok(id)
    }

    /// # Errors
    ///
    /// [`MutateError::EpisodeNotFound`] if the episode is not in the store.
    pub fn rename_episode(
        &self,
        id: EntityId,
        title: impl Into<String>,
    ) -> Result<(), MutateError> {
        let mut state = self.state().borrow_mut();
        let episode = state
            .store
            .episode_mut(id)
            .ok_or(MutateError::EpisodeNotFound(id))?;
        episode.title = title.into();
        state.pending.ledger_mut(EntityKind::Episode).record_update(id);
        Ok(())
    }

    /// Delete an episode and its plots.
    ///
    /// # Errors
    ///
    /// [`MutateError::EpisodeNotFound`] if the episode is not in the store.
    pub fn delete_episode(&self, id: EntityId) -> Result<(), MutateError> {
        let mut state = self.state().borrow_mut();
        if state.store.episode(id).is_none() {
            return Err(MutateError::EpisodeNotFound(id));
        }
        let plot_ids: Vec<EntityId> = state.store.plots_of(id).iter().map(|p| p.id).collect();
        for &pid in &plot_ids {
            state.pending.ledger_mut(EntityKind::Plot).record_delete(pid);
            state.pending.clear_content_dirty(pid);
        }
        state.store.drop_plots_of(id);
        state.pending.ledger_mut(EntityKind::Episode).record_delete(id);
        state.store.remove_episode(id);
        state.prune_selection();
        tracing::debug!(id, plots = plot_ids.len(), "deleted episode with cascade");
        Ok(())
    }

    /// Apply a full sibling ordering to a work's episodes. Every member
    /// ends up pending-update (dense indices are rewritten wholesale).
    ///
    /// # Errors
    ///
    /// [`MutateError::ReorderMismatch`] if `order` is not a permutation of
    /// the current bucket.
    pub fn reorder_episodes(
        &self,
        work_id: EntityId,
        order: &[EntityId],
    ) -> Result<(), MutateError> {
        let mut state = self.state().borrow_mut();
        if !state.store.set_episode_order(work_id, order) {
            return Err(MutateError::ReorderMismatch { parent: work_id });
        }
        for &id in order {
            state.pending.ledger_mut(EntityKind::Episode).record_update(id);
        }
        Ok(())
    }

    // -- plots ---------------------------------------------------------------

    /// # Errors
    ///
    /// [`MutateError::EpisodeNotFound`] if the owning episode is not in the
    /// store.
    pub fn create_plot(
        &self,
        episode_id: EntityId,
        title: impl Into<String>,
    ) -> Result<EntityId, MutateError> {
        let mut state = self.state().borrow_mut();
        if state.store.episode(episode_id).is_none() {
            return Err(MutateError::EpisodeNotFound(episode_id));
        }
        let id = state.minter.mint();
        let order = state.store.next_plot_order(episode_id);
        state.store.push_plot(Plot::new(id, episode_id, title, order));
        state.pending.ledger_mut(EntityKind::Plot).record_create(id);
        Ok(id)
    }

    /// # Errors
    ///
    /// [`MutateError::PlotNotFound`] if the plot is not in the store.
    pub fn rename_plot(&self, id: EntityId, title: impl Into<String>) -> Result<(), MutateError> {
        let mut state = self.state().borrow_mut();
        let plot = state.store.plot_mut(id).ok_or(MutateError::PlotNotFound(id))?;
        plot.title = title.into();
        state.pending.ledger_mut(EntityKind::Plot).record_update(id);
        Ok(())
    }

    /// Replace title and body together (the scene editor's save path).
    ///
    /// # Errors
    ///
    /// [`MutateError::PlotNotFound`] if the plot is not in the store.
    pub fn update_plot(
        &self,
        id: EntityId,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<(), MutateError> {
        let mut state = self.state().borrow_mut();
        let plot = state.store.plot_mut(id).ok_or(MutateError::PlotNotFound(id))?;
        plot.title = title.into();
        plot.content = content.into();
        state.pending.ledger_mut(EntityKind::Plot).record_update(id);
        state.pending.mark_content_dirty(id);
        Ok(())
    }

    /// Replace only the body. Content edits never enqueue a metadata
    /// update; the body syncs through the content endpoint on save.
    ///
    /// # Errors
    ///
    /// [`MutateError::PlotNotFound`] if the plot is not in the store.
    pub fn set_plot_content(
        &self,
        id: EntityId,
        content: impl Into<String>,
    ) -> Result<(), MutateError> {
        let mut state = self.state().borrow_mut();
        let plot = state.store.plot_mut(id).ok_or(MutateError::PlotNotFound(id))?;
        plot.content = content.into();
        state.pending.mark_content_dirty(id);
        Ok(())
    }

    /// Delete a plot and forget any unsaved body edit.
    ///
    /// # Errors
    ///
    /// [`MutateError::PlotNotFound`] if the plot is not in the store.
    pub fn delete_plot(&self, id: EntityId) -> Result<(), MutateError> {
        let mut state = self.state().borrow_mut();
        if state.store.remove_plot(id).is_none() {
            return Err(MutateError::PlotNotFound(id));
        }
        state.pending.ledger_mut(EntityKind::Plot).record_delete(id);
        state.pending.clear_content_dirty(id);
        state.prune_selection();
        Ok(())
    }

    /// Apply a full sibling ordering to an episode's plots.
    ///
    /// # Errors
    ///
    /// [`MutateError::ReorderMismatch`] if `order` is not a permutation of
    /// the current bucket.
    pub fn reorder_plots(
        &self,
        episode_id: EntityId,
        order: &[EntityId],
    ) -> Result<(), MutateError> {
        let mut state = self.state().borrow_mut();
        if !state.store.set_plot_order(episode_id, order) {
            return Err(MutateError::ReorderMismatch { parent: episode_id });
        }
        for &id in order {
            state.pending.ledger_mut(EntityKind::Plot).record_update(id);
        }
        Ok(())
    }

    // -- characters ----------------------------------------------------------

    /// # Errors
    ///
    /// [`MutateError::WorkNotFound`] if the owning work is not in the store.
    pub fn create_character(
        &self,
        work_id: EntityId,
        name: impl Into<String>,
        color: impl Into<String>,
    ) -> Result<EntityId, MutateError> {
        let mut state = self.state().borrow_mut();
        if state.store.work(work_id).is_none() {
            return Err(MutateError::WorkNotFound(work_id));
        }
        let id = state.minter.mint();
        state.store.push_character(Character::new(id, work_id, name, color));
        state.pending.ledger_mut(EntityKind::Character).record_create(id);
        Ok(id)
    }

    /// Replace a character's editable fields.
    ///
    /// # Errors
    ///
    /// [`MutateError::CharacterNotFound`] if the character is not in the
    /// store.
    #[allow(clippy::too_many_arguments)]
    pub fn update_character(
        &self,
        id: EntityId,
        name: impl Into<String>,
        color: impl Into<String>,
        properties: impl Into<String>,
        memo: impl Into<String>,
        image: Option<String>,
    ) -> Result<(), MutateError> {
        let mut state = self.state().borrow_mut();
        let character = state
            .store
            .character_mut(id)
            .ok_or(MutateError::CharacterNotFound(id))?;
        character.name = name.into();
        character.color = color.into();
        character.properties = properties.into();
        character.memo = memo.into();
        character.image = image;
        state.pending.ledger_mut(EntityKind::Character).record_update(id);
        Ok(())
    }

    /// Delete a character and every relation where it is source or target.
    ///
    /// # Errors
    ///
    /// [`MutateError::CharacterNotFound`] if the character is not in the
    /// store.
    pub fn delete_character(&self, id: EntityId) -> Result<(), MutateError> {
        let mut state = self.state().borrow_mut();
        if state.store.character(id).is_none() {
            return Err(MutateError::CharacterNotFound(id));
        }
        let relation_ids = state.store.relations_touching(id);
        for &rid in &relation_ids {
            state.pending.ledger_mut(EntityKind::Relation).record_delete(rid);
            state.store.remove_relation(rid);
        }
        state.pending.ledger_mut(EntityKind::Character).record_delete(id);
        state.store.remove_character(id);
        state.prune_selection();
        tracing::debug!(id, relations = relation_ids.len(), "deleted character with cascade");
        Ok(())
    }

    // -- relations -----------------------------------------------------------

    /// Link two characters of the same work with a directed, labeled edge.
    ///
    /// # Errors
    ///
    /// [`MutateError::CharacterNotFound`] for a missing endpoint;
    /// [`MutateError::CrossWorkRelation`] when the endpoints belong to
    /// different works.
    pub fn create_relation(
        &self,
        from: EntityId,
        to: EntityId,
        label: impl Into<String>,
    ) -> Result<EntityId, MutateError> {
        let mut state = self.state().borrow_mut();
        let from_work = state
            .store
            .work_of_character(from)
            .ok_or(MutateError::CharacterNotFound(from))?;
        let to_work = state
            .store
            .work_of_character(to)
            .ok_or(MutateError::CharacterNotFound(to))?;
        if from_work != to_work {
            return Err(MutateError::CrossWorkRelation { from, to });
        }
        let id = state.minter.mint();
        state.store.push_relation(Relation::new(id, from, to, label));
        state.pending.ledger_mut(EntityKind::Relation).record_create(id);
        Ok(id)
    }

    /// # Errors
    ///
    /// [`MutateError::RelationNotFound`] if the relation is not in the
    /// store.
    pub fn delete_relation(&self, id: EntityId) -> Result<(), MutateError> {
        let mut state = self.state().borrow_mut();
        if state.store.remove_relation(id).is_none() {
            return Err(MutateError::RelationNotFound(id));
        }
        state.pending.ledger_mut(EntityKind::Relation).record_delete(id);
        Ok(())
    }
}
