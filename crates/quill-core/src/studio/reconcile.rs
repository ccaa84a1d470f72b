//! Save reconciliation: collapse the session's pending changes into the
//! minimal set of remote calls and issue them in dependency order.
//!
//! # Ordering
//!
//! Deletes go child-first (relations, characters, plots, episodes, works)
//! so the server never holds a child whose parent is already gone; creates
//! go parent-first (the reverse), since a child create requires its parent
//! to exist server-side. Metadata updates and content puts have no
//! cross-entity dependencies and run concurrently within their step.
//!
//! # Failure
//!
//! Fail-fast: the first rejected call abandons the remaining steps. Every
//! ledger is left untouched so a retry recomputes — and re-issues — the
//! identical net operation set. Only the in-flight flag is cleared.
//! Repeated creates with the same client-chosen id are assumed idempotent
//! server-side; there is no per-id success tracking across retries.

use futures::future::try_join_all;

use super::Studio;
use crate::error::ErrorCode;
use crate::model::{Character, EntityId, EntityKind, Episode, Plot, Relation, Work};
use crate::remote::{OpAction, RemoteError, RemoteOp};

/// How a [`Studio::save_all`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// All pending changes reached the server; queues are clear.
    Saved,
    /// Another reconciliation is in flight; this call did nothing.
    InFlight,
}

/// Error from a reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SaveError {
    /// Rejected synchronously before any remote call.
    #[error("not signed in; local edits are kept until you sign in and save")]
    NotLoggedIn,
    /// A remote call failed; pending changes are preserved for retry.
    #[error("save failed at {op}: {source}")]
    Remote {
        op: RemoteOp,
        #[source]
        source: RemoteError,
    },
}

impl SaveError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotLoggedIn => ErrorCode::NotLoggedIn,
            Self::Remote { source, .. } => source.code(),
        }
    }
}

/// Owned snapshot of the net operation set, resolved against the store at
/// the start of a save so no state borrow is held across an await.
#[derive(Debug)]
struct SavePlan {
    delete_relations: Vec<EntityId>,
    delete_characters: Vec<EntityId>,
    delete_plots: Vec<EntityId>,
    delete_episodes: Vec<EntityId>,
    delete_works: Vec<EntityId>,
    create_works: Vec<Work>,
    create_episodes: Vec<Episode>,
    create_plots: Vec<Plot>,
    create_characters: Vec<Character>,
    /// Relation plus its derived owning work (relations carry none).
    create_relations: Vec<(EntityId, Relation)>,
    update_works: Vec<Work>,
    update_episodes: Vec<Episode>,
    update_plots: Vec<Plot>,
    update_characters: Vec<Character>,
    content_puts: Vec<(EntityId, String)>,
}

impl SavePlan {
    fn delete_count(&self) -> usize {
        self.delete_relations.len()
            + self.delete_characters.len()
            + self.delete_plots.len()
            + self.delete_episodes.len()
            + self.delete_works.len()
    }

    fn create_count(&self) -> usize {
        self.create_works.len()
            + self.create_episodes.len()
            + self.create_plots.len()
            + self.create_characters.len()
            + self.create_relations.len()
    }

    fn update_count(&self) -> usize {
        self.update_works.len()
            + self.update_episodes.len()
            + self.update_plots.len()
            + self.update_characters.len()
    }

    fn is_empty(&self) -> bool {
        self.delete_count() == 0
            && self.create_count() == 0
            && self.update_count() == 0
            && self.content_puts.is_empty()
    }
}

fn op_err(op: RemoteOp) -> impl FnOnce(RemoteError) -> SaveError {
    move |source| SaveError::Remote { op, source }
}

impl Studio {
    /// Reconcile every pending change with the server.
    ///
    /// Single-flight: a call made while another save is outstanding returns
    /// [`SaveOutcome::InFlight`] without touching the network. On success
    /// all queues and the dirty flag clear atomically; on failure they are
    /// preserved unchanged so the user can retry.
    ///
    /// # Errors
    ///
    /// [`SaveError::NotLoggedIn`] synchronously when no account is cached;
    /// [`SaveError::Remote`] when a remote call is rejected mid-save.
    pub async fn save_all(&self) -> Result<SaveOutcome, SaveError> {
        if self.saving_flag().get() {
            tracing::debug!("save already in flight; ignoring");
            return Ok(SaveOutcome::InFlight);
        }
        if self.state().borrow().user.is_none() {
            tracing::debug!("save rejected: not signed in");
            return Err(SaveError::NotLoggedIn);
        }
        self.saving_flag().set(true);
        let result = self.run_save().await;
        self.saving_flag().set(false);
        result?;
        Ok(SaveOutcome::Saved)
    }

    async fn run_save(&self) -> Result<(), SaveError> {
        let plan = self.build_plan();
        if plan.is_empty() {
            tracing::debug!("nothing to save");
            return Ok(());
        }
        tracing::info!(
            deletes = plan.delete_count(),
            creates = plan.create_count(),
            updates = plan.update_count(),
            contents = plan.content_puts.len(),
            "reconciling pending changes"
        );

        self.issue_deletes(&plan).await?;
        self.issue_creates(&plan).await?;
        self.issue_updates(&plan).await?;
        self.issue_content_puts(&plan).await?;

        self.state().borrow_mut().pending.clear_all();
        tracing::info!("save complete");
        Ok(())
    }

    /// Snapshot the net operation set. The ledger state machine already
    /// cancelled same-session create+delete pairs, so the three sets per
    /// kind are disjoint by construction.
    ///
    /// Creates and updates resolve to the entity's latest in-memory state;
    /// an id whose record is gone from the store has nothing sendable (the
    /// mutation API removes ledger entries when it removes records, so this
    /// is a skip-with-log, not an error).
    fn build_plan(&self) -> SavePlan {
        let state = self.state().borrow();
        let store = &state.store;
        let pending = &state.pending;

        let delete_plots = pending.ledger(EntityKind::Plot).deletes();
        let content_puts = pending
            .dirty_content()
            .iter()
            .copied()
            .filter(|id| !delete_plots.contains(id))
            .filter_map(|id| store.plot(id))
            .filter(|plot| plot.has_content())
            .map(|plot| (plot.id, plot.content.clone()))
            .collect();

        SavePlan {
            delete_relations: pending.ledger(EntityKind::Relation).deletes(),
            delete_characters: pending.ledger(EntityKind::Character).deletes(),
            delete_plots,
            delete_episodes: pending.ledger(EntityKind::Episode).deletes(),
            delete_works: pending.ledger(EntityKind::Work).deletes(),
            create_works: resolve(pending.ledger(EntityKind::Work).creates(), |id| {
                store.work(id).cloned()
            }),
            create_episodes: resolve(pending.ledger(EntityKind::Episode).creates(), |id| {
                store.episode(id).cloned()
            }),
            create_plots: resolve(pending.ledger(EntityKind::Plot).creates(), |id| {
                store.plot(id).cloned()
            }),
            create_characters: resolve(pending.ledger(EntityKind::Character).creates(), |id| {
                store.character(id).cloned()
            }),
            create_relations: resolve(pending.ledger(EntityKind::Relation).creates(), |id| {
                let relation = store.relation(id)?;
                let work_id = store.work_of_relation(relation)?;
                Some((work_id, relation.clone()))
            }),
            update_works: resolve(pending.ledger(EntityKind::Work).updates(), |id| {
                store.work(id).cloned()
            }),
            update_episodes: resolve(pending.ledger(EntityKind::Episode).updates(), |id| {
                store.episode(id).cloned()
            }),
            update_plots: resolve(pending.ledger(EntityKind::Plot).updates(), |id| {
                store.plot(id).cloned()
            }),
            update_characters: resolve(pending.ledger(EntityKind::Character).updates(), |id| {
                store.character(id).cloned()
            }),
            content_puts,
        }
    }

    /// Step: remote deletes, child-first.
    async fn issue_deletes(&self, plan: &SavePlan) -> Result<(), SaveError> {
        let remote = self.remote();
        try_join_all(plan.delete_relations.iter().map(|&id| async move {
            remote
                .delete_relation(id)
                .await
                .map_err(op_err(RemoteOp::new(OpAction::Delete, EntityKind::Relation, id)))
        }))
        .await?;
        try_join_all(plan.delete_characters.iter().map(|&id| async move {
            remote
                .delete_character(id)
                .await
                .map_err(op_err(RemoteOp::new(OpAction::Delete, EntityKind::Character, id)))
        }))
        .await?;
        try_join_all(plan.delete_plots.iter().map(|&id| async move {
            remote
                .delete_plot(id)
                .await
                .map_err(op_err(RemoteOp::new(OpAction::Delete, EntityKind::Plot, id)))
        }))
        .await?;
        try_join_all(plan.delete_episodes.iter().map(|&id| async move {
            remote
                .delete_episode(id)
                .await
                .map_err(op_err(RemoteOp::new(OpAction::Delete, EntityKind::Episode, id)))
        }))
        .await?;
        try_join_all(plan.delete_works.iter().map(|&id| async move {
            remote
                .delete_work(id)
                .await
                .map_err(op_err(RemoteOp::new(OpAction::Delete, EntityKind::Work, id)))
        }))
        .await?;
        Ok(())
    }

    /// Step: remote creates, parent-first.
    async fn issue_creates(&self, plan: &SavePlan) -> Result<(), SaveError> {
        let remote = self.remote();
        try_join_all(plan.create_works.iter().map(|work| async move {
            remote
                .create_work(work)
                .await
                .map_err(op_err(RemoteOp::new(OpAction::Create, EntityKind::Work, work.id)))
        }))
        .await?;
        try_join_all(plan.create_episodes.iter().map(|episode| async move {
            remote
                .create_episode(episode)
                .await
                .map_err(op_err(RemoteOp::new(OpAction::Create, EntityKind::Episode, episode.id)))
        }))
        .await?;
        try_join_all(plan.create_plots.iter().map(|plot| async move {
            remote
                .create_plot(plot)
                .await
                .map_err(op_err(RemoteOp::new(OpAction::Create, EntityKind::Plot, plot.id)))
        }))
        .await?;
        try_join_all(plan.create_characters.iter().map(|character| async move {
            remote.create_character(character).await.map_err(op_err(RemoteOp::new(
                OpAction::Create,
                EntityKind::Character,
                character.id,
            )))
        }))
        .await?;
        try_join_all(
            plan.create_relations
                .iter()
                .map(|(work_id, relation)| async move {
                    remote
                        .create_relation(*work_id, relation)
                        .await
                        .map_err(op_err(RemoteOp::new(
                            OpAction::Create,
                            EntityKind::Relation,
                            relation.id,
                        )))
                }),
        )
        .await?;
        Ok(())
    }

    /// Step: metadata updates, concurrent within each kind.
    async fn issue_updates(&self, plan: &SavePlan) -> Result<(), SaveError> {
        let remote = self.remote();
        try_join_all(plan.update_works.iter().map(|work| async move {
            remote
                .update_work(work)
                .await
                .map_err(op_err(RemoteOp::new(OpAction::Update, EntityKind::Work, work.id)))
        }))
        .await?;
        try_join_all(plan.update_episodes.iter().map(|episode| async move {
            remote
                .update_episode(episode)
                .await
                .map_err(op_err(RemoteOp::new(OpAction::Update, EntityKind::Episode, episode.id)))
        }))
        .await?;
        try_join_all(plan.update_plots.iter().map(|plot| async move {
            remote
                .update_plot(plot)
                .await
                .map_err(op_err(RemoteOp::new(OpAction::Update, EntityKind::Plot, plot.id)))
        }))
        .await?;
        try_join_all(plan.update_characters.iter().map(|character| async move {
            remote.update_character(character).await.map_err(op_err(RemoteOp::new(
                OpAction::Update,
                EntityKind::Character,
                character.id,
            )))
        }))
        .await?;
        Ok(())
    }

    /// Step: plot bodies, all concurrent. Sentinel bodies were already
    /// filtered out of the plan.
    async fn issue_content_puts(&self, plan: &SavePlan) -> Result<(), SaveError> {
        let remote = self.remote();
        try_join_all(plan.content_puts.iter().map(|(id, content)| async move {
            remote
                .store_plot_content(*id, content)
                .await
                .map_err(op_err(RemoteOp::new(OpAction::PutContent, EntityKind::Plot, *id)))
        }))
        .await?;
        Ok(())
    }
}

fn resolve<T>(ids: Vec<EntityId>, mut lookup: impl FnMut(EntityId) -> Option<T>) -> Vec<T> {
    ids.into_iter()
        .filter_map(|id| {
            let found = lookup(id);
            if found.is_none() {
                tracing::debug!(id, "pending id has no record in the store; skipping");
            }
            found
        })
        .collect()
}
