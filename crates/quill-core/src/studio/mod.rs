//! The studio session: the service object every UI surface talks to.
//!
//! One [`Studio`] is constructed per application session with an injected
//! [`RemoteApi`] and passed by reference to consumers — there is no ambient
//! global. All interleaving happens on one logical thread (UI callbacks and
//! resumed futures), so state lives behind `RefCell`/`Cell` and the type is
//! deliberately `!Send`. Borrows are never held across an await point.
//!
//! Mutations edit the in-memory store *and* record themselves in the
//! pending ledger ([`mutate`]); nothing reaches the network until
//! [`Studio::save_all`] ([`reconcile`]) — with the single exception of the
//! eager work-create path, which is optimistic and rolls itself back.

pub mod mutate;
pub mod reconcile;

pub use mutate::MutateError;
pub use reconcile::{SaveError, SaveOutcome};

use std::cell::{Cell, Ref, RefCell};
use std::sync::Arc;

use crate::error::ErrorCode;
use crate::model::{EMPTY_DOC, EntityId, IdMinter};
use crate::pending::PendingChanges;
use crate::remote::{RemoteApi, UserProfile};
use crate::store::EntityStore;

/// What the user currently has open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub work: Option<EntityId>,
    pub episode: Option<EntityId>,
    /// Multi-select: plots highlighted in the scene board.
    pub plots: Vec<EntityId>,
    pub character: Option<EntityId>,
}

/// Error from a selection change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    /// Switching works would silently drop pending changes; the caller must
    /// save first or go through [`Studio::discard_and_select_work`].
    #[error("unsaved changes present; save or discard before switching works")]
    UnsavedChanges,
}

impl SelectError {
    #[must_use]
    pub const fn code(self) -> ErrorCode {
        match self {
            Self::UnsavedChanges => ErrorCode::UnsavedChanges,
        }
    }
}

/// Everything mutable in one session, behind the studio's `RefCell`.
pub(crate) struct SessionState {
    pub(crate) store: EntityStore,
    pub(crate) pending: PendingChanges,
    pub(crate) minter: IdMinter,
    pub(crate) selection: Selection,
    pub(crate) user: Option<UserProfile>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            store: EntityStore::new(),
            pending: PendingChanges::new(),
            minter: IdMinter::new(),
            selection: Selection::default(),
            user: None,
        }
    }

    /// Drop selection entries that no longer resolve in the store. Called
    /// after every delete so cascades clear stale selections uniformly.
    pub(crate) fn prune_selection(&mut self) {
        if let Some(id) = self.selection.work {
            if self.store.work(id).is_none() {
                self.selection = Selection::default();
                return;
            }
        }
        if let Some(id) = self.selection.episode {
            if self.store.episode(id).is_none() {
                self.selection.episode = None;
                self.selection.plots.clear();
            }
        }
        let store = &self.store;
        self.selection.plots.retain(|id| store.plot(*id).is_some());
        if let Some(id) = self.selection.character {
            if store.character(id).is_none() {
                self.selection.character = None;
            }
        }
    }
}

/// The per-session service object.
pub struct Studio {
    remote: Arc<dyn RemoteApi>,
    state: RefCell<SessionState>,
    saving: Cell<bool>,
}

impl Studio {
    /// Build a session around a remote backend.
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteApi>) -> Self {
        Self {
            remote,
            state: RefCell::new(SessionState::new()),
            saving: Cell::new(false),
        }
    }

    pub(crate) fn remote(&self) -> &Arc<dyn RemoteApi> {
        &self.remote
    }

    pub(crate) fn state(&self) -> &RefCell<SessionState> {
        &self.state
    }

    pub(crate) fn saving_flag(&self) -> &Cell<bool> {
        &self.saving
    }

    // -- observable state ----------------------------------------------------

    /// Read access to the entity tables. Do not hold the guard across an
    /// await point.
    #[must_use]
    pub fn store(&self) -> Ref<'_, EntityStore> {
        Ref::map(self.state.borrow(), |s| &s.store)
    }

    #[must_use]
    pub fn selection(&self) -> Selection {
        self.state.borrow().selection.clone()
    }

    /// Anything unsaved in this session?
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state.borrow().pending.is_dirty()
    }

    /// Is a reconciliation currently in flight?
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.saving.get()
    }

    /// The cached account, as of the last [`Studio::refresh_user`].
    #[must_use]
    pub fn user(&self) -> Option<UserProfile> {
        self.state.borrow().user.clone()
    }

    // -- auth ----------------------------------------------------------------

    /// Probe the current-user endpoint and cache the answer. The cache is
    /// what gates [`Studio::save_all`], so callers refresh after any
    /// sign-in/sign-out navigation.
    pub async fn refresh_user(&self) -> Option<UserProfile> {
        let user = match self.remote.current_user().await {
            Ok(user) => user,
            Err(err) => {
                tracing::warn!(%err, "current-user probe failed; treating session as anonymous");
                None
            }
        };
        self.state.borrow_mut().user = user.clone();
        user
    }

    /// Forget the cached account. Local edits stay; saving is gated until
    /// the next successful [`Studio::refresh_user`].
    pub fn sign_out(&self) {
        self.state.borrow_mut().user = None;
    }

    // -- loading -------------------------------------------------------------

    /// Replace the work list from the server. A failed fetch leaves an
    /// empty list; the session stays usable offline.
    pub async fn load_works(&self) {
        let works = match self.remote.list_works().await {
            Ok(works) => works,
            Err(err) => {
                tracing::warn!(%err, "work list load failed; substituting empty bucket");
                Vec::new()
            }
        };
        tracing::debug!(count = works.len(), "loaded works");
        let mut state = self.state.borrow_mut();
        state.minter.observe_all(works.iter().map(|w| w.id));
        state.store.set_works(works);
    }

    /// Replace one work's episode bucket from the server.
    pub async fn load_episodes(&self, work_id: EntityId) {
        let episodes = match self.remote.list_episodes(work_id).await {
            Ok(episodes) => episodes,
            Err(err) => {
                tracing::warn!(work_id, %err, "episode load failed; substituting empty bucket");
                Vec::new()
            }
        };
        tracing::debug!(work_id, count = episodes.len(), "loaded episodes");
        let mut state = self.state.borrow_mut();
        state.minter.observe_all(episodes.iter().map(|e| e.id));
        state.store.set_episodes(work_id, episodes);
    }

    /// Replace one episode's plot bucket from the server. Bodies are not
    /// fetched here; see [`Studio::load_plot_content`].
    pub async fn load_plots(&self, episode_id: EntityId) {
        let plots = match self.remote.list_plots(episode_id).await {
            Ok(plots) => plots,
            Err(err) => {
                tracing::warn!(episode_id, %err, "plot load failed; substituting empty bucket");
                Vec::new()
            }
        };
        tracing::debug!(episode_id, count = plots.len(), "loaded plots");
        let mut state = self.state.borrow_mut();
        state.minter.observe_all(plots.iter().map(|p| p.id));
        state.store.set_plots(episode_id, plots);
    }

    /// Replace one work's character bucket from the server.
    pub async fn load_characters(&self, work_id: EntityId) {
        let characters = match self.remote.list_characters(work_id).await {
            Ok(characters) => characters,
            Err(err) => {
                tracing::warn!(work_id, %err, "character load failed; substituting empty bucket");
                Vec::new()
            }
        };
        tracing::debug!(work_id, count = characters.len(), "loaded characters");
        let mut state = self.state.borrow_mut();
        state.minter.observe_all(characters.iter().map(|c| c.id));
        state.store.set_characters(work_id, characters);
    }

    /// Replace the relation list from the server (scoped to one work).
    pub async fn load_relations(&self, work_id: EntityId) {
        let relations = match self.remote.list_relations(work_id).await {
            Ok(relations) => relations,
            Err(err) => {
                tracing::warn!(work_id, %err, "relation load failed; substituting empty bucket");
                Vec::new()
            }
        };
        tracing::debug!(work_id, count = relations.len(), "loaded relations");
        let mut state = self.state.borrow_mut();
        state.minter.observe_all(relations.iter().map(|r| r.id));
        state.store.set_relations(relations);
    }

    /// Fetch a plot body on demand and cache it in the store.
    ///
    /// Returns the body (the empty-document sentinel on any fetch failure).
    /// A body with unsaved local edits is returned as-is and never
    /// overwritten by the fetch.
    pub async fn load_plot_content(&self, plot_id: EntityId) -> String {
        {
            let state = self.state.borrow();
            if state.pending.dirty_content().contains(&plot_id) {
                if let Some(plot) = state.store.plot(plot_id) {
                    return plot.content.clone();
                }
            }
        }
        let content = match self.remote.fetch_plot_content(plot_id).await {
            Ok(content) if content.is_empty() => EMPTY_DOC.to_string(),
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(plot_id, %err, "plot content fetch failed; using empty document");
                EMPTY_DOC.to_string()
            }
        };
        let mut state = self.state.borrow_mut();
        if let Some(plot) = state.store.plot_mut(plot_id) {
            plot.content.clone_from(&content);
        }
        content
    }

    // -- selection -----------------------------------------------------------

    /// Open a work and lazily load its episodes, characters, and relations.
    ///
    /// # Errors
    ///
    /// [`SelectError::UnsavedChanges`] when pending changes exist — they
    /// would be silently dropped by the reload. The UI confirms with the
    /// user and calls [`Studio::discard_and_select_work`] to proceed.
    pub async fn select_work(&self, id: EntityId) -> Result<(), SelectError> {
        if self.is_dirty() {
            return Err(SelectError::UnsavedChanges);
        }
        self.select_work_unchecked(id).await;
        Ok(())
    }

    /// Drop every pending change, reload the work list (erasing any
    /// locally-created-but-unsaved works from view), then open `id`.
    pub async fn discard_and_select_work(&self, id: EntityId) {
        self.discard_changes();
        self.load_works().await;
        self.select_work_unchecked(id).await;
    }

    /// Drop every pending change without touching the server.
    pub fn discard_changes(&self) {
        let mut state = self.state.borrow_mut();
        if state.pending.is_dirty() {
            tracing::info!("discarding pending changes");
        }
        state.pending.clear_all();
    }

    async fn select_work_unchecked(&self, id: EntityId) {
        {
            let mut state = self.state.borrow_mut();
            state.selection = Selection {
                work: Some(id),
                ..Selection::default()
            };
        }
        futures::join!(
            self.load_episodes(id),
            self.load_characters(id),
            self.load_relations(id),
        );
    }

    /// Open an episode and lazily load its plots. Unconditional: episodes
    /// within the selected work share the same pending queues.
    pub async fn select_episode(&self, id: EntityId) {
        {
            let mut state = self.state.borrow_mut();
            state.selection.episode = Some(id);
            state.selection.plots.clear();
        }
        self.load_plots(id).await;
    }

    /// Highlight a plot; `multi` toggles membership instead of replacing.
    pub fn select_plot(&self, id: EntityId, multi: bool) {
        let mut state = self.state.borrow_mut();
        let plots = &mut state.selection.plots;
        if multi {
            if let Some(pos) = plots.iter().position(|p| *p == id) {
                plots.remove(pos);
            } else {
                plots.push(id);
            }
        } else {
            *plots = vec![id];
        }
    }

    pub fn select_character(&self, id: Option<EntityId>) {
        self.state.borrow_mut().selection.character = id;
    }
}
