//! Deterministic in-memory backend for exercising the quill sync engine.
//!
//! [`SimBackend`] implements `RemoteApi` over plain maps, with two test
//! affordances the integration suite leans on:
//!
//! - a **call journal** ([`SimOp`]) recording every call in order, so tests
//!   can assert the exact net operation set a save issued;
//! - **scripted failure injection** ([`SimBackend::fail_when`]), so tests
//!   can reject a specific call mid-save and watch the engine preserve its
//!   queues.
//!
//! Semantics mirror the assumptions the reconciler documents: creates are
//! idempotent on the client-chosen id (an upsert), deletes of unknown ids
//! succeed, and a signed-out session is rejected with a 401. Plot metadata
//! and plot bodies live in separate tables; a freshly created plot has the
//! empty-document sentinel until a content put arrives.

pub mod journal;

pub use journal::SimOp;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use quill_core::model::{Character, EMPTY_DOC, EntityId, Episode, Plot, Relation, Work};
use quill_core::remote::{RemoteApi, RemoteError, UserProfile};

type FailPredicate = Box<dyn Fn(&SimOp) -> bool + Send>;

#[derive(Default)]
struct Inner {
    user: Option<UserProfile>,
    works: BTreeMap<EntityId, Work>,
    episodes: BTreeMap<EntityId, Episode>,
    plots: BTreeMap<EntityId, Plot>,
    characters: BTreeMap<EntityId, Character>,
    /// Relation plus its owning work (the record itself carries none).
    relations: BTreeMap<EntityId, (EntityId, Relation)>,
    /// Plot bodies, keyed by plot id; absent means never written.
    contents: BTreeMap<EntityId, String>,
    log: Vec<SimOp>,
    failure: Option<FailPredicate>,
    pause: Option<FailPredicate>,
}

/// In-memory `RemoteApi` implementation.
#[derive(Default)]
pub struct SimBackend {
    inner: Mutex<Inner>,
}

impl SimBackend {
    /// An empty, signed-out backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty backend with a signed-in account.
    #[must_use]
    pub fn signed_in(sub: &str, email: &str) -> Self {
        let backend = Self::new();
        backend.sign_in(sub, email);
        backend
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park if paused, record the call, then apply any failure rule.
    async fn admit(&self, op: SimOp) -> Result<MutexGuard<'_, Inner>, RemoteError> {
        self.pause_point(op).await;
        let mut inner = self.lock();
        inner.log.push(op);
        if inner.user.is_none() {
            return Err(RemoteError::Rejected {
                status: 401,
                message: "login required".to_string(),
            });
        }
        if inner.failure.as_ref().is_some_and(|rule| rule(&op)) {
            tracing::debug!(?op, "injected failure");
            return Err(RemoteError::Rejected {
                status: 500,
                message: format!("injected failure for {op:?}"),
            });
        }
        Ok(inner)
    }

    // -- session scripting ---------------------------------------------------

    pub fn sign_in(&self, sub: &str, email: &str) {
        self.lock().user = Some(UserProfile {
            sub: sub.to_string(),
            email: email.to_string(),
        });
    }

    pub fn sign_out(&self) {
        self.lock().user = None;
    }

    /// Fail every future call matching `predicate` (until cleared).
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&SimOp) -> bool + Send + 'static,
    {
        self.lock().failure = Some(Box::new(predicate));
    }

    pub fn clear_failure(&self) {
        self.lock().failure = None;
    }

    /// Park every call matching `predicate` until [`SimBackend::clear_pause`].
    ///
    /// A parked call returns `Pending` (re-waking itself), so a test can
    /// hold a save mid-flight, observe in-flight state, then release it.
    pub fn pause_when<F>(&self, predicate: F)
    where
        F: Fn(&SimOp) -> bool + Send + 'static,
    {
        self.lock().pause = Some(Box::new(predicate));
    }

    pub fn clear_pause(&self) {
        self.lock().pause = None;
    }

    async fn pause_point(&self, op: SimOp) {
        loop {
            let parked = self.lock().pause.as_ref().is_some_and(|rule| rule(&op));
            if !parked {
                return;
            }
            yield_once().await;
        }
    }

    // -- durable fixtures ----------------------------------------------------

    pub fn seed_work(&self, work: Work) {
        self.lock().works.insert(work.id, work);
    }

    pub fn seed_episode(&self, episode: Episode) {
        self.lock().episodes.insert(episode.id, episode);
    }

    /// Seed plot metadata; a non-sentinel body goes to the content table.
    pub fn seed_plot(&self, mut plot: Plot) {
        let mut inner = self.lock();
        if plot.has_content() {
            inner.contents.insert(plot.id, plot.content.clone());
        }
        plot.content = EMPTY_DOC.to_string();
        inner.plots.insert(plot.id, plot);
    }

    pub fn seed_character(&self, character: Character) {
        self.lock().characters.insert(character.id, character);
    }

    pub fn seed_relation(&self, work_id: EntityId, relation: Relation) {
        self.lock().relations.insert(relation.id, (work_id, relation));
    }

    // -- inspection ----------------------------------------------------------

    /// Every call made so far, in order.
    #[must_use]
    pub fn log(&self) -> Vec<SimOp> {
        self.lock().log.clone()
    }

    /// Only the calls that change server state, in order.
    #[must_use]
    pub fn mutation_log(&self) -> Vec<SimOp> {
        self.lock()
            .log
            .iter()
            .copied()
            .filter(|op| op.is_mutation())
            .collect()
    }

    pub fn clear_log(&self) {
        self.lock().log.clear();
    }

    #[must_use]
    pub fn work(&self, id: EntityId) -> Option<Work> {
        self.lock().works.get(&id).cloned()
    }

    #[must_use]
    pub fn episode(&self, id: EntityId) -> Option<Episode> {
        self.lock().episodes.get(&id).cloned()
    }

    #[must_use]
    pub fn plot(&self, id: EntityId) -> Option<Plot> {
        self.lock().plots.get(&id).cloned()
    }

    #[must_use]
    pub fn character(&self, id: EntityId) -> Option<Character> {
        self.lock().characters.get(&id).cloned()
    }

    #[must_use]
    pub fn relation(&self, id: EntityId) -> Option<Relation> {
        self.lock().relations.get(&id).map(|(_, r)| r.clone())
    }

    /// The stored body for a plot, if one was ever written.
    #[must_use]
    pub fn plot_content(&self, id: EntityId) -> Option<String> {
        self.lock().contents.get(&id).cloned()
    }

    #[must_use]
    pub fn work_count(&self) -> usize {
        self.lock().works.len()
    }
}

#[async_trait]
impl RemoteApi for SimBackend {
    async fn current_user(&self) -> Result<Option<UserProfile>, RemoteError> {
        let mut inner = self.lock();
        inner.log.push(SimOp::CurrentUser);
        Ok(inner.user.clone())
    }

    async fn list_works(&self) -> Result<Vec<Work>, RemoteError> {
        let inner = self.admit(SimOp::ListWorks).await?;
        Ok(inner.works.values().cloned().collect())
    }

    async fn create_work(&self, work: &Work) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::CreateWork(work.id)).await?;
        inner.works.insert(work.id, work.clone());
        Ok(())
    }

    async fn update_work(&self, work: &Work) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::UpdateWork(work.id)).await?;
        if !inner.works.contains_key(&work.id) {
            return Err(not_found("work", work.id));
        }
        inner.works.insert(work.id, work.clone());
        Ok(())
    }

    async fn delete_work(&self, id: EntityId) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::DeleteWork(id)).await?;
        inner.works.remove(&id);
        Ok(())
    }

    async fn list_episodes(&self, work_id: EntityId) -> Result<Vec<Episode>, RemoteError> {
        let inner = self.admit(SimOp::ListEpisodes(work_id)).await?;
        Ok(inner
            .episodes
            .values()
            .filter(|e| e.work_id == work_id)
            .cloned()
            .collect())
    }

    async fn create_episode(&self, episode: &Episode) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::CreateEpisode(episode.id)).await?;
        if !inner.works.contains_key(&episode.work_id) {
            return Err(not_found("work", episode.work_id));
        }
        inner.episodes.insert(episode.id, episode.clone());
        Ok(())
    }

    async fn update_episode(&self, episode: &Episode) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::UpdateEpisode(episode.id)).await?;
        if !inner.episodes.contains_key(&episode.id) {
            return Err(not_found("episode", episode.id));
        }
        inner.episodes.insert(episode.id, episode.clone());
        Ok(())
    }

    async fn delete_episode(&self, id: EntityId) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::DeleteEpisode(id)).await?;
        inner.episodes.remove(&id);
        Ok(())
    }

    async fn list_plots(&self, episode_id: EntityId) -> Result<Vec<Plot>, RemoteError> {
        let inner = self.admit(SimOp::ListPlots(episode_id)).await?;
        Ok(inner
            .plots
            .values()
            .filter(|p| p.episode_id == episode_id)
            .cloned()
            .collect())
    }

    async fn create_plot(&self, plot: &Plot) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::CreatePlot(plot.id)).await?;
        if !inner.episodes.contains_key(&plot.episode_id) {
            return Err(not_found("episode", plot.episode_id));
        }
        // Metadata only: the body arrives through the content endpoint.
        let mut stored = plot.clone();
        stored.content = EMPTY_DOC.to_string();
        inner.plots.insert(plot.id, stored);
        Ok(())
    }

    async fn update_plot(&self, plot: &Plot) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::UpdatePlot(plot.id)).await?;
        let Some(existing) = inner.plots.get_mut(&plot.id) else {
            return Err(not_found("plot", plot.id));
        };
        existing.title.clone_from(&plot.title);
        existing.order_index = plot.order_index;
        Ok(())
    }

    async fn delete_plot(&self, id: EntityId) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::DeletePlot(id)).await?;
        inner.plots.remove(&id);
        inner.contents.remove(&id);
        Ok(())
    }

    async fn fetch_plot_content(&self, id: EntityId) -> Result<String, RemoteError> {
        let inner = self.admit(SimOp::GetContent(id)).await?;
        Ok(inner
            .contents
            .get(&id)
            .cloned()
            .unwrap_or_else(|| EMPTY_DOC.to_string()))
    }

    async fn store_plot_content(&self, id: EntityId, content: &str) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::PutContent(id)).await?;
        if !inner.plots.contains_key(&id) {
            return Err(not_found("plot", id));
        }
        inner.contents.insert(id, content.to_string());
        Ok(())
    }

    async fn list_characters(&self, work_id: EntityId) -> Result<Vec<Character>, RemoteError> {
        let inner = self.admit(SimOp::ListCharacters(work_id)).await?;
        Ok(inner
            .characters
            .values()
            .filter(|c| c.work_id == work_id)
            .cloned()
            .collect())
    }

    async fn create_character(&self, character: &Character) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::CreateCharacter(character.id)).await?;
        if !inner.works.contains_key(&character.work_id) {
            return Err(not_found("work", character.work_id));
        }
        inner.characters.insert(character.id, character.clone());
        Ok(())
    }

    async fn update_character(&self, character: &Character) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::UpdateCharacter(character.id)).await?;
        if !inner.characters.contains_key(&character.id) {
            return Err(not_found("character", character.id));
        }
        inner.characters.insert(character.id, character.clone());
        Ok(())
    }

    async fn delete_character(&self, id: EntityId) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::DeleteCharacter(id)).await?;
        inner.characters.remove(&id);
        Ok(())
    }

    async fn list_relations(&self, work_id: EntityId) -> Result<Vec<Relation>, RemoteError> {
        let inner = self.admit(SimOp::ListRelations(work_id)).await?;
        Ok(inner
            .relations
            .values()
            .filter(|(owner, _)| *owner == work_id)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn create_relation(
        &self,
        work_id: EntityId,
        relation: &Relation,
    ) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::CreateRelation(relation.id)).await?;
        if !inner.characters.contains_key(&relation.from_character_id)
            || !inner.characters.contains_key(&relation.to_character_id)
        {
            return Err(not_found("character", relation.from_character_id));
        }
        inner.relations.insert(relation.id, (work_id, relation.clone()));
        Ok(())
    }

    async fn delete_relation(&self, id: EntityId) -> Result<(), RemoteError> {
        let mut inner = self.admit(SimOp::DeleteRelation(id)).await?;
        inner.relations.remove(&id);
        Ok(())
    }
}

fn not_found(what: &str, id: EntityId) -> RemoteError {
    RemoteError::Rejected {
        status: 404,
        message: format!("{what} {id} not found"),
    }
}

/// Return `Pending` exactly once, waking immediately so the executor polls
/// again. Lets [`SimBackend::pause_point`] spin cooperatively.
fn yield_once() -> impl std::future::Future<Output = ()> {
    let mut yielded = false;
    std::future::poll_fn(move |cx| {
        if yielded {
            std::task::Poll::Ready(())
        } else {
            yielded = true;
            cx.waker().wake_by_ref();
            std::task::Poll::Pending
        }
    })
}

#[cfg(test)]
mod tests {
    use super::{SimBackend, SimOp};
    use quill_core::model::{EMPTY_DOC, Episode, Plot, Work, WorkKind};
    use quill_core::remote::{RemoteApi, RemoteError};

    fn seeded() -> SimBackend {
        let backend = SimBackend::signed_in("acct-1", "mara@example.com");
        backend.seed_work(Work::new(1, "W", WorkKind::Plot, chrono_now()));
        backend.seed_episode(Episode::new(2, 1, "E", 0));
        backend
    }

    fn chrono_now() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }

    #[tokio::test]
    async fn signed_out_calls_are_rejected_with_401() {
        let backend = SimBackend::new();
        let err = backend.list_works().await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected { status: 401, .. }));
    }

    #[tokio::test]
    async fn create_is_an_upsert_on_the_client_id() {
        let backend = seeded();
        let work = Work::new(1, "renamed", WorkKind::Plot, chrono_now());
        backend.create_work(&work).await.unwrap();
        assert_eq!(backend.work(1).map(|w| w.title), Some("renamed".to_string()));
        assert_eq!(backend.work_count(), 1);
    }

    #[tokio::test]
    async fn delete_of_unknown_id_succeeds() {
        let backend = seeded();
        backend.delete_plot(999).await.unwrap();
    }

    #[tokio::test]
    async fn plot_body_travels_only_through_the_content_endpoint() {
        let backend = seeded();
        let mut plot = Plot::new(3, 2, "Scene", 0);
        plot.content = r#"{"doc":1}"#.to_string();
        backend.create_plot(&plot).await.unwrap();
        // metadata create did not carry the body
        assert_eq!(backend.plot_content(3), None);
        assert_eq!(backend.fetch_plot_content(3).await.unwrap(), EMPTY_DOC);

        backend.store_plot_content(3, r#"{"doc":1}"#).await.unwrap();
        assert_eq!(backend.fetch_plot_content(3).await.unwrap(), r#"{"doc":1}"#);
    }

    #[tokio::test]
    async fn failure_rule_rejects_matching_calls_only() {
        let backend = seeded();
        backend.fail_when(|op| matches!(op, SimOp::CreateEpisode(_)));
        let episode = Episode::new(9, 1, "E2", 1);
        assert!(backend.create_episode(&episode).await.is_err());
        // unrelated calls still succeed
        backend.delete_episode(2).await.unwrap();
        backend.clear_failure();
        backend.create_episode(&episode).await.unwrap();
    }

    #[tokio::test]
    async fn journal_records_attempts_in_order() {
        let backend = seeded();
        backend.fail_when(|op| matches!(op, SimOp::DeleteEpisode(_)));
        let _ = backend.delete_episode(2).await;
        assert_eq!(
            backend.log(),
            [SimOp::DeleteEpisode(2)],
            "failed attempt still journaled"
        );
    }
}
