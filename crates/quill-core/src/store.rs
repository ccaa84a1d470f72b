//! In-memory entity store: current-session truth for all five kinds.
//!
//! Children live in parent-keyed buckets so sibling lookups are O(1);
//! lookups by bare id scan the buckets, which is fine at session scale
//! (tens of episodes, hundreds of plots). Buckets are replaced wholesale on
//! load and sorted the way the server lists them: works by creation time,
//! episodes and plots by `order_index`, characters by name.

use std::collections::BTreeMap;

use crate::model::{Character, EntityId, Episode, Plot, Relation, Work};

/// Normalized tables for one editing session.
#[derive(Debug, Default)]
pub struct EntityStore {
    works: Vec<Work>,
    /// Episodes keyed by owning work.
    episodes: BTreeMap<EntityId, Vec<Episode>>,
    /// Plots keyed by owning episode.
    plots: BTreeMap<EntityId, Vec<Plot>>,
    /// Characters keyed by owning work.
    characters: BTreeMap<EntityId, Vec<Character>>,
    /// Relations of the active work.
    relations: Vec<Relation>,
}

impl EntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- works --------------------------------------------------------------

    #[must_use]
    pub fn works(&self) -> &[Work] {
        &self.works
    }

    pub fn set_works(&mut self, mut works: Vec<Work>) {
        works.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        self.works = works;
    }

    #[must_use]
    pub fn work(&self, id: EntityId) -> Option<&Work> {
        self.works.iter().find(|w| w.id == id)
    }

    pub fn work_mut(&mut self, id: EntityId) -> Option<&mut Work> {
        self.works.iter_mut().find(|w| w.id == id)
    }

    pub fn push_work(&mut self, work: Work) {
        self.works.push(work);
    }

    pub fn remove_work(&mut self, id: EntityId) -> Option<Work> {
        let pos = self.works.iter().position(|w| w.id == id)?;
        Some(self.works.remove(pos))
    }

    // -- episodes -----------------------------------------------------------

    #[must_use]
    pub fn episodes_of(&self, work_id: EntityId) -> &[Episode] {
        self.episodes.get(&work_id).map_or(&[], Vec::as_slice)
    }

    pub fn set_episodes(&mut self, work_id: EntityId, mut episodes: Vec<Episode>) {
        episodes.sort_by_key(|e| e.order_index);
        self.episodes.insert(work_id, episodes);
    }

    /// Scan every bucket for an episode by bare id.
    #[must_use]
    pub fn episode(&self, id: EntityId) -> Option<&Episode> {
        self.episodes.values().flatten().find(|e| e.id == id)
    }

    pub fn episode_mut(&mut self, id: EntityId) -> Option<&mut Episode> {
        self.episodes
            .values_mut()
            .flatten()
            .find(|e| e.id == id)
    }

    pub fn push_episode(&mut self, episode: Episode) {
        self.episodes
            .entry(episode.work_id)
            .or_default()
            .push(episode);
    }

    pub fn remove_episode(&mut self, id: EntityId) -> Option<Episode> {
        for bucket in self.episodes.values_mut() {
            if let Some(pos) = bucket.iter().position(|e| e.id == id) {
                return Some(bucket.remove(pos));
            }
        }
        None
    }

    /// Drop the whole episode bucket of a work (work deletion).
    pub fn drop_episodes_of(&mut self, work_id: EntityId) {
        self.episodes.remove(&work_id);
    }

    /// Sibling order value for an append: one past the current maximum.
    /// Buckets may carry gaps after deletes, so length is not safe here.
    #[must_use]
    pub fn next_episode_order(&self, work_id: EntityId) -> i64 {
        self.episodes_of(work_id)
            .iter()
            .map(|e| e.order_index)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Apply a full sibling ordering to a work's episodes.
    ///
    /// `order` must list every current sibling id exactly once; on success
    /// each episode gets a dense `order_index` of `0..n` in list order and
    /// the bucket is resorted. Returns `false` (and changes nothing) if
    /// `order` is not a permutation of the bucket.
    pub fn set_episode_order(&mut self, work_id: EntityId, order: &[EntityId]) -> bool {
        let Some(bucket) = self.episodes.get_mut(&work_id) else {
            return order.is_empty();
        };
        if !is_permutation(order, bucket.iter().map(|e| e.id)) {
            return false;
        }
        for (index, id) in order.iter().enumerate() {
            if let Some(episode) = bucket.iter_mut().find(|e| e.id == *id) {
                episode.order_index = to_order_index(index);
            }
        }
        bucket.sort_by_key(|e| e.order_index);
        true
    }

    // -- plots --------------------------------------------------------------

    #[must_use]
    pub fn plots_of(&self, episode_id: EntityId) -> &[Plot] {
        self.plots.get(&episode_id).map_or(&[], Vec::as_slice)
    }

    pub fn set_plots(&mut self, episode_id: EntityId, mut plots: Vec<Plot>) {
        plots.sort_by_key(|p| p.order_index);
        self.plots.insert(episode_id, plots);
    }

    #[must_use]
    pub fn plot(&self, id: EntityId) -> Option<&Plot> {
        self.plots.values().flatten().find(|p| p.id == id)
    }

    pub fn plot_mut(&mut self, id: EntityId) -> Option<&mut Plot> {
        self.plots.values_mut().flatten().find(|p| p.id == id)
    }

    pub fn push_plot(&mut self, plot: Plot) {
        self.plots.entry(plot.episode_id).or_default().push(plot);
    }

    pub fn remove_plot(&mut self, id: EntityId) -> Option<Plot> {
        for bucket in self.plots.values_mut() {
            if let Some(pos) = bucket.iter().position(|p| p.id == id) {
                return Some(bucket.remove(pos));
            }
        }
        None
    }

    pub fn drop_plots_of(&mut self, episode_id: EntityId) {
        self.plots.remove(&episode_id);
    }

    #[must_use]
    pub fn next_plot_order(&self, episode_id: EntityId) -> i64 {
        self.plots_of(episode_id)
            .iter()
            .map(|p| p.order_index)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Apply a full sibling ordering to an episode's plots; same contract
    /// as [`EntityStore::set_episode_order`].
    pub fn set_plot_order(&mut self, episode_id: EntityId, order: &[EntityId]) -> bool {
        let Some(bucket) = self.plots.get_mut(&episode_id) else {
            return order.is_empty();
        };
        if !is_permutation(order, bucket.iter().map(|p| p.id)) {
            return false;
        }
        for (index, id) in order.iter().enumerate() {
            if let Some(plot) = bucket.iter_mut().find(|p| p.id == *id) {
                plot.order_index = to_order_index(index);
            }
        }
        bucket.sort_by_key(|p| p.order_index);
        true
    }

    // -- characters ---------------------------------------------------------

    #[must_use]
    pub fn characters_of(&self, work_id: EntityId) -> &[Character] {
        self.characters.get(&work_id).map_or(&[], Vec::as_slice)
    }

    pub fn set_characters(&mut self, work_id: EntityId, mut characters: Vec<Character>) {
        characters.sort_by(|a, b| a.name.cmp(&b.name));
        self.characters.insert(work_id, characters);
    }

    #[must_use]
    pub fn character(&self, id: EntityId) -> Option<&Character> {
        self.characters.values().flatten().find(|c| c.id == id)
    }

    pub fn character_mut(&mut self, id: EntityId) -> Option<&mut Character> {
        self.characters
            .values_mut()
            .flatten()
            .find(|c| c.id == id)
    }

    pub fn push_character(&mut self, character: Character) {
        self.characters
            .entry(character.work_id)
            .or_default()
            .push(character);
    }

    pub fn remove_character(&mut self, id: EntityId) -> Option<Character> {
        for bucket in self.characters.values_mut() {
            if let Some(pos) = bucket.iter().position(|c| c.id == id) {
                return Some(bucket.remove(pos));
            }
        }
        None
    }

    pub fn drop_characters_of(&mut self, work_id: EntityId) {
        self.characters.remove(&work_id);
    }

    // -- relations ----------------------------------------------------------

    #[must_use]
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn set_relations(&mut self, relations: Vec<Relation>) {
        self.relations = relations;
    }

    #[must_use]
    pub fn relation(&self, id: EntityId) -> Option<&Relation> {
        self.relations.iter().find(|r| r.id == id)
    }

    pub fn push_relation(&mut self, relation: Relation) {
        self.relations.push(relation);
    }

    pub fn remove_relation(&mut self, id: EntityId) -> Option<Relation> {
        let pos = self.relations.iter().position(|r| r.id == id)?;
        Some(self.relations.remove(pos))
    }

    /// Ids of relations with `character_id` as either endpoint.
    #[must_use]
    pub fn relations_touching(&self, character_id: EntityId) -> Vec<EntityId> {
        self.relations
            .iter()
            .filter(|r| r.touches(character_id))
            .map(|r| r.id)
            .collect()
    }

    // -- derived ownership --------------------------------------------------

    /// Owning work of a character, by scanning the character buckets.
    #[must_use]
    pub fn work_of_character(&self, character_id: EntityId) -> Option<EntityId> {
        self.character(character_id).map(|c| c.work_id)
    }

    /// Owning work of a relation, derived through its `from` endpoint.
    #[must_use]
    pub fn work_of_relation(&self, relation: &Relation) -> Option<EntityId> {
        self.work_of_character(relation.from_character_id)
    }
}

/// `order` holds each id of `current` exactly once.
fn is_permutation<I: Iterator<Item = EntityId>>(order: &[EntityId], current: I) -> bool {
    let wanted: std::collections::BTreeSet<EntityId> = order.iter().copied().collect();
    if wanted.len() != order.len() {
        return false;
    }
    let existing: std::collections::BTreeSet<EntityId> = current.collect();
    wanted == existing
}

#[allow(clippy::cast_possible_wrap)]
fn to_order_index(index: usize) -> i64 {
    index as i64
}
