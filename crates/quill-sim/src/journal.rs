//! The call journal: an ordered record of every backend call.
//!
//! Tests assert against this to pin down exactly which remote operations a
//! reconciliation issued, and in which order. Calls are recorded before
//! failure injection runs, so the journal shows *attempts*, not successes.

use quill_core::model::EntityId;

/// One backend call, as seen by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimOp {
    CurrentUser,
    ListWorks,
    ListEpisodes(EntityId),
    ListPlots(EntityId),
    ListCharacters(EntityId),
    ListRelations(EntityId),
    CreateWork(EntityId),
    UpdateWork(EntityId),
    DeleteWork(EntityId),
    CreateEpisode(EntityId),
    UpdateEpisode(EntityId),
    DeleteEpisode(EntityId),
    CreatePlot(EntityId),
    UpdatePlot(EntityId),
    DeletePlot(EntityId),
    GetContent(EntityId),
    PutContent(EntityId),
    CreateCharacter(EntityId),
    UpdateCharacter(EntityId),
    DeleteCharacter(EntityId),
    CreateRelation(EntityId),
    DeleteRelation(EntityId),
}

impl SimOp {
    /// Whether this call changes server state (reads and probes don't).
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        !matches!(
            self,
            Self::CurrentUser
                | Self::ListWorks
                | Self::ListEpisodes(_)
                | Self::ListPlots(_)
                | Self::ListCharacters(_)
                | Self::ListRelations(_)
                | Self::GetContent(_)
        )
    }

    /// The entity id this call addresses, if it addresses one.
    #[must_use]
    pub const fn id(self) -> Option<EntityId> {
        match self {
            Self::CurrentUser | Self::ListWorks => None,
            Self::ListEpisodes(id)
            | Self::ListPlots(id)
            | Self::ListCharacters(id)
            | Self::ListRelations(id)
            | Self::CreateWork(id)
            | Self::UpdateWork(id)
            | Self::DeleteWork(id)
            | Self::CreateEpisode(id)
            | Self::UpdateEpisode(id)
            | Self::DeleteEpisode(id)
            | Self::CreatePlot(id)
            | Self::UpdatePlot(id)
            | Self::DeletePlot(id)
            | Self::GetContent(id)
            | Self::PutContent(id)
            | Self::CreateCharacter(id)
            | Self::UpdateCharacter(id)
            | Self::DeleteCharacter(id)
            | Self::CreateRelation(id)
            | Self::DeleteRelation(id) => Some(id),
        }
    }
}
