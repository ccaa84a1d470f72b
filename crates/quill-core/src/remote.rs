//! The remote persistence seam.
//!
//! The engine consumes — never implements — a per-kind CRUD API plus a raw
//! get/put endpoint for plot bodies and a "current user" probe. Ids are
//! client-chosen, so a create carries its id and the server adopts it.
//! Transport is the caller's business; `quill-sim` provides the in-memory
//! implementation used throughout the test suite.

use async_trait::async_trait;
use std::fmt;

use crate::error::ErrorCode;
use crate::model::{Character, EntityId, EntityKind, Episode, Plot, Relation, Work};

/// Error returned by a remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The server answered and said no.
    #[error("remote rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// The server could not be reached at all.
    #[error("remote unreachable: {0}")]
    Unreachable(String),
}

impl RemoteError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Rejected { .. } => ErrorCode::RemoteRejected,
            Self::Unreachable(_) => ErrorCode::RemoteUnreachable,
        }
    }
}

/// The authenticated account, as reported by the current-user probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Opaque subject identifier.
    pub sub: String,
    pub email: String,
}

/// What a failed reconciliation step was trying to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpAction {
    Create,
    Update,
    Delete,
    PutContent,
}

impl OpAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::PutContent => "put content for",
        }
    }
}

/// Descriptor of a single remote mutation, attached to save failures so the
/// UI can say which entity the save died on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteOp {
    pub action: OpAction,
    pub kind: EntityKind,
    pub id: EntityId,
}

impl RemoteOp {
    #[must_use]
    pub const fn new(action: OpAction, kind: EntityKind, id: EntityId) -> Self {
        Self { action, kind, id }
    }
}

impl fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.action.as_str(), self.kind, self.id)
    }
}

/// Remote CRUD API consumed by the engine.
///
/// List calls return children of the given parent. Create calls send the
/// full current record (create-time sync always carries latest state, which
/// is why a created-then-edited entity needs no separate update). Plot
/// metadata and plot content travel separately: `create_plot`/`update_plot`
/// never carry the body, and the content endpoints exchange it as an opaque
/// text blob.
#[async_trait]
pub trait RemoteApi {
    async fn current_user(&self) -> Result<Option<UserProfile>, RemoteError>;

    async fn list_works(&self) -> Result<Vec<Work>, RemoteError>;
    async fn create_work(&self, work: &Work) -> Result<(), RemoteError>;
    async fn update_work(&self, work: &Work) -> Result<(), RemoteError>;
    async fn delete_work(&self, id: EntityId) -> Result<(), RemoteError>;

    async fn list_episodes(&self, work_id: EntityId) -> Result<Vec<Episode>, RemoteError>;
    async fn create_episode(&self, episode: &Episode) -> Result<(), RemoteError>;
    async fn update_episode(&self, episode: &Episode) -> Result<(), RemoteError>;
    async fn delete_episode(&self, id: EntityId) -> Result<(), RemoteError>;

    async fn list_plots(&self, episode_id: EntityId) -> Result<Vec<Plot>, RemoteError>;
    async fn create_plot(&self, plot: &Plot) -> Result<(), RemoteError>;
    async fn update_plot(&self, plot: &Plot) -> Result<(), RemoteError>;
    async fn delete_plot(&self, id: EntityId) -> Result<(), RemoteError>;
    async fn fetch_plot_content(&self, id: EntityId) -> Result<String, RemoteError>;
    async fn store_plot_content(&self, id: EntityId, content: &str) -> Result<(), RemoteError>;

    async fn list_characters(&self, work_id: EntityId) -> Result<Vec<Character>, RemoteError>;
    async fn create_character(&self, character: &Character) -> Result<(), RemoteError>;
    async fn update_character(&self, character: &Character) -> Result<(), RemoteError>;
    async fn delete_character(&self, id: EntityId) -> Result<(), RemoteError>;

    async fn list_relations(&self, work_id: EntityId) -> Result<Vec<Relation>, RemoteError>;
    /// `work_id` scopes the relation server-side; the record itself only
    /// knows its endpoints.
    async fn create_relation(&self, work_id: EntityId, relation: &Relation)
    -> Result<(), RemoteError>;
    async fn delete_relation(&self, id: EntityId) -> Result<(), RemoteError>;
}
