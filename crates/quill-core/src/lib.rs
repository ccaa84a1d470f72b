//! Offline-first mutation queue and save reconciler for the quill writing
//! studio.
//!
//! A session edits five interrelated entity kinds (works, episodes, plots,
//! characters, relations) entirely in memory; every mutation is recorded in
//! a per-kind pending-change ledger, and an explicit save collapses the
//! ledgers into a minimal, dependency-ordered batch of remote calls. A
//! failed save preserves every queue for retry; a successful one clears
//! them atomically.
//!
//! Entry point: build a [`studio::Studio`] around any [`remote::RemoteApi`]
//! implementation and hand it to your UI layer.
//!
//! # Conventions
//!
//! - **Errors**: explicit `Result` with per-module error enums; every
//!   surfaced failure maps to a stable [`error::ErrorCode`].
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).

pub mod error;
pub mod model;
pub mod pending;
pub mod remote;
pub mod store;
pub mod studio;

pub use error::ErrorCode;
pub use model::{
    Character, EMPTY_DOC, EntityId, EntityKind, Episode, Plot, Relation, Work, WorkKind,
};
pub use pending::{ChangeLedger, ChangeState, PendingChanges};
pub use remote::{OpAction, RemoteApi, RemoteError, RemoteOp, UserProfile};
pub use store::EntityStore;
pub use studio::{MutateError, SaveError, SaveOutcome, SelectError, Selection, Studio};
