//! Data model for the five entity kinds.
//!
//! Every record here doubles as the wire record for the remote CRUD API
//! (plain serde structs, client-chosen ids). Ownership is strictly
//! tree-shaped: a work owns its episodes and characters, an episode owns
//! its plots, and relations hang off their `from` character.

pub mod character;
pub mod episode;
pub mod id;
pub mod kind;
pub mod plot;
pub mod work;

pub use character::{Character, DEFAULT_CHARACTER_COLOR, Relation};
pub use episode::Episode;
pub use id::{EntityId, IdMinter};
pub use kind::EntityKind;
pub use plot::{EMPTY_DOC, Plot, is_empty_document};
pub use work::{ParseWorkKindError, Work, WorkKind};
