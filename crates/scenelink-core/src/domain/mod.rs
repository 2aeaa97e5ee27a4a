//! Domain module containing the entity identity model.

pub mod identity;

pub use identity::{EntityKey, IdentityError, PathKey, SourceKey};
