//! Entities and their tracking records.

mod entry;
mod key;
mod reference;

pub use entry::{EntityEntry, EntityStatus};
pub use key::EntityKey;
pub use reference::{EntityObject, EntityRef};

use crate::error::CoreResult;
use crate::metadata::EntityMetadata;

/// A type that can be persisted.
///
/// `Default` supplies the blank instance a loader fills from a row.
pub trait Entity: Default + Send + Sync + 'static {
    /// Builds the descriptor table of this type.
    ///
    /// Called once per registry; the result is cached.
    fn metadata() -> CoreResult<EntityMetadata>;
}
