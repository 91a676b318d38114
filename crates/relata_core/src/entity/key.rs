//! Entity key type.

use crate::error::{CoreError, CoreResult};
use crate::types::EntityType;
use relata_codec::Value;
use std::fmt;

/// Identity of a persistent row: entity type plus identifier value.
///
/// Two keys are equal iff both the type and the identifier are equal. The
/// identifier is never null.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityKey {
    entity_type: EntityType,
    id: Value,
}

impl EntityKey {
    /// Creates a key.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidKey`] if `id` is null.
    pub fn new(entity_type: EntityType, id: Value) -> CoreResult<Self> {
        if id.is_null() {
            return Err(CoreError::invalid_key(format!(
                "identifier of {entity_type} cannot be null"
            )));
        }
        Ok(Self { entity_type, id })
    }

    /// Creates a key for entity type `T`.
    pub fn of<T: 'static>(id: impl Into<Value>) -> CoreResult<Self> {
        Self::new(EntityType::of::<T>(), id.into())
    }

    /// The entity type.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// The identifier value.
    #[must_use]
    pub fn id(&self) -> &Value {
        &self.id
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.entity_type, self.id)
    }
}
