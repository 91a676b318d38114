//! Shared metadata registry.

use super::model::EntityMetadata;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::types::EntityType;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
struct Tables {
    by_type: HashMap<EntityType, Arc<EntityMetadata>>,
    by_name: HashMap<String, Arc<EntityMetadata>>,
}

/// Process-wide store of entity descriptors.
///
/// Populated once by registration and read by every session. Registration
/// is first-writer-wins: registering a type again returns the descriptor
/// already stored.
#[derive(Default)]
pub struct MetadataRegistry {
    tables: RwLock<Tables>,
}

impl MetadataRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T`, building its descriptor if it is not known yet.
    ///
    /// # Errors
    ///
    /// Returns the error of [`Entity::metadata`], or
    /// [`CoreError::InvalidMetadata`] if the descriptor describes another
    /// type or its entity name is taken by another type.
    pub fn register<T: Entity>(&self) -> CoreResult<Arc<EntityMetadata>> {
        let entity_type = EntityType::of::<T>();
        if let Some(existing) = self.tables.read().by_type.get(&entity_type) {
            return Ok(Arc::clone(existing));
        }

        let metadata = T::metadata()?;
        if metadata.entity_type() != entity_type {
            return Err(CoreError::invalid_metadata(format!(
                "metadata of {} describes {}",
                entity_type.name(),
                metadata.entity_type().name()
            )));
        }

        let mut tables = self.tables.write();
        if let Some(existing) = tables.by_type.get(&entity_type) {
            return Ok(Arc::clone(existing));
        }
        if tables.by_name.contains_key(metadata.entity_name()) {
            return Err(CoreError::invalid_metadata(format!(
                "entity name {} already registered",
                metadata.entity_name()
            )));
        }

        let metadata = Arc::new(metadata);
        tables.by_type.insert(entity_type, Arc::clone(&metadata));
        tables
            .by_name
            .insert(metadata.entity_name().to_string(), Arc::clone(&metadata));
        info!(
            entity = metadata.entity_name(),
            table = %metadata.qualified_table_name(),
            attributes = metadata.attributes().len(),
            "entity registered"
        );
        Ok(metadata)
    }

    /// Returns the descriptor of `entity_type`.
    pub fn get(&self, entity_type: EntityType) -> CoreResult<Arc<EntityMetadata>> {
        self.tables
            .read()
            .by_type
            .get(&entity_type)
            .cloned()
            .ok_or_else(|| CoreError::metadata_not_found(entity_type.name()))
    }

    /// Returns the descriptor of `T`.
    pub fn get_for<T: 'static>(&self) -> CoreResult<Arc<EntityMetadata>> {
        self.get(EntityType::of::<T>())
    }

    /// Returns the descriptor registered under a query-language name.
    pub fn get_by_name(&self, entity_name: &str) -> CoreResult<Arc<EntityMetadata>> {
        self.tables
            .read()
            .by_name
            .get(entity_name)
            .cloned()
            .ok_or_else(|| CoreError::metadata_not_found(entity_name))
    }

    /// Returns true if `entity_type` is registered.
    #[must_use]
    pub fn contains(&self, entity_type: EntityType) -> bool {
        self.tables.read().by_type.contains_key(&entity_type)
    }

    /// Number of registered entity types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().by_type.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        let mut names: Vec<_> = tables.by_name.keys().cloned().collect();
        names.sort();
        f.debug_struct("MetadataRegistry")
            .field("entities", &names)
            .finish()
    }
}
