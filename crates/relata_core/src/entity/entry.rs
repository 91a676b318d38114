//! Per-entity tracking records.

use super::key::EntityKey;
use super::reference::EntityObject;
use crate::error::{CoreError, CoreResult};
use crate::metadata::{AttributeMetadata, EntityMetadata};
use crate::types::EntityHandle;
use parking_lot::Mutex;
use relata_codec::Value;
use std::fmt;
use std::sync::Arc;

/// Lifecycle status of a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityStatus {
    /// Tracked and dirty-checked on flush.
    Managed,
    /// Scheduled for deletion on the next flush.
    Removed,
    /// No longer tracked.
    Detached,
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityStatus::Managed => write!(f, "MANAGED"),
            EntityStatus::Removed => write!(f, "REMOVED"),
            EntityStatus::Detached => write!(f, "DETACHED"),
        }
    }
}

struct EntryState {
    status: EntityStatus,
    snapshot: Box<[Value]>,
    key: Option<EntityKey>,
}

/// Tracking record of one entity instance.
///
/// Holds the entity, its descriptor, its status, and the snapshot of
/// attribute values last known to match the database. The snapshot has one
/// slot per attribute and its length never changes. A slot is refreshed only
/// when a statement writes its column, and only updatable attributes are
/// dirty-checked.
///
/// The key is absent only for entities with a generated identifier that
/// have not been inserted yet.
pub struct EntityEntry {
    entity: Arc<dyn EntityObject>,
    metadata: Arc<EntityMetadata>,
    state: Mutex<EntryState>,
}

impl EntityEntry {
    pub(crate) fn new(
        entity: Arc<dyn EntityObject>,
        metadata: Arc<EntityMetadata>,
        key: Option<EntityKey>,
        snapshot: Box<[Value]>,
    ) -> Self {
        Self {
            entity,
            metadata,
            state: Mutex::new(EntryState {
                status: EntityStatus::Managed,
                snapshot,
                key,
            }),
        }
    }

    /// Handle of the tracked instance.
    #[must_use]
    pub fn handle(&self) -> EntityHandle {
        self.entity.handle()
    }

    /// The tracked instance.
    #[must_use]
    pub fn entity(&self) -> &Arc<dyn EntityObject> {
        &self.entity
    }

    /// Descriptor of the entity's type.
    #[must_use]
    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> EntityStatus {
        self.state.lock().status
    }

    /// Copy of the snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Box<[Value]> {
        self.state.lock().snapshot.clone()
    }

    /// The entity's key, once it has an identifier.
    #[must_use]
    pub fn key(&self) -> Option<EntityKey> {
        self.state.lock().key.clone()
    }

    pub(crate) fn set_key(&self, key: EntityKey) {
        self.state.lock().key = Some(key);
    }

    /// Copies into the snapshot the slots of every attribute `written`
    /// selects.
    pub(crate) fn merge_snapshot(
        &self,
        values: &[Value],
        written: impl Fn(&AttributeMetadata) -> bool,
    ) {
        let mut state = self.state.lock();
        debug_assert_eq!(state.snapshot.len(), values.len());
        for ((attribute, slot), value) in self
            .metadata
            .attributes()
            .iter()
            .zip(state.snapshot.iter_mut())
            .zip(values)
        {
            if written(attribute) {
                *slot = value.clone();
            }
        }
    }

    /// Identifier the row is addressed by: the tracked key, or the entity's
    /// own identifier while it has none.
    pub(crate) fn tracked_id(&self) -> CoreResult<Value> {
        if let Some(key) = self.key() {
            return Ok(key.id().clone());
        }
        let entity = self.entity.read();
        self.metadata.id_value(&*entity)
    }

    /// Fails if the entity's identifier no longer matches its key.
    pub(crate) fn check_identifier(&self) -> CoreResult<()> {
        let Some(key) = self.key() else {
            return Ok(());
        };
        let current = {
            let entity = self.entity.read();
            self.metadata.id_value(&*entity)?
        };
        if current == *key.id() {
            Ok(())
        } else {
            Err(CoreError::invalid_state(format!(
                "identifier of managed entity {key} changed to {current}"
            )))
        }
    }

    /// MANAGED -> REMOVED.
    pub(crate) fn mark_removed(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        match state.status {
            EntityStatus::Managed => {
                state.status = EntityStatus::Removed;
                Ok(())
            }
            other => Err(CoreError::invalid_state(format!(
                "cannot remove {} entity {}",
                other,
                self.describe_key(state.key.as_ref())
            ))),
        }
    }

    pub(crate) fn detach(&self) {
        self.state.lock().status = EntityStatus::Detached;
    }

    /// Reads the entity's attribute values now.
    pub fn current_values(&self) -> CoreResult<Box<[Value]>> {
        let entity = self.entity.read();
        self.metadata.snapshot(&*entity)
    }

    /// Returns the current values if an updatable attribute differs from
    /// the snapshot.
    pub fn dirty_values(&self) -> CoreResult<Option<Box<[Value]>>> {
        let current = self.current_values()?;
        let state = self.state.lock();
        let dirty = self
            .metadata
            .attributes()
            .iter()
            .zip(state.snapshot.iter().zip(current.iter()))
            .any(|(attribute, (old, new))| attribute.is_updatable() && old != new);
        Ok(dirty.then_some(current))
    }

    fn describe_key(&self, key: Option<&EntityKey>) -> String {
        match key {
            Some(key) => key.to_string(),
            None => format!("{}{}", self.entity.entity_type(), self.entity.handle()),
        }
    }

    pub(crate) fn describe(&self) -> String {
        let state = self.state.lock();
        self.describe_key(state.key.as_ref())
    }
}

impl fmt::Debug for EntityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EntityEntry")
            .field("handle", &self.entity.handle())
            .field("key", &state.key)
            .field("status", &state.status)
            .field("snapshot", &state.snapshot)
            .finish()
    }
}
