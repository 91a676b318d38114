//! The persistence context: identity map, dirty checking and write staging.

mod action;
mod queue;

pub use action::{ActionKind, DeleteAction, EntityAction, InsertAction, UpdateAction};
pub use queue::ActionQueue;

use crate::entity::{Entity, EntityEntry, EntityKey, EntityObject, EntityRef, EntityStatus};
use crate::error::{CoreError, CoreResult};
use crate::executor::StatementExecutor;
use crate::metadata::{IdGeneration, MetadataRegistry};
use crate::persister::{EntityDeleter, EntityPersister, EntityUpdater};
use crate::types::{EntityHandle, FlushStats};
use relata_codec::Value;
use relata_storage::Connection;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Tracks the entities of one unit of work.
///
/// Two maps are kept: the identity map, keyed by [`EntityKey`], holds at
/// most one instance per row; the entry map, keyed by [`EntityHandle`],
/// holds the [`EntityEntry`] of every tracked instance.
///
/// A context belongs to a single session and is not meant to be shared.
pub struct PersistenceContext {
    registry: Arc<MetadataRegistry>,
    persister: EntityPersister,
    updater: EntityUpdater,
    deleter: EntityDeleter,
    identity_map: HashMap<EntityKey, Arc<dyn EntityObject>>,
    entries: HashMap<EntityHandle, Arc<EntityEntry>>,
    queue: ActionQueue,
}

impl PersistenceContext {
    /// Creates an empty context.
    pub fn new(registry: Arc<MetadataRegistry>, executor: Arc<dyn StatementExecutor>) -> Self {
        Self {
            registry,
            persister: EntityPersister::new(Arc::clone(&executor)),
            updater: EntityUpdater::new(Arc::clone(&executor)),
            deleter: EntityDeleter::new(executor),
            identity_map: HashMap::new(),
            entries: HashMap::new(),
            queue: ActionQueue::new(),
        }
    }

    /// Starts tracking a new entity and schedules its INSERT.
    ///
    /// Adding an instance that is already tracked does nothing.
    ///
    /// # Errors
    ///
    /// - [`CoreError::DuplicateIdentity`] if another instance holds the key
    /// - [`CoreError::InvalidKey`] if the identifier is null and not generated
    /// - [`CoreError::MetadataNotFound`] if `T` is not registered
    pub fn add_entity<T: Entity>(&mut self, entity: &EntityRef<T>) -> CoreResult<()> {
        self.track(entity.as_object(), true).map(|_| ())
    }

    /// Starts tracking an entity read from the database. No INSERT is
    /// scheduled.
    pub fn add_loaded_entity<T: Entity>(&mut self, entity: &EntityRef<T>) -> CoreResult<()> {
        self.track(entity.as_object(), false).map(|_| ())
    }

    fn track(
        &mut self,
        object: Arc<dyn EntityObject>,
        schedule_insert: bool,
    ) -> CoreResult<Arc<EntityEntry>> {
        let handle = object.handle();
        if let Some(entry) = self.entries.get(&handle) {
            return Ok(Arc::clone(entry));
        }

        let metadata = self.registry.get(object.entity_type())?;
        let (id, snapshot) = {
            let guard = object.read();
            (metadata.id_value(&*guard)?, metadata.snapshot(&*guard)?)
        };

        let key = if id.is_null() {
            if schedule_insert && metadata.identifier().generation() == IdGeneration::Generated {
                None
            } else {
                return Err(CoreError::invalid_key(format!(
                    "{} has no identifier",
                    metadata.entity_name()
                )));
            }
        } else {
            let key = EntityKey::new(object.entity_type(), id)?;
            if self.identity_map.contains_key(&key) {
                return Err(CoreError::duplicate_identity(&key));
            }
            Some(key)
        };

        if let Some(key) = &key {
            self.identity_map.insert(key.clone(), Arc::clone(&object));
        }
        let entry = Arc::new(EntityEntry::new(object, metadata, key, snapshot));
        self.entries.insert(handle, Arc::clone(&entry));

        if schedule_insert {
            self.queue.add_insertion(Box::new(InsertAction::new(
                Arc::clone(&entry),
                self.persister.clone(),
            )));
        }
        Ok(entry)
    }

    /// Looks up the tracked instance of `T` with identifier `id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidKey`] if `id` is null.
    pub fn get_entity<T: Entity>(&self, id: impl Into<Value>) -> CoreResult<Option<EntityRef<T>>> {
        let key = EntityKey::of::<T>(id)?;
        Ok(self.get_object(&key).and_then(EntityRef::<T>::from_object))
    }

    pub(crate) fn get_object(&self, key: &EntityKey) -> Option<Arc<dyn EntityObject>> {
        self.identity_map.get(key).cloned()
    }

    /// Returns true if this instance is tracked.
    #[must_use]
    pub fn contains<T: Entity>(&self, entity: &EntityRef<T>) -> bool {
        self.entries.contains_key(&entity.handle())
    }

    /// Marks a managed entity as removed and schedules its DELETE.
    ///
    /// The entity stays in the identity map until the next flush.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotManaged`] if the instance is not tracked
    /// - [`CoreError::InvalidState`] if it is already removed or detached
    pub fn remove_entity<T: Entity>(&mut self, entity: &EntityRef<T>) -> CoreResult<()> {
        let entry = self
            .entries
            .get(&entity.handle())
            .ok_or_else(|| CoreError::not_managed(format!("{}", entity.handle())))?;
        entry.mark_removed()?;
        self.queue.add_deletion(Box::new(DeleteAction::new(
            Arc::clone(entry),
            self.deleter.clone(),
        )));
        Ok(())
    }

    /// Writes every pending change to `conn`.
    ///
    /// Managed entities whose updatable attributes differ from their snapshot
    /// get an UPDATE; then insertions, updates and deletions run in that
    /// order. On success the queue is cleared, new generated keys enter the
    /// identity map and removed entities are evicted. On failure the queue
    /// and the context are left as they were when execution stopped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidState`] before anything is written if a
    /// managed entity's identifier no longer matches its key.
    pub fn flush(&mut self, conn: &mut dyn Connection) -> CoreResult<FlushStats> {
        let mut dirty: Vec<&Arc<EntityEntry>> = Vec::new();
        for entry in self.entries.values() {
            if entry.status() != EntityStatus::Managed {
                continue;
            }
            entry.check_identifier()?;
            if self.queue.has_insertion(entry.handle()) {
                continue;
            }
            if entry.dirty_values()?.is_some() {
                dirty.push(entry);
            }
        }
        dirty.sort_by_key(|entry| entry.handle());
        for entry in dirty {
            self.queue.add_update(Box::new(UpdateAction::new(
                Arc::clone(entry),
                self.updater.clone(),
            )));
        }

        let stats = self.queue.execute_actions(conn)?;
        self.queue.clear();

        self.register_generated_keys()?;
        self.evict_removed();

        debug!(
            inserted = stats.inserted,
            updated = stats.updated,
            deleted = stats.deleted,
            tracked = self.entries.len(),
            "flush complete"
        );
        Ok(stats)
    }

    fn register_generated_keys(&mut self) -> CoreResult<()> {
        let pending: Vec<Arc<EntityEntry>> = self
            .entries
            .values()
            .filter(|e| e.key().is_none())
            .cloned()
            .collect();

        for entry in pending {
            let id = {
                let guard = entry.entity().read();
                entry.metadata().id_value(&*guard)?
            };
            let key = EntityKey::new(entry.entity().entity_type(), id)?;
            match self.identity_map.get(&key) {
                Some(existing) if existing.handle() != entry.handle() => {
                    return Err(CoreError::duplicate_identity(&key));
                }
                _ => {}
            }
            self.identity_map
                .insert(key.clone(), Arc::clone(entry.entity()));
            entry.set_key(key);
        }
        Ok(())
    }

    fn evict_removed(&mut self) {
        let removed: Vec<EntityHandle> = self
            .entries
            .values()
            .filter(|e| e.status() == EntityStatus::Removed)
            .map(|e| e.handle())
            .collect();

        for handle in removed {
            if let Some(entry) = self.entries.remove(&handle) {
                if let Some(key) = entry.key() {
                    let owned = self
                        .identity_map
                        .get(&key)
                        .is_some_and(|o| o.handle() == handle);
                    if owned {
                        self.identity_map.remove(&key);
                    }
                }
                entry.detach();
            }
        }
    }

    /// Stops tracking everything and drops pending actions.
    pub fn clear(&mut self) {
        for entry in self.entries.values() {
            entry.detach();
        }
        let dropped = self.queue.len();
        self.entries.clear();
        self.identity_map.clear();
        self.queue.clear();
        debug!(dropped_actions = dropped, "persistence context cleared");
    }

    /// Status of a tracked instance.
    #[must_use]
    pub fn status<T: Entity>(&self, entity: &EntityRef<T>) -> Option<EntityStatus> {
        self.entries.get(&entity.handle()).map(|e| e.status())
    }

    /// Snapshot of a tracked instance.
    #[must_use]
    pub fn snapshot<T: Entity>(&self, entity: &EntityRef<T>) -> Option<Box<[Value]>> {
        self.entries.get(&entity.handle()).map(|e| e.snapshot())
    }

    /// Tracking record of an instance.
    #[must_use]
    pub fn entry<T: Entity>(&self, entity: &EntityRef<T>) -> Option<Arc<EntityEntry>> {
        self.entries.get(&entity.handle()).cloned()
    }

    /// Number of tracked instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of actions waiting for the next flush.
    #[must_use]
    pub fn pending_actions(&self) -> usize {
        self.queue.len()
    }

    /// The pending action queue.
    #[must_use]
    pub fn action_queue(&self) -> &ActionQueue {
        &self.queue
    }

    /// The metadata registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<MetadataRegistry> {
        &self.registry
    }
}

impl std::fmt::Debug for PersistenceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceContext")
            .field("tracked", &self.entries.len())
            .field("identities", &self.identity_map.len())
            .field("queue", &self.queue)
            .finish()
    }
}
