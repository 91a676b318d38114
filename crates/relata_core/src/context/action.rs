//! Write actions executed at flush time.

use crate::entity::EntityEntry;
use crate::error::CoreResult;
use crate::persister::{EntityDeleter, EntityPersister, EntityUpdater};
use crate::types::EntityHandle;
use relata_storage::Connection;
use std::fmt;
use std::sync::Arc;

/// Category of a write action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// INSERT of a newly persisted entity.
    Insert,
    /// UPDATE of a dirty entity.
    Update,
    /// DELETE of a removed entity.
    Delete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Insert => write!(f, "insert"),
            ActionKind::Update => write!(f, "update"),
            ActionKind::Delete => write!(f, "delete"),
        }
    }
}

/// A staged write against one entity.
///
/// Executing an action runs its SQL; nothing prevents running it twice.
pub trait EntityAction: Send {
    /// The action's category.
    fn kind(&self) -> ActionKind;

    /// Handle of the entity written.
    fn handle(&self) -> EntityHandle;

    /// Runs the write on `conn`.
    fn execute(&self, conn: &mut dyn Connection) -> CoreResult<()>;
}

/// Inserts a newly persisted entity.
pub struct InsertAction {
    entry: Arc<EntityEntry>,
    persister: EntityPersister,
}

impl InsertAction {
    /// Creates an insert action.
    pub fn new(entry: Arc<EntityEntry>, persister: EntityPersister) -> Self {
        Self { entry, persister }
    }
}

impl EntityAction for InsertAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Insert
    }

    fn handle(&self) -> EntityHandle {
        self.entry.handle()
    }

    fn execute(&self, conn: &mut dyn Connection) -> CoreResult<()> {
        self.persister
            .insert(conn, self.entry.entity().as_ref(), self.entry.metadata())?;
        self.entry
            .merge_snapshot(&self.entry.current_values()?, |a| a.is_insertable());
        Ok(())
    }
}

/// Writes a dirty entity to the row it is tracked under and refreshes the
/// snapshot slots of the updatable attributes.
pub struct UpdateAction {
    entry: Arc<EntityEntry>,
    updater: EntityUpdater,
}

impl UpdateAction {
    /// Creates an update action for the entry found dirty.
    pub fn new(entry: Arc<EntityEntry>, updater: EntityUpdater) -> Self {
        Self { entry, updater }
    }
}

impl EntityAction for UpdateAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Update
    }

    fn handle(&self) -> EntityHandle {
        self.entry.handle()
    }

    fn execute(&self, conn: &mut dyn Connection) -> CoreResult<()> {
        let written = self.updater.update(
            conn,
            self.entry.entity().as_ref(),
            self.entry.metadata(),
            self.entry.tracked_id()?,
        )?;
        self.entry.merge_snapshot(&written, |a| a.is_updatable());
        Ok(())
    }
}

/// Deletes a removed entity.
pub struct DeleteAction {
    entry: Arc<EntityEntry>,
    deleter: EntityDeleter,
}

impl DeleteAction {
    /// Creates a delete action.
    pub fn new(entry: Arc<EntityEntry>, deleter: EntityDeleter) -> Self {
        Self { entry, deleter }
    }
}

impl EntityAction for DeleteAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Delete
    }

    fn handle(&self) -> EntityHandle {
        self.entry.handle()
    }

    fn execute(&self, conn: &mut dyn Connection) -> CoreResult<()> {
        self.deleter
            .delete(conn, self.entry.metadata(), self.entry.tracked_id()?)?;
        Ok(())
    }
}
