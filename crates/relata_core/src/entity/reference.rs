//! Shared entity handles.

use super::Entity;
use crate::types::{EntityHandle, EntityType};
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

struct EntityCell<T> {
    handle: EntityHandle,
    value: RwLock<T>,
}

/// A shared, mutable entity instance.
///
/// Clones point at the same instance and share its [`EntityHandle`].
/// Equality is reference identity: two refs are equal iff they are clones
/// of one another, whatever the entity's attributes.
pub struct EntityRef<T> {
    cell: Arc<EntityCell<T>>,
}

impl<T: Entity> EntityRef<T> {
    /// Wraps `value` in a new instance with a fresh handle.
    pub fn new(value: T) -> Self {
        Self {
            cell: Arc::new(EntityCell {
                handle: EntityHandle::next(),
                value: RwLock::new(value),
            }),
        }
    }

    /// The instance's handle.
    #[must_use]
    pub fn handle(&self) -> EntityHandle {
        self.cell.handle
    }

    /// Locks the entity for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.cell.value.read()
    }

    /// Locks the entity for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.cell.value.write()
    }

    /// Returns true if both refs point at the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn as_object(&self) -> Arc<dyn EntityObject> {
        self.cell.clone()
    }

    pub(crate) fn from_object(object: Arc<dyn EntityObject>) -> Option<Self> {
        object
            .into_any()
            .downcast::<EntityCell<T>>()
            .ok()
            .map(|cell| Self { cell })
    }
}

impl<T> Clone for EntityRef<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> PartialEq for EntityRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cell.handle == other.cell.handle
    }
}

impl<T> Eq for EntityRef<T> {}

impl<T: Entity> From<T> for EntityRef<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for EntityRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("handle", &self.cell.handle)
            .field("value", &*self.cell.value.read())
            .finish()
    }
}

/// A tracked entity with its concrete type erased.
///
/// The persistence context holds entities of many types side by side and
/// reaches their fields only through metadata accessors.
pub trait EntityObject: Send + Sync {
    /// The instance's handle.
    fn handle(&self) -> EntityHandle;

    /// The concrete entity type.
    fn entity_type(&self) -> EntityType;

    /// Locks the entity for reading.
    fn read(&self) -> MappedRwLockReadGuard<'_, dyn Any>;

    /// Locks the entity for writing.
    fn write(&self) -> MappedRwLockWriteGuard<'_, dyn Any>;

    /// Upcasts for downcasting back to the concrete cell.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Entity> EntityObject for EntityCell<T> {
    fn handle(&self) -> EntityHandle {
        self.handle
    }

    fn entity_type(&self) -> EntityType {
        EntityType::of::<T>()
    }

    fn read(&self) -> MappedRwLockReadGuard<'_, dyn Any> {
        RwLockReadGuard::map(self.value.read(), |value| value as &dyn Any)
    }

    fn write(&self) -> MappedRwLockWriteGuard<'_, dyn Any> {
        RwLockWriteGuard::map(self.value.write(), |value| value as &mut dyn Any)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreResult;
    use crate::metadata::EntityMetadata;
    use relata_codec::AttributeType;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Note {
        id: i64,
    }

    impl Entity for Note {
        fn metadata() -> CoreResult<EntityMetadata> {
            EntityMetadata::builder::<Note>("Note")
                .id("id", AttributeType::Integer, |n| n.id.into(), |n, v| {
                    n.id = v.into_typed()?;
                    Ok(())
                })
                .build()
        }
    }

    #[derive(Default)]
    struct Other;

    impl Entity for Other {
        fn metadata() -> CoreResult<EntityMetadata> {
            EntityMetadata::builder::<Other>("Other")
                .id("id", AttributeType::Integer, |_| 0i64.into(), |_, _| Ok(()))
                .build()
        }
    }

    #[test]
    fn clones_share_identity() {
        let a = EntityRef::new(Note { id: 1 });
        let b = a.clone();
        let c = EntityRef::new(Note { id: 1 });

        assert_eq!(a, b);
        assert!(a.ptr_eq(&b));
        assert_ne!(a, c);
        assert_eq!(*a.read(), *c.read());
    }

    #[test]
    fn writes_visible_through_clones() {
        let a = EntityRef::new(Note { id: 1 });
        let b = a.clone();
        b.write().id = 9;
        assert_eq!(a.read().id, 9);
    }

    #[test]
    fn erased_round_trip() {
        let note = EntityRef::new(Note { id: 3 });
        let object = note.as_object();
        assert_eq!(object.handle(), note.handle());
        assert_eq!(object.entity_type(), EntityType::of::<Note>());
        assert_eq!(object.read().downcast_ref::<Note>().map(|n| n.id), Some(3));

        let back = EntityRef::<Note>::from_object(Arc::clone(&object)).unwrap();
        assert!(back.ptr_eq(&note));
        assert!(EntityRef::<Other>::from_object(object).is_none());
    }
}
