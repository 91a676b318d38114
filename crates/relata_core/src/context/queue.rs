//! Ordered queue of pending writes.

use super::action::{ActionKind, EntityAction};
use crate::error::CoreResult;
use crate::types::{EntityHandle, FlushStats};
use relata_storage::Connection;
use std::collections::HashSet;
use tracing::trace;

/// Pending insertions, updates and deletions.
///
/// Execution order is fixed: every insertion, then every update, then every
/// deletion, each category in enqueue order.
#[derive(Default)]
pub struct ActionQueue {
    insertions: Vec<Box<dyn EntityAction>>,
    updates: Vec<Box<dyn EntityAction>>,
    deletions: Vec<Box<dyn EntityAction>>,
    inserting: HashSet<EntityHandle>,
}

impl ActionQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an insertion.
    pub fn add_insertion(&mut self, action: Box<dyn EntityAction>) {
        self.inserting.insert(action.handle());
        self.insertions.push(action);
    }

    /// Appends an update.
    pub fn add_update(&mut self, action: Box<dyn EntityAction>) {
        self.updates.push(action);
    }

    /// Appends a deletion.
    pub fn add_deletion(&mut self, action: Box<dyn EntityAction>) {
        self.deletions.push(action);
    }

    /// Runs every action on `conn` in category order.
    ///
    /// The first failure stops execution and is returned; the queue is left
    /// untouched either way, so the caller decides when to [`clear`](Self::clear).
    pub fn execute_actions(&self, conn: &mut dyn Connection) -> CoreResult<FlushStats> {
        let mut stats = FlushStats::default();
        for action in self
            .insertions
            .iter()
            .chain(&self.updates)
            .chain(&self.deletions)
        {
            trace!(kind = %action.kind(), entity = %action.handle(), "executing action");
            action.execute(conn)?;
            match action.kind() {
                ActionKind::Insert => stats.inserted += 1,
                ActionKind::Update => stats.updated += 1,
                ActionKind::Delete => stats.deleted += 1,
            }
        }
        Ok(stats)
    }

    /// Drops every pending action.
    pub fn clear(&mut self) {
        self.insertions.clear();
        self.updates.clear();
        self.deletions.clear();
        self.inserting.clear();
    }

    /// Returns true if an insertion is pending for `handle`.
    #[must_use]
    pub fn has_insertion(&self, handle: EntityHandle) -> bool {
        self.inserting.contains(&handle)
    }

    /// Number of pending insertions.
    #[must_use]
    pub fn insertion_count(&self) -> usize {
        self.insertions.len()
    }

    /// Number of pending updates.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.len()
    }

    /// Number of pending deletions.
    #[must_use]
    pub fn deletion_count(&self) -> usize {
        self.deletions.len()
    }

    /// Total number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.insertions.len() + self.updates.len() + self.deletions.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ActionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionQueue")
            .field("insertions", &self.insertions.len())
            .field("updates", &self.updates.len())
            .field("deletions", &self.deletions.len())
            .finish()
    }
}
