//! Adapters between tracked entities and generated statements.

use crate::entity::{Entity, EntityObject};
use crate::error::{CoreError, CoreResult};
use crate::executor::StatementExecutor;
use crate::metadata::{EntityMetadata, IdGeneration};
use crate::sql;
use relata_codec::{SqlValue, Value};
use relata_storage::{Connection, Row};
use std::any::Any;
use std::sync::Arc;
use tracing::warn;

/// Inserts entities.
#[derive(Clone)]
pub struct EntityPersister {
    executor: Arc<dyn StatementExecutor>,
}

impl EntityPersister {
    /// Creates a persister.
    pub fn new(executor: Arc<dyn StatementExecutor>) -> Self {
        Self { executor }
    }

    /// Inserts `entity` and returns the key the database generated.
    ///
    /// When the identifier is generated and still null, the generated key
    /// is written back onto the entity.
    pub fn insert(
        &self,
        conn: &mut dyn Connection,
        entity: &dyn EntityObject,
        metadata: &EntityMetadata,
    ) -> CoreResult<Option<Value>> {
        let statement = sql::insert_statement(metadata, &*entity.read())?;
        let generated = self.executor.execute_insert(conn, &statement)?;

        let identifier = metadata.identifier();
        if identifier.generation() == IdGeneration::Generated {
            if let Some(key) = &generated {
                let mut guard = entity.write();
                if identifier.get_value(&*guard)?.is_null() {
                    identifier.set_value(&mut *guard, key.clone())?;
                }
            }
        }
        Ok(generated)
    }
}

/// Updates entities.
#[derive(Clone)]
pub struct EntityUpdater {
    executor: Arc<dyn StatementExecutor>,
}

impl EntityUpdater {
    /// Creates an updater.
    pub fn new(executor: Arc<dyn StatementExecutor>) -> Self {
        Self { executor }
    }

    /// Writes the current state of `entity` to the row tracked under `id`.
    ///
    /// Returns every attribute value as read when the statement was built.
    pub fn update(
        &self,
        conn: &mut dyn Connection,
        entity: &dyn EntityObject,
        metadata: &EntityMetadata,
        id: Value,
    ) -> CoreResult<Box<[Value]>> {
        let (statement, values) = {
            let guard = entity.read();
            (
                sql::update_statement(metadata, &*guard, id)?,
                metadata.snapshot(&*guard)?,
            )
        };

        if let Some(statement) = statement {
            let affected = self.executor.execute_update(conn, &statement)?;
            if affected == 0 {
                warn!(
                    entity = metadata.entity_name(),
                    sql = statement.sql(),
                    "update matched no row"
                );
            }
        }
        Ok(values)
    }

    /// Parameters the UPDATE of `entity` under `id` would bind.
    pub fn extract_update_values(
        metadata: &EntityMetadata,
        entity: &dyn Any,
        id: Value,
    ) -> CoreResult<Vec<Value>> {
        sql::update_values(metadata, entity, id)
    }
}

/// Deletes entities.
#[derive(Clone)]
pub struct EntityDeleter {
    executor: Arc<dyn StatementExecutor>,
}

impl EntityDeleter {
    /// Creates a deleter.
    pub fn new(executor: Arc<dyn StatementExecutor>) -> Self {
        Self { executor }
    }

    /// Deletes the row tracked under `id` and returns the affected row count.
    pub fn delete(
        &self,
        conn: &mut dyn Connection,
        metadata: &EntityMetadata,
        id: Value,
    ) -> CoreResult<u64> {
        if id.is_null() {
            return Err(CoreError::invalid_key(format!(
                "cannot delete {} without an identifier",
                metadata.entity_name()
            )));
        }
        let statement = sql::delete_statement(metadata, id);
        self.executor.execute_update(conn, &statement)
    }
}

/// Reads entities.
#[derive(Clone)]
pub struct EntityLoader {
    executor: Arc<dyn StatementExecutor>,
}

impl EntityLoader {
    /// Creates a loader.
    pub fn new(executor: Arc<dyn StatementExecutor>) -> Self {
        Self { executor }
    }

    /// Loads the row with identifier `id`.
    pub fn load<T: Entity>(
        &self,
        conn: &mut dyn Connection,
        metadata: &EntityMetadata,
        id: &Value,
    ) -> CoreResult<Option<T>> {
        let statement = sql::select_by_id_statement(metadata, id.clone());
        let rows = self.executor.execute_query(conn, &statement)?;
        match rows.row(0) {
            Some(row) => self.hydrate(metadata, &row).map(Some),
            None => Ok(None),
        }
    }

    /// Decodes the identifier column of `row`.
    pub fn row_id(&self, metadata: &EntityMetadata, row: &Row<'_>) -> CoreResult<Value> {
        let identifier = metadata.identifier();
        self.executor.decode(
            identifier.attribute_type(),
            column(row, identifier.column_name())?,
        )
    }

    /// Builds an entity from a row holding its identifier and attribute
    /// columns.
    pub fn hydrate<T: Entity>(&self, metadata: &EntityMetadata, row: &Row<'_>) -> CoreResult<T> {
        let mut entity = T::default();
        let id = self.row_id(metadata, row)?;
        metadata.identifier().set_value(&mut entity, id)?;
        for attribute in metadata.attributes() {
            let value = self.executor.decode(
                attribute.attribute_type(),
                column(row, attribute.column_name())?,
            )?;
            attribute.set_value(&mut entity, value)?;
        }
        Ok(entity)
    }
}

fn column(row: &Row<'_>, name: &str) -> CoreResult<SqlValue> {
    row.get(name)
        .cloned()
        .ok_or_else(|| CoreError::invalid_metadata(format!("result has no column {name}")))
}
