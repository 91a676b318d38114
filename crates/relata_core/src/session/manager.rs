//! Entity manager.

use super::factory::FactoryShared;
use crate::context::PersistenceContext;
use crate::entity::{Entity, EntityKey, EntityRef};
use crate::error::{CoreError, CoreResult};
use crate::metadata::EntityMetadata;
use crate::persister::EntityLoader;
use crate::query::{QueryParser, QueryTranslator, TypedQuery};
use crate::sql::Statement;
use crate::transaction::{TransactionCoordinator, TransactionStatus};
use crate::types::{EntityType, FlushStats};
use parking_lot::{Mutex, MutexGuard};
use relata_codec::Value;
use relata_storage::ResultSet;
use std::sync::Arc;
use tracing::{debug, error};

/// A unit-of-work session.
///
/// Owns one [`PersistenceContext`] and one transaction at a time. Writes are
/// staged in the context and reach the database on [`flush`](Self::flush)
/// or [`commit`](Self::commit).
///
/// # Commit protocol
///
/// `commit` flushes the context, commits the connection, then clears the
/// context. If the flush fails the transaction is rolled back, the context
/// is cleared and the flush error is returned. `rollback` also clears the
/// context.
pub struct EntityManager {
    shared: Arc<FactoryShared>,
    context: Arc<Mutex<PersistenceContext>>,
    transaction: TransactionCoordinator,
    loader: EntityLoader,
    open: bool,
}

impl EntityManager {
    pub(crate) fn new(shared: Arc<FactoryShared>) -> Self {
        let context = Arc::new(Mutex::new(PersistenceContext::new(
            Arc::clone(&shared.registry),
            Arc::clone(&shared.executor),
        )));
        let transaction = coordinator(&shared, &context);
        let loader = EntityLoader::new(Arc::clone(&shared.executor));
        Self {
            shared,
            context,
            transaction,
            loader,
            open: true,
        }
    }

    /// Starts a transaction.
    ///
    /// A transaction that already committed or rolled back is replaced by a
    /// fresh one.
    ///
    /// # Errors
    ///
    /// - [`CoreError::IllegalState`] if the manager is closed or a
    ///   transaction is already active
    /// - [`CoreError::Transaction`] if no connection could be acquired
    pub fn begin(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        if self.transaction.status().is_terminal() {
            self.transaction = coordinator(&self.shared, &self.context);
        }
        self.transaction.begin()
    }

    /// Flushes pending changes and commits.
    ///
    /// # Errors
    ///
    /// - [`CoreError::IllegalState`] if no transaction is active
    /// - the flush error, after rolling back
    /// - [`CoreError::Transaction`] if the commit failed
    pub fn commit(&mut self) -> CoreResult<()> {
        if !self.transaction.is_active() {
            return Err(CoreError::illegal_state("no active transaction to commit"));
        }

        if let Err(flush_err) = self.transaction.invoke_flush() {
            error!(error = %flush_err, "flush before commit failed, rolling back");
            if let Err(rollback_err) = self.transaction.rollback() {
                error!(error = %rollback_err, "rollback after failed flush failed");
            }
            self.transaction.invoke_clear();
            return Err(flush_err);
        }

        let result = self.transaction.commit();
        self.transaction.invoke_clear();
        result
    }

    /// Rolls back the active transaction and clears the context.
    ///
    /// Does nothing if no transaction is active.
    pub fn rollback(&mut self) -> CoreResult<()> {
        if !self.transaction.is_active() {
            return self.transaction.rollback();
        }
        let result = self.transaction.rollback();
        self.transaction.invoke_clear();
        result
    }

    /// Returns true while a transaction is active.
    #[must_use]
    pub fn is_transaction_active(&self) -> bool {
        self.transaction.is_active()
    }

    /// Status of the current transaction.
    #[must_use]
    pub fn transaction_status(&self) -> TransactionStatus {
        self.transaction.status()
    }

    /// Makes a new entity managed and schedules its INSERT.
    ///
    /// # Errors
    ///
    /// - [`CoreError::IllegalState`] if the manager is closed or no
    ///   transaction is active
    /// - [`CoreError::InvalidArgument`] if the instance is already managed
    /// - [`CoreError::DuplicateIdentity`] if another instance holds its key
    pub fn persist<T: Entity>(&mut self, entity: &EntityRef<T>) -> CoreResult<()> {
        self.ensure_open()?;
        self.ensure_active()?;
        let mut context = self.context.lock();
        if context.contains(entity) {
            return Err(CoreError::invalid_argument(format!(
                "entity {} is already managed",
                entity.handle()
            )));
        }
        context.add_entity(entity)
    }

    /// Finds the entity of type `T` with identifier `id`.
    ///
    /// The identity map is consulted first. Otherwise the row is loaded on
    /// the transaction's connection and the new instance becomes managed.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidKey`] if `id` is null
    /// - [`CoreError::IllegalState`] if the manager is closed, or the entity
    ///   is not tracked and no transaction is active
    pub fn find<T: Entity>(&mut self, id: impl Into<Value>) -> CoreResult<Option<EntityRef<T>>> {
        self.ensure_open()?;
        let key = EntityKey::of::<T>(id)?;
        if let Some(found) = self.context.lock().get_entity::<T>(key.id().clone())? {
            return Ok(Some(found));
        }

        self.ensure_active()?;
        let metadata = self.shared.registry.get_for::<T>()?;
        let conn = self.transaction.connection()?;
        let Some(loaded) = self.loader.load::<T>(conn, &metadata, key.id())? else {
            return Ok(None);
        };

        let entity = EntityRef::new(loaded);
        self.context.lock().add_loaded_entity(&entity)?;
        debug!(key = %key, "entity loaded");
        Ok(Some(entity))
    }

    /// Marks a managed entity for deletion.
    ///
    /// # Errors
    ///
    /// - [`CoreError::IllegalState`] if the manager is closed
    /// - [`CoreError::NotManaged`] or [`CoreError::InvalidState`] from the
    ///   context
    pub fn remove<T: Entity>(&mut self, entity: &EntityRef<T>) -> CoreResult<()> {
        self.ensure_open()?;
        self.context.lock().remove_entity(entity)
    }

    /// Writes pending changes without committing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalState`] if the manager is closed or no
    /// transaction is active, or the first statement failure.
    pub fn flush(&mut self) -> CoreResult<FlushStats> {
        self.ensure_open()?;
        self.ensure_active()?;
        let conn = self.transaction.connection()?;
        self.context.lock().flush(conn)
    }

    /// Returns true if this instance is managed by this session.
    pub fn contains<T: Entity>(&self, entity: &EntityRef<T>) -> CoreResult<bool> {
        self.ensure_open()?;
        Ok(self.context.lock().contains(entity))
    }

    /// Detaches every managed entity and drops pending changes.
    pub fn clear(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        self.context.lock().clear();
        Ok(())
    }

    /// Closes the session.
    ///
    /// Closing twice does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalState`] while a transaction is active;
    /// the manager stays open so the transaction can still be ended.
    pub fn close(&mut self) -> CoreResult<()> {
        if !self.open {
            return Ok(());
        }
        if self.transaction.is_active() {
            return Err(CoreError::illegal_state(
                "cannot close an entity manager with an active transaction",
            ));
        }
        self.context.lock().clear();
        self.open = false;
        debug!("entity manager closed");
        Ok(())
    }

    /// Returns true until [`close`](Self::close) succeeds.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Locks the persistence context for inspection.
    pub fn persistence_context(&self) -> MutexGuard<'_, PersistenceContext> {
        self.context.lock()
    }

    /// Parses `text` into a query returning `T`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Query`] if the text does not parse, names an
    /// unknown entity or field, or selects an entity other than `T`.
    pub fn create_query<T: Entity>(&mut self, text: &str) -> CoreResult<TypedQuery<'_, T>> {
        self.ensure_open()?;
        let statement = QueryParser::parse(text)?;
        let translated = QueryTranslator::new(&self.shared.registry).translate(&statement)?;
        if translated.metadata().entity_type() != EntityType::of::<T>() {
            return Err(CoreError::query(format!(
                "query selects {} but {} was requested",
                translated.metadata().entity_name(),
                EntityType::of::<T>()
            )));
        }
        Ok(TypedQuery::new(self, translated))
    }

    pub(crate) fn run_query(&mut self, statement: &Statement) -> CoreResult<ResultSet> {
        self.ensure_open()?;
        self.ensure_active()?;
        let conn = self.transaction.connection()?;
        self.shared.executor.execute_query(conn, statement)
    }

    /// Turns rows into managed instances, reusing tracked ones.
    pub(crate) fn materialize<T: Entity>(
        &mut self,
        metadata: &EntityMetadata,
        rows: &ResultSet,
    ) -> CoreResult<Vec<EntityRef<T>>> {
        let mut context = self.context.lock();
        let mut results = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            let id = self.loader.row_id(metadata, &row)?;
            if let Some(tracked) = context.get_entity::<T>(id)? {
                results.push(tracked);
                continue;
            }
            let entity = EntityRef::new(self.loader.hydrate::<T>(metadata, &row)?);
            context.add_loaded_entity(&entity)?;
            results.push(entity);
        }
        Ok(results)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if !self.open {
            return Err(CoreError::illegal_state("entity manager is closed"));
        }
        if !self.shared.is_open() {
            return Err(CoreError::illegal_state("entity manager factory is closed"));
        }
        Ok(())
    }

    fn ensure_active(&self) -> CoreResult<()> {
        if self.transaction.is_active() {
            Ok(())
        } else {
            Err(CoreError::illegal_state(format!(
                "transaction is {}",
                self.transaction.status()
            )))
        }
    }
}

/// A coordinator whose callbacks flush and clear `context`.
fn coordinator(
    shared: &FactoryShared,
    context: &Arc<Mutex<PersistenceContext>>,
) -> TransactionCoordinator {
    let mut transaction = TransactionCoordinator::new(Arc::clone(&shared.provider));
    let flush_target = Arc::clone(context);
    transaction.set_flush_callback(move |conn| flush_target.lock().flush(conn).map(|_| ()));
    let clear_target = Arc::clone(context);
    transaction.set_clear_callback(move || clear_target.lock().clear());
    transaction
}

impl std::fmt::Debug for EntityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("open", &self.open)
            .field("transaction", &self.transaction.status())
            .field("context", &*self.context.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PersistenceConfig;
    use crate::session::EntityManagerFactory;
    use relata_codec::AttributeType;
    use relata_storage::{Connection, ConnectionProvider, InstrumentedProvider, SqliteProvider};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Book {
        id: i64,
        title: String,
    }

    impl Entity for Book {
        fn metadata() -> CoreResult<EntityMetadata> {
            EntityMetadata::builder::<Book>("Book")
                .table("books")
                .id("id", AttributeType::Integer, |b| b.id.into(), |b, v| {
                    b.id = v.into_typed()?;
                    Ok(())
                })
                .attribute("title", AttributeType::Text, |b| b.title.clone().into(), |b, v| {
                    b.title = v.into_typed()?;
                    Ok(())
                })
                .build()
        }
    }

    fn factory() -> (EntityManagerFactory, InstrumentedProvider) {
        let sqlite = SqliteProvider::in_memory().unwrap();
        let mut conn = sqlite.acquire().unwrap();
        conn.execute_batch("CREATE TABLE books (id INTEGER PRIMARY KEY, title TEXT)")
            .unwrap();
        sqlite.release(conn).unwrap();

        let provider = InstrumentedProvider::new(Arc::new(sqlite));
        let factory = EntityManagerFactory::with_provider(
            PersistenceConfig::new().register::<Book>(),
            Arc::new(provider.clone()),
        )
        .unwrap();
        (factory, provider)
    }

    fn book(id: i64, title: &str) -> EntityRef<Book> {
        EntityRef::new(Book {
            id,
            title: title.into(),
        })
    }

    #[test]
    fn persist_requires_active_transaction() {
        let (factory, _) = factory();
        let mut em = factory.create_entity_manager().unwrap();
        assert!(matches!(
            em.persist(&book(1, "Dune")),
            Err(CoreError::IllegalState { .. })
        ));
    }

    #[test]
    fn persisting_twice_is_rejected() {
        let (factory, _) = factory();
        let mut em = factory.create_entity_manager().unwrap();
        em.begin().unwrap();
        let dune = book(1, "Dune");
        em.persist(&dune).unwrap();
        assert!(matches!(
            em.persist(&dune),
            Err(CoreError::InvalidArgument { .. })
        ));
        em.rollback().unwrap();
    }

    #[test]
    fn commit_writes_and_clears() {
        let (factory, provider) = factory();
        let mut em = factory.create_entity_manager().unwrap();
        em.begin().unwrap();
        let dune = book(1, "Dune");
        em.persist(&dune).unwrap();
        em.commit().unwrap();

        assert_eq!(em.transaction_status(), TransactionStatus::Committed);
        assert!(!em.contains(&dune).unwrap());
        assert_eq!(provider.release_count(), 1);

        em.begin().unwrap();
        let found = em.find::<Book>(1).unwrap().unwrap();
        assert!(!found.ptr_eq(&dune));
        assert_eq!(found.read().title, "Dune");
        em.commit().unwrap();
        assert_eq!(provider.outstanding(), 0);
    }

    #[test]
    fn find_returns_tracked_instance() {
        let (factory, provider) = factory();
        let mut em = factory.create_entity_manager().unwrap();
        em.begin().unwrap();
        let dune = book(1, "Dune");
        em.persist(&dune).unwrap();
        provider.clear_statements();

        let found = em.find::<Book>(1).unwrap().unwrap();
        assert!(found.ptr_eq(&dune));
        assert!(provider.statements().is_empty());
        em.rollback().unwrap();
    }

    #[test]
    fn find_outside_transaction_needs_tracked_entity() {
        let (factory, _) = factory();
        let mut em = factory.create_entity_manager().unwrap();
        assert!(matches!(
            em.find::<Book>(7),
            Err(CoreError::IllegalState { .. })
        ));
        assert!(matches!(
            em.find::<Book>(Value::Null),
            Err(CoreError::InvalidKey { .. })
        ));
    }

    #[test]
    fn failed_flush_rolls_back_and_clears() {
        let (factory, provider) = factory();
        let mut em = factory.create_entity_manager().unwrap();
        em.begin().unwrap();
        em.persist(&book(1, "Dune")).unwrap();
        provider.fail_statements_containing(Some("INSERT"));

        assert!(matches!(
            em.commit(),
            Err(CoreError::PersistenceIo { .. })
        ));
        assert_eq!(em.transaction_status(), TransactionStatus::RolledBack);
        assert!(em.persistence_context().is_empty());
        assert_eq!(provider.commit_count(), 0);
        assert_eq!(provider.release_count(), 1);
    }

    #[test]
    fn close_refused_while_active() {
        let (factory, _) = factory();
        let mut em = factory.create_entity_manager().unwrap();
        em.begin().unwrap();
        assert!(matches!(em.close(), Err(CoreError::IllegalState { .. })));
        assert!(em.is_open());

        em.rollback().unwrap();
        em.close().unwrap();
        em.close().unwrap();
        assert!(!em.is_open());
        assert!(matches!(em.begin(), Err(CoreError::IllegalState { .. })));
    }

    #[test]
    fn closed_factory_closes_managers() {
        let (factory, _) = factory();
        let mut em = factory.create_entity_manager().unwrap();
        factory.close().unwrap();
        assert!(matches!(em.begin(), Err(CoreError::IllegalState { .. })));
    }

    #[test]
    fn commit_without_transaction_fails() {
        let (factory, _) = factory();
        let mut em = factory.create_entity_manager().unwrap();
        assert!(matches!(em.commit(), Err(CoreError::IllegalState { .. })));
        em.rollback().unwrap();
    }

    #[test]
    fn rollback_discards_staged_work() {
        let (factory, provider) = factory();
        let mut em = factory.create_entity_manager().unwrap();
        em.begin().unwrap();
        em.persist(&book(1, "Dune")).unwrap();
        em.flush().unwrap();
        em.rollback().unwrap();
        assert!(em.persistence_context().is_empty());

        em.begin().unwrap();
        assert!(em.find::<Book>(1).unwrap().is_none());
        em.commit().unwrap();
        assert_eq!(provider.outstanding(), 0);
    }
}
