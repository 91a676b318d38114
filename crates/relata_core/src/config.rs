//! Persistence unit configuration.

use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::metadata::MetadataRegistry;
use crate::session::EntityManagerFactory;
use relata_storage::ConnectionConfig;
use std::path::PathBuf;

type Registration = fn(&MetadataRegistry) -> CoreResult<()>;

fn register_entity<T: Entity>(registry: &MetadataRegistry) -> CoreResult<()> {
    registry.register::<T>().map(|_| ())
}

/// Configuration of a persistence unit.
///
/// Names the database to connect to and the entity types the factory
/// registers when it is built.
#[derive(Clone, Default)]
pub struct PersistenceConfig {
    /// Connection settings. Required.
    pub connection: Option<ConnectionConfig>,

    /// Whether generated SQL is logged at debug level (otherwise trace).
    pub log_sql: bool,

    registrations: Vec<Registration>,
}

impl PersistenceConfig {
    /// Creates an empty configuration with no connection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for a fresh in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new().with_connection(ConnectionConfig::in_memory())
    }

    /// Configuration for a database file.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new().with_connection(ConnectionConfig::file(path))
    }

    /// Sets the connection settings.
    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Adds an entity type to register.
    #[must_use]
    pub fn register<T: Entity>(mut self) -> Self {
        self.registrations.push(register_entity::<T>);
        self
    }

    /// Sets SQL logging.
    #[must_use]
    pub const fn log_sql(mut self, enabled: bool) -> Self {
        self.log_sql = enabled;
        self
    }

    /// Number of entity types to register.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.registrations.len()
    }

    /// Registers every configured entity type in `registry`.
    pub(crate) fn apply_registrations(&self, registry: &MetadataRegistry) -> CoreResult<()> {
        self.registrations
            .iter()
            .try_for_each(|register| register(registry))
    }

    /// Checks that the configuration can build a factory.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if no connection is set.
    pub fn validate(&self) -> CoreResult<()> {
        match &self.connection {
            Some(_) => Ok(()),
            None => Err(CoreError::invalid_argument(
                "persistence config has no connection",
            )),
        }
    }

    /// Builds an [`EntityManagerFactory`] from this configuration.
    pub fn build_factory(self) -> CoreResult<EntityManagerFactory> {
        EntityManagerFactory::new(self)
    }
}

impl std::fmt::Debug for PersistenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceConfig")
            .field("connection", &self.connection)
            .field("log_sql", &self.log_sql)
            .field("entities", &self.registrations.len())
            .finish()
    }
}
