//! Entity manager factory.

use super::manager::EntityManager;
use crate::config::PersistenceConfig;
use crate::error::{CoreError, CoreResult};
use crate::executor::{SqlExecutor, StatementExecutor};
use crate::metadata::MetadataRegistry;
use relata_codec::CodecRegistry;
use relata_storage::{ConnectionProvider, SqliteProvider};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// State shared by a factory and every manager it created.
pub(crate) struct FactoryShared {
    pub(crate) registry: Arc<MetadataRegistry>,
    pub(crate) codecs: Arc<CodecRegistry>,
    pub(crate) provider: Arc<dyn ConnectionProvider>,
    pub(crate) executor: Arc<dyn StatementExecutor>,
    open: AtomicBool,
}

impl FactoryShared {
    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Creates [`EntityManager`]s for one persistence unit.
///
/// The factory is cheap to share behind an `Arc`; managers keep the shared
/// state alive on their own.
pub struct EntityManagerFactory {
    shared: Arc<FactoryShared>,
}

impl EntityManagerFactory {
    /// Builds a factory backed by a SQLite provider for the configured
    /// location.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidArgument`] if the config has no connection
    /// - [`CoreError::Storage`] if the database cannot be opened
    /// - any registration error of the configured entity types
    pub fn new(config: PersistenceConfig) -> CoreResult<Self> {
        config.validate()?;
        let connection = config
            .connection
            .clone()
            .ok_or_else(|| CoreError::invalid_argument("persistence config has no connection"))?;
        let provider = SqliteProvider::new(connection)?;
        Self::with_provider(config, Arc::new(provider))
    }

    /// Builds a factory that draws connections from `provider`.
    pub fn with_provider(
        config: PersistenceConfig,
        provider: Arc<dyn ConnectionProvider>,
    ) -> CoreResult<Self> {
        Self::with_codecs(config, provider, CodecRegistry::new())
    }

    /// Builds a factory with a custom codec registry.
    pub fn with_codecs(
        config: PersistenceConfig,
        provider: Arc<dyn ConnectionProvider>,
        codecs: CodecRegistry,
    ) -> CoreResult<Self> {
        let registry = Arc::new(MetadataRegistry::new());
        config.apply_registrations(&registry)?;

        let codecs = Arc::new(codecs);
        let executor =
            Arc::new(SqlExecutor::new(Arc::clone(&codecs)).with_sql_logging(config.log_sql));

        info!(
            entities = registry.len(),
            log_sql = config.log_sql,
            "entity manager factory created"
        );
        Ok(Self {
            shared: Arc::new(FactoryShared {
                registry,
                codecs,
                provider,
                executor,
                open: AtomicBool::new(true),
            }),
        })
    }

    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalState`] if the factory is closed.
    pub fn create_entity_manager(&self) -> CoreResult<EntityManager> {
        if !self.is_open() {
            return Err(CoreError::illegal_state("entity manager factory is closed"));
        }
        Ok(EntityManager::new(Arc::clone(&self.shared)))
    }

    /// The metadata registry shared by all sessions.
    #[must_use]
    pub fn metadata_registry(&self) -> &Arc<MetadataRegistry> {
        &self.shared.registry
    }

    /// The codec registry shared by all sessions.
    #[must_use]
    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.shared.codecs
    }

    /// The connection provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn ConnectionProvider> {
        &self.shared.provider
    }

    /// Closes the factory and shuts the provider down.
    ///
    /// Managers created earlier reject further work. Closing twice does
    /// nothing.
    pub fn close(&self) -> CoreResult<()> {
        if !self.shared.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.shared.provider.shutdown()?;
        info!("entity manager factory closed");
        Ok(())
    }

    /// Returns true until [`close`](Self::close) is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }
}

impl std::fmt::Debug for EntityManagerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManagerFactory")
            .field("open", &self.is_open())
            .field("registry", &self.shared.registry)
            .finish_non_exhaustive()
    }
}
