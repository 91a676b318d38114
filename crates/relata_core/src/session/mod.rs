//! Session façade.
//!
//! An [`EntityManagerFactory`] owns everything sessions share: the metadata
//! registry, the codec registry and the connection provider. Each
//! [`EntityManager`] it creates owns one persistence context and one
//! transaction at a time.
//!
//! ```
//! use relata_core::{Persistence, PersistenceConfig};
//!
//! let factory = Persistence::create_entity_manager_factory(PersistenceConfig::in_memory()).unwrap();
//! let mut em = factory.create_entity_manager().unwrap();
//! em.begin().unwrap();
//! em.commit().unwrap();
//! em.close().unwrap();
//! factory.close().unwrap();
//! ```

mod factory;
mod manager;

pub use factory::EntityManagerFactory;
pub use manager::EntityManager;

use crate::config::PersistenceConfig;
use crate::error::CoreResult;

/// Bootstrap entry point.
pub struct Persistence;

impl Persistence {
    /// Builds a factory for `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, an entity fails to
    /// register or the database cannot be opened.
    pub fn create_entity_manager_factory(
        config: PersistenceConfig,
    ) -> CoreResult<EntityManagerFactory> {
        EntityManagerFactory::new(config)
    }
}
