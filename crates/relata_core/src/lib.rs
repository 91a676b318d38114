//! # Relata Core
//!
//! Unit-of-work persistence engine for Relata.
//!
//! This crate provides:
//! - Entity metadata: descriptor tables of identifier and attribute accessors
//! - A persistence context with an identity map and snapshot dirty checking
//! - An ordered action queue (insertions, then updates, then deletions)
//! - A transaction coordinator that releases its connection exactly once
//! - The [`EntityManager`] session façade and its factory
//! - A small query language over registered entities
//!
//! ## Example
//!
//! ```
//! use relata_core::{
//!     AttributeType, CoreResult, Entity, EntityMetadata, EntityRef, Persistence,
//!     PersistenceConfig,
//! };
//!
//! #[derive(Debug, Default)]
//! struct Member {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Entity for Member {
//!     fn metadata() -> CoreResult<EntityMetadata> {
//!         EntityMetadata::builder::<Member>("Member")
//!             .table("members")
//!             .id("id", AttributeType::Integer, |m| m.id.into(), |m, v| {
//!                 m.id = v.into_typed()?;
//!                 Ok(())
//!             })
//!             .attribute("name", AttributeType::Text, |m| m.name.clone().into(), |m, v| {
//!                 m.name = v.into_typed()?;
//!                 Ok(())
//!             })
//!             .build()
//!     }
//! }
//!
//! let factory = Persistence::create_entity_manager_factory(
//!     PersistenceConfig::in_memory().register::<Member>(),
//! )
//! .unwrap();
//! # {
//! #     use relata_storage::ConnectionProvider;
//! #     let mut raw = factory.provider().acquire().unwrap();
//! #     raw.execute_batch("CREATE TABLE members (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
//! #     factory.provider().release(raw).unwrap();
//! # }
//! let mut em = factory.create_entity_manager().unwrap();
//!
//! em.begin().unwrap();
//! let alice = EntityRef::new(Member { id: 1, name: "Alice".into() });
//! em.persist(&alice).unwrap();
//! em.commit().unwrap();
//!
//! em.begin().unwrap();
//! let found = em.find::<Member>(1).unwrap().unwrap();
//! assert_eq!(found.read().name, "Alice");
//! em.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod entity;
mod error;
pub mod executor;
pub mod metadata;
pub mod persister;
pub mod query;
pub mod session;
pub mod sql;
pub mod transaction;
mod types;

pub use config::PersistenceConfig;
pub use context::{ActionKind, ActionQueue, EntityAction, PersistenceContext};
pub use entity::{Entity, EntityEntry, EntityKey, EntityRef, EntityStatus};
pub use error::{CoreError, CoreResult};
pub use executor::{SqlExecutor, StatementExecutor};
pub use metadata::{
    AttributeMetadata, EntityMetadata, EntityMetadataBuilder, IdGeneration, IdentifierMetadata,
    MetadataRegistry,
};
pub use query::{QueryParser, QueryTranslator, TypedQuery};
pub use session::{EntityManager, EntityManagerFactory, Persistence};
pub use sql::Statement;
pub use transaction::{TransactionCoordinator, TransactionStatus};
pub use types::{EntityHandle, EntityType, FlushStats};

pub use relata_codec::{
    AttributeType, CodecError, CodecRegistry, FromValue, SqlValue, Value, ValueCodec,
};
