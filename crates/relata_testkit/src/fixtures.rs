//! Sample entities and database helpers.
//!
//! Every helper here panics on setup failure; they are meant for tests.

use relata_codec::AttributeType;
use relata_core::{
    CoreResult, Entity, EntityManagerFactory, EntityMetadata, EntityRef, PersistenceConfig,
};
use relata_storage::{ConnectionConfig, ConnectionProvider, InstrumentedProvider, SqliteProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// DDL for the tables of [`Member`] and [`Team`].
pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS members (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        age INTEGER
    );
    CREATE TABLE IF NOT EXISTS teams (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        is_active INTEGER NOT NULL
    );
";

/// An entity with an assigned integer identifier.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Member {
    /// Identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Age, if known.
    pub age: Option<i64>,
}

impl Entity for Member {
    fn metadata() -> CoreResult<EntityMetadata> {
        EntityMetadata::builder::<Member>("Member")
            .table("members")
            .id("id", AttributeType::Integer, |m| m.id.into(), |m, v| {
                m.id = v.into_typed()?;
                Ok(())
            })
            .attribute("name", AttributeType::Text, |m| m.name.clone().into(), |m, v| {
                m.name = v.into_typed()?;
                Ok(())
            })
            .nullable(false)
            .attribute("age", AttributeType::Integer, |m| m.age.into(), |m, v| {
                m.age = v.into_typed()?;
                Ok(())
            })
            .build()
    }
}

/// An entity whose identifier the database generates.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Team {
    /// Identifier, `None` until inserted.
    pub id: Option<i64>,
    /// Unique team name.
    pub name: String,
    /// Whether the team is active.
    pub active: bool,
}

impl Entity for Team {
    fn metadata() -> CoreResult<EntityMetadata> {
        EntityMetadata::builder::<Team>("Team")
            .table("teams")
            .id("id", AttributeType::Integer, |t| t.id.into(), |t, v| {
                t.id = v.into_typed()?;
                Ok(())
            })
            .generated_id()
            .attribute("name", AttributeType::Text, |t| t.name.clone().into(), |t, v| {
                t.name = v.into_typed()?;
                Ok(())
            })
            .nullable(false)
            .unique(true)
            .attribute("active", AttributeType::Bool, |t| t.active.into(), |t, v| {
                t.active = v.into_typed()?;
                Ok(())
            })
            .column("is_active")
            .build()
    }
}

/// A new, unmanaged member.
pub fn member(id: i64, name: &str) -> EntityRef<Member> {
    EntityRef::new(Member {
        id,
        name: name.to_string(),
        age: None,
    })
}

/// A new, unmanaged team without an identifier.
pub fn team(name: &str) -> EntityRef<Team> {
    EntityRef::new(Team {
        id: None,
        name: name.to_string(),
        active: true,
    })
}

/// Persistence config registering the sample entities.
pub fn sample_config() -> PersistenceConfig {
    PersistenceConfig::new()
        .register::<Member>()
        .register::<Team>()
}

/// Creates the sample tables through `provider`.
pub fn install_schema(provider: &dyn ConnectionProvider) {
    let mut conn = provider.acquire().expect("Failed to acquire connection");
    conn.execute_batch(SCHEMA).expect("Failed to create schema");
    provider.release(conn).expect("Failed to release connection");
}

/// A factory over a database with the sample schema, plus a handle on the
/// instrumented provider it draws connections from.
pub struct TestDatabase {
    /// The factory.
    pub factory: EntityManagerFactory,
    /// Counters and fault injection for the factory's connections.
    pub provider: InstrumentedProvider,
    _temp_dir: Option<TempDir>,
    path: Option<PathBuf>,
}

impl TestDatabase {
    /// A fresh in-memory database.
    pub fn memory() -> Self {
        Self::open(ConnectionConfig::in_memory(), None)
    }

    /// A database file in a temporary directory, removed on drop.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("relata.db");
        let mut db = Self::open(ConnectionConfig::file(&path), Some(path));
        db._temp_dir = Some(temp_dir);
        db
    }

    fn open(config: ConnectionConfig, path: Option<PathBuf>) -> Self {
        let sqlite = SqliteProvider::new(config).expect("Failed to open database");
        install_schema(&sqlite);
        let provider = InstrumentedProvider::new(Arc::new(sqlite));
        let factory =
            EntityManagerFactory::with_provider(sample_config(), Arc::new(provider.clone()))
                .expect("Failed to build factory");
        Self {
            factory,
            provider,
            _temp_dir: None,
            path,
        }
    }

    /// The database file, if file-based.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Builds a second, independent factory over the same database file.
    pub fn reopen(&self) -> EntityManagerFactory {
        let path = self.path().expect("Only file databases can be reopened");
        sample_config()
            .with_connection(ConnectionConfig::file(path))
            .build_factory()
            .expect("Failed to reopen database")
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = EntityManagerFactory;

    fn deref(&self) -> &Self::Target {
        &self.factory
    }
}

/// Runs `f` against a fresh in-memory database.
pub fn with_test_db<F, R>(f: F) -> R
where
    F: FnOnce(&TestDatabase) -> R,
{
    let db = TestDatabase::memory();
    f(&db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_database_has_schema() {
        with_test_db(|db| {
            let mut em = db.create_entity_manager().unwrap();
            em.begin().unwrap();
            assert!(em.find::<Member>(1).unwrap().is_none());
            em.commit().unwrap();
            assert_eq!(db.provider.outstanding(), 0);
        });
    }

    #[test]
    fn file_database_has_path() {
        let db = TestDatabase::file();
        assert!(db.path().unwrap().ends_with("relata.db"));
        assert!(TestDatabase::memory().path().is_none());
    }
}
