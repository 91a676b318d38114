//! SQLite connections and provider.

use crate::config::{ConnectionConfig, DatabaseLocation};
use crate::connection::{Connection, ResultSet};
use crate::error::{StorageError, StorageResult};
use crate::provider::ConnectionProvider;
use parking_lot::Mutex;
use relata_codec::SqlValue;
use rusqlite::types::Value as DriverValue;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

fn to_driver(value: &SqlValue) -> DriverValue {
    match value {
        SqlValue::Null => DriverValue::Null,
        SqlValue::Integer(n) => DriverValue::Integer(*n),
        SqlValue::Real(n) => DriverValue::Real(*n),
        SqlValue::Text(s) => DriverValue::Text(s.clone()),
        SqlValue::Blob(b) => DriverValue::Blob(b.clone()),
    }
}

fn from_driver(value: DriverValue) -> SqlValue {
    match value {
        DriverValue::Null => SqlValue::Null,
        DriverValue::Integer(n) => SqlValue::Integer(n),
        DriverValue::Real(n) => SqlValue::Real(n),
        DriverValue::Text(s) => SqlValue::Text(s),
        DriverValue::Blob(b) => SqlValue::Blob(b),
    }
}

/// A connection to a SQLite database.
///
/// SQLite has no connection-level auto-commit switch, so turning auto-commit
/// off issues `BEGIN` and the connection keeps a transaction open until
/// auto-commit is turned back on.
pub struct SqliteConnection {
    conn: Option<rusqlite::Connection>,
    auto_commit: bool,
}

impl SqliteConnection {
    /// Opens a connection as described by `config`.
    pub fn open(config: &ConnectionConfig) -> StorageResult<Self> {
        let conn = rusqlite::Connection::open(config.open_target())?;
        conn.busy_timeout(config.busy_timeout)?;
        if config.foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON")?;
        }
        Ok(Self {
            conn: Some(conn),
            auto_commit: true,
        })
    }

    fn raw(&self) -> StorageResult<&rusqlite::Connection> {
        self.conn.as_ref().ok_or(StorageError::Closed)
    }

    /// Returns true if the driver has a transaction open.
    fn in_transaction(&self) -> StorageResult<bool> {
        Ok(!self.raw()?.is_autocommit())
    }
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> StorageResult<u64> {
        let affected = self
            .raw()?
            .execute(sql, rusqlite::params_from_iter(params.iter().map(to_driver)))?;
        Ok(affected as u64)
    }

    fn execute_returning_key(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> StorageResult<Option<SqlValue>> {
        let affected = self.execute(sql, params)?;
        if affected == 0 {
            return Ok(None);
        }
        Ok(Some(SqlValue::Integer(self.raw()?.last_insert_rowid())))
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> StorageResult<ResultSet> {
        let conn = self.raw()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let width = columns.len();

        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter().map(to_driver)))?;
        let mut collected = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(from_driver(row.get::<_, DriverValue>(i)?));
            }
            collected.push(values);
        }

        Ok(ResultSet::new(columns, collected))
    }

    fn execute_batch(&mut self, sql: &str) -> StorageResult<()> {
        self.raw()?.execute_batch(sql)?;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn set_auto_commit(&mut self, enabled: bool) -> StorageResult<()> {
        if enabled == self.auto_commit {
            return Ok(());
        }
        if enabled {
            if self.in_transaction()? {
                self.raw()?.execute_batch("COMMIT")?;
            }
        } else {
            self.raw()?.execute_batch("BEGIN DEFERRED")?;
        }
        self.auto_commit = enabled;
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        // the driver may already have ended the transaction after a failed statement
        if self.in_transaction()? {
            self.raw()?.execute_batch("COMMIT")?;
        }
        if !self.auto_commit {
            self.raw()?.execute_batch("BEGIN DEFERRED")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        if self.in_transaction()? {
            self.raw()?.execute_batch("ROLLBACK")?;
        }
        if !self.auto_commit {
            self.raw()?.execute_batch("BEGIN DEFERRED")?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    fn close(&mut self) -> StorageResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("closed", &self.is_closed())
            .field("auto_commit", &self.auto_commit)
            .finish()
    }
}

/// Opens a new SQLite connection per acquire.
///
/// For in-memory locations the provider keeps one anchor connection open for
/// its whole lifetime, so the shared database survives between transactions
/// and disappears on [`shutdown`](ConnectionProvider::shutdown).
pub struct SqliteProvider {
    config: ConnectionConfig,
    anchor: Mutex<Option<rusqlite::Connection>>,
    shut_down: AtomicBool,
}

impl SqliteProvider {
    /// Creates a provider for `config`.
    pub fn new(config: ConnectionConfig) -> StorageResult<Self> {
        let anchor = match &config.location {
            DatabaseLocation::Memory(name) => {
                if name.is_empty() {
                    return Err(StorageError::InvalidConfig(
                        "in-memory database name cannot be empty".into(),
                    ));
                }
                Some(rusqlite::Connection::open(config.open_target())?)
            }
            DatabaseLocation::File(path) => {
                if path.as_os_str().is_empty() {
                    return Err(StorageError::InvalidConfig(
                        "database path cannot be empty".into(),
                    ));
                }
                None
            }
        };

        info!(db = %config.open_target(), "sqlite provider initialized");
        Ok(Self {
            config,
            anchor: Mutex::new(anchor),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Creates a provider for a fresh in-memory database.
    pub fn in_memory() -> StorageResult<Self> {
        Self::new(ConnectionConfig::in_memory())
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl ConnectionProvider for SqliteProvider {
    fn acquire(&self) -> StorageResult<Box<dyn Connection>> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(StorageError::ProviderShutDown);
        }
        Ok(Box::new(SqliteConnection::open(&self.config)?))
    }

    fn release(&self, mut connection: Box<dyn Connection>) -> StorageResult<()> {
        if connection.is_closed() {
            return Ok(());
        }
        connection.close().map_err(|e| {
            warn!(error = %e, "failed to close connection");
            e
        })
    }

    fn shutdown(&self) -> StorageResult<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(anchor) = self.anchor.lock().take() {
            anchor.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
        }
        debug!(db = %self.config.open_target(), "sqlite provider shut down");
        Ok(())
    }
}

impl std::fmt::Debug for SqliteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteProvider")
            .field("location", &self.config.location)
            .field("shut_down", &self.shut_down.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider_with_table() -> SqliteProvider {
        let provider = SqliteProvider::in_memory().unwrap();
        let mut conn = provider.acquire().unwrap();
        conn.execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        provider.release(conn).unwrap();
        provider
    }

    fn count(conn: &mut dyn Connection) -> usize {
        conn.query("SELECT id FROM items", &[]).unwrap().len()
    }

    #[test]
    fn memory_database_outlives_connections() {
        let provider = provider_with_table();

        let mut conn = provider.acquire().unwrap();
        conn.execute(
            "INSERT INTO items (id, name) VALUES (?, ?)",
            &[SqlValue::Integer(1), SqlValue::Text("a".into())],
        )
        .unwrap();
        provider.release(conn).unwrap();

        let mut conn = provider.acquire().unwrap();
        assert_eq!(count(conn.as_mut()), 1);
    }

    #[test]
    fn commit_makes_writes_visible() {
        let provider = provider_with_table();

        let mut writer = provider.acquire().unwrap();
        writer.set_auto_commit(false).unwrap();
        writer
            .execute("INSERT INTO items (name) VALUES (?)", &[SqlValue::Text("x".into())])
            .unwrap();
        writer.commit().unwrap();
        writer.set_auto_commit(true).unwrap();
        provider.release(writer).unwrap();

        let mut reader = provider.acquire().unwrap();
        assert_eq!(count(reader.as_mut()), 1);
    }

    #[test]
    fn rollback_discards_writes() {
        let provider = provider_with_table();

        let mut conn = provider.acquire().unwrap();
        conn.set_auto_commit(false).unwrap();
        conn.execute("INSERT INTO items (name) VALUES ('x')", &[])
            .unwrap();
        conn.rollback().unwrap();
        assert_eq!(count(conn.as_mut()), 0);
        conn.set_auto_commit(true).unwrap();
        assert!(conn.auto_commit());
    }

    #[test]
    fn generated_key_is_returned() {
        let provider = provider_with_table();
        let mut conn = provider.acquire().unwrap();

        let key = conn
            .execute_returning_key("INSERT INTO items (name) VALUES ('x')", &[])
            .unwrap();
        assert_eq!(key, Some(SqlValue::Integer(1)));
    }

    #[test]
    fn closed_connection_rejects_statements() {
        let provider = provider_with_table();
        let mut conn = provider.acquire().unwrap();
        conn.close().unwrap();
        assert!(conn.is_closed());
        assert!(matches!(
            conn.execute("SELECT 1", &[]),
            Err(StorageError::Closed)
        ));
        // closing twice is fine
        conn.close().unwrap();
    }

    #[test]
    fn shutdown_stops_acquire() {
        let provider = SqliteProvider::in_memory().unwrap();
        provider.shutdown().unwrap();
        assert!(matches!(
            provider.acquire(),
            Err(StorageError::ProviderShutDown)
        ));
        provider.shutdown().unwrap();
    }

    #[test]
    fn file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let provider = SqliteProvider::new(ConnectionConfig::file(&path)).unwrap();

        let mut conn = provider.acquire().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER)").unwrap();
        conn.execute("INSERT INTO t (v) VALUES (?)", &[SqlValue::Integer(9)])
            .unwrap();
        provider.release(conn).unwrap();

        let reopened = SqliteProvider::new(ConnectionConfig::file(&path)).unwrap();
        let mut conn = reopened.acquire().unwrap();
        let rows = conn.query("SELECT v FROM t", &[]).unwrap();
        assert_eq!(rows.row(0).unwrap().get("v"), Some(&SqlValue::Integer(9)));
    }

    #[test]
    fn empty_memory_name_is_rejected() {
        let config = ConnectionConfig {
            location: DatabaseLocation::Memory(String::new()),
            ..ConnectionConfig::default()
        };
        assert!(matches!(
            SqliteProvider::new(config),
            Err(StorageError::InvalidConfig(_))
        ));
    }
}
