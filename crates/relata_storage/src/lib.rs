//! # Relata Storage
//!
//! Connection and connection-provider abstractions for Relata.
//!
//! This crate provides the lowest layer of Relata. Connections are
//! **untyped statement pipes** - they execute SQL with positional parameters
//! and return materialised rows, without knowing anything about entities.
//!
//! ## Design Principles
//!
//! - A [`ConnectionProvider`] hands out one [`Connection`] per transaction
//! - Providers are `Send + Sync`; connections are `Send`
//! - Relata generates all SQL; the driver only executes it
//!
//! ## Available Providers
//!
//! - [`SqliteProvider`] - File or shared in-memory SQLite databases
//! - [`InstrumentedProvider`] - Wrapper that counts usage and injects faults
//!
//! ## Example
//!
//! ```rust
//! use relata_storage::{Connection, ConnectionProvider, SqliteProvider};
//! use relata_codec::SqlValue;
//!
//! let provider = SqliteProvider::in_memory().unwrap();
//! let mut conn = provider.acquire().unwrap();
//! conn.execute_batch("CREATE TABLE t (v INTEGER)").unwrap();
//! conn.execute("INSERT INTO t (v) VALUES (?)", &[SqlValue::Integer(1)]).unwrap();
//! let rows = conn.query("SELECT v FROM t", &[]).unwrap();
//! assert_eq!(rows.len(), 1);
//! provider.release(conn).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connection;
mod error;
mod instrumented;
mod provider;
mod sqlite;

pub use config::{ConnectionConfig, DatabaseLocation};
pub use connection::{Connection, ResultSet, Row};
pub use error::{StorageError, StorageResult};
pub use instrumented::{FaultPlan, InstrumentedProvider};
pub use provider::ConnectionProvider;
pub use sqlite::{SqliteConnection, SqliteProvider};
