//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur at the connection layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The SQLite driver reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The connection has already been closed.
    #[error("connection is closed")]
    Closed,

    /// The provider has been shut down and hands out no more connections.
    #[error("connection provider is shut down")]
    ProviderShutDown,

    /// The connection configuration is unusable.
    #[error("invalid connection configuration: {0}")]
    InvalidConfig(String),

    /// A failure deliberately injected by an instrumented provider.
    #[error("injected fault: {0}")]
    InjectedFault(String),
}

impl StorageError {
    /// Creates an injected fault error.
    pub fn injected(message: impl Into<String>) -> Self {
        Self::InjectedFault(message.into())
    }
}
