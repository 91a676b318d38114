//! Connection provider trait definition.

use crate::connection::Connection;
use crate::error::StorageResult;

/// Supplies and reclaims raw connections.
///
/// Providers are shared across sessions and must be `Send + Sync`. A
/// transaction acquires exactly one connection on begin and hands it back
/// exactly once when it ends, whatever the outcome.
///
/// # Implementors
///
/// - [`super::SqliteProvider`] - File or shared in-memory SQLite databases
/// - [`super::InstrumentedProvider`] - Counting and fault-injecting wrapper for tests
pub trait ConnectionProvider: Send + Sync {
    /// Opens or checks out a connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is shut down or the driver cannot
    /// open a connection.
    fn acquire(&self) -> StorageResult<Box<dyn Connection>>;

    /// Returns a connection to the provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection could not be closed cleanly. The
    /// connection is consumed either way.
    fn release(&self, connection: Box<dyn Connection>) -> StorageResult<()>;

    /// Whether connections may be released between statements.
    ///
    /// Providers without pooling return `false`.
    fn supports_aggressive_release(&self) -> bool {
        false
    }

    /// Stops handing out connections and frees provider-held resources.
    fn shutdown(&self) -> StorageResult<()>;
}
