//! Connection configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// A database file on disk.
    File(PathBuf),
    /// A named in-memory database shared by every connection of one provider.
    Memory(String),
}

/// Configuration for opening connections.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Database location.
    pub location: DatabaseLocation,

    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,

    /// Whether to enforce foreign-key constraints.
    pub foreign_keys: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            location: DatabaseLocation::Memory(format!("relata-{}", uuid::Uuid::new_v4())),
            busy_timeout: Duration::from_secs(5),
            foreign_keys: true,
        }
    }
}

impl ConnectionConfig {
    /// Configuration for a fresh, uniquely named in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Configuration for a database file.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            location: DatabaseLocation::File(path.into()),
            ..Self::default()
        }
    }

    /// Sets the busy timeout.
    #[must_use]
    pub const fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets foreign-key enforcement.
    #[must_use]
    pub const fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// The URI or path handed to the driver.
    #[must_use]
    pub fn open_target(&self) -> String {
        match &self.location {
            DatabaseLocation::File(path) => path.to_string_lossy().into_owned(),
            DatabaseLocation::Memory(name) => format!("file:{name}?mode=memory&cache=shared"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_unique_memory() {
        let a = ConnectionConfig::default();
        let b = ConnectionConfig::default();
        assert!(matches!(a.location, DatabaseLocation::Memory(_)));
        assert_ne!(a.location, b.location);
        assert!(a.foreign_keys);
    }

    #[test]
    fn builder_pattern() {
        let config = ConnectionConfig::file("/tmp/app.db")
            .busy_timeout(Duration::from_millis(10))
            .foreign_keys(false);

        assert_eq!(config.open_target(), "/tmp/app.db");
        assert_eq!(config.busy_timeout, Duration::from_millis(10));
        assert!(!config.foreign_keys);
    }

    #[test]
    fn memory_target_is_shared_cache_uri() {
        let config = ConnectionConfig {
            location: DatabaseLocation::Memory("db1".into()),
            ..ConnectionConfig::default()
        };
        assert_eq!(config.open_target(), "file:db1?mode=memory&cache=shared");
    }
}
