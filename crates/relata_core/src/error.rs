//! Error types for Relata core.

use relata_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Relata core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Value codec error.
    #[error("codec error: {0}")]
    Codec(#[from] relata_codec::CodecError),

    /// The entity is not tracked by the persistence context.
    #[error("entity not managed: {entity}")]
    NotManaged {
        /// Description of the entity.
        entity: String,
    },

    /// Illegal entity status transition.
    #[error("invalid entity state: {message}")]
    InvalidState {
        /// Description of the transition.
        message: String,
    },

    /// Transaction or session used in the wrong lifecycle state.
    #[error("illegal state: {message}")]
    IllegalState {
        /// Description of the misuse.
        message: String,
    },

    /// Another instance is already tracked under the same key.
    #[error("duplicate identity: {key}")]
    DuplicateIdentity {
        /// The colliding key.
        key: String,
    },

    /// An entity key could not be formed.
    #[error("invalid entity key: {message}")]
    InvalidKey {
        /// Why the key is invalid.
        message: String,
    },

    /// Begin, commit or rollback failed at the driver.
    #[error("transaction error: {message}")]
    Transaction {
        /// What the transaction was doing.
        message: String,
        /// Underlying driver failure.
        #[source]
        source: StorageError,
    },

    /// A statement failed to execute.
    #[error("statement failed: {sql}")]
    PersistenceIo {
        /// The statement text.
        sql: String,
        /// Underlying driver failure.
        #[source]
        source: StorageError,
    },

    /// An argument was rejected.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// No metadata registered for the entity.
    #[error("no metadata registered for {entity}")]
    MetadataNotFound {
        /// Entity type or name.
        entity: String,
    },

    /// Metadata declaration is inconsistent.
    #[error("invalid metadata: {message}")]
    InvalidMetadata {
        /// Description of the problem.
        message: String,
    },

    /// Query text could not be parsed, translated or bound.
    #[error("query error: {message}")]
    Query {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a not managed error.
    pub fn not_managed(entity: impl Into<String>) -> Self {
        Self::NotManaged {
            entity: entity.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Creates a duplicate identity error.
    pub fn duplicate_identity(key: impl std::fmt::Display) -> Self {
        Self::DuplicateIdentity {
            key: key.to_string(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates a transaction error.
    pub fn transaction(message: impl Into<String>, source: StorageError) -> Self {
        Self::Transaction {
            message: message.into(),
            source,
        }
    }

    /// Creates a persistence I/O error.
    pub fn persistence_io(sql: impl Into<String>, source: StorageError) -> Self {
        Self::PersistenceIo {
            sql: sql.into(),
            source,
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a metadata not found error.
    pub fn metadata_not_found(entity: impl Into<String>) -> Self {
        Self::MetadataNotFound {
            entity: entity.into(),
        }
    }

    /// Creates an invalid metadata error.
    pub fn invalid_metadata(message: impl Into<String>) -> Self {
        Self::InvalidMetadata {
            message: message.into(),
        }
    }

    /// Creates a query error.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}
