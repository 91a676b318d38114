//! Transaction status.

use std::fmt;

/// Status of a transaction.
///
/// `NotActive -> Active -> Committed | RolledBack`. Both end states are
/// terminal; a new coordinator is needed for the next unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionStatus {
    /// Not begun yet.
    #[default]
    NotActive,
    /// Begun; holds a connection.
    Active,
    /// Committed.
    Committed,
    /// Rolled back.
    RolledBack,
}

impl TransactionStatus {
    /// Returns true for `Committed` and `RolledBack`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TransactionStatus::Committed | TransactionStatus::RolledBack)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::NotActive => write!(f, "NOT_ACTIVE"),
            TransactionStatus::Active => write!(f, "ACTIVE"),
            TransactionStatus::Committed => write!(f, "COMMITTED"),
            TransactionStatus::RolledBack => write!(f, "ROLLED_BACK"),
        }
    }
}
