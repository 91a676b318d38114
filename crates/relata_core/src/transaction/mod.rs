//! Transaction coordination.
//!
//! A [`TransactionCoordinator`] owns the connection of one unit of work:
//! - **begin** acquires a connection and turns auto-commit off
//! - **commit** and **rollback** end the transaction and always hand the
//!   connection back to its provider exactly once

mod coordinator;
mod state;

pub use coordinator::{ClearCallback, FlushCallback, TransactionCoordinator};
pub use state::TransactionStatus;
