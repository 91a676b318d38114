//! Transaction state machine.

use super::state::TransactionStatus;
use crate::error::{CoreError, CoreResult};
use relata_storage::{Connection, ConnectionProvider};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Drains pending writes onto the transaction's connection.
pub type FlushCallback = Box<dyn FnMut(&mut dyn Connection) -> CoreResult<()> + Send>;

/// Resets session state once a transaction has ended.
pub type ClearCallback = Box<dyn FnMut() + Send>;

/// Owns the connection and status of one transaction.
///
/// The coordinator only moves between states and manages the connection.
/// The owning session decides when to run the flush and clear callbacks.
pub struct TransactionCoordinator {
    provider: Arc<dyn ConnectionProvider>,
    connection: Option<Box<dyn Connection>>,
    status: TransactionStatus,
    flush_callback: Option<FlushCallback>,
    clear_callback: Option<ClearCallback>,
}

impl TransactionCoordinator {
    /// Creates a coordinator that draws connections from `provider`.
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            provider,
            connection: None,
            status: TransactionStatus::NotActive,
            flush_callback: None,
            clear_callback: None,
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Returns true while the transaction is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    /// Acquires a connection and starts the transaction.
    ///
    /// # Errors
    ///
    /// - [`CoreError::IllegalState`] unless the status is `NotActive`
    /// - [`CoreError::Transaction`] if no connection could be acquired or
    ///   auto-commit could not be disabled; the status stays `NotActive`
    pub fn begin(&mut self) -> CoreResult<()> {
        if self.status != TransactionStatus::NotActive {
            return Err(CoreError::illegal_state(format!(
                "cannot begin a transaction that is {}",
                self.status
            )));
        }

        let mut conn = self
            .provider
            .acquire()
            .map_err(|e| CoreError::transaction("failed to acquire connection", e))?;
        if let Err(e) = conn.set_auto_commit(false) {
            self.release(conn, false);
            return Err(CoreError::transaction("failed to disable auto-commit", e));
        }

        self.connection = Some(conn);
        self.status = TransactionStatus::Active;
        debug!("transaction begun");
        Ok(())
    }

    /// Commits the transaction.
    ///
    /// If the commit fails, one rollback is attempted, the status becomes
    /// `RolledBack` and the commit failure is returned. The connection is
    /// released in every case.
    ///
    /// # Errors
    ///
    /// - [`CoreError::IllegalState`] unless active
    /// - [`CoreError::Transaction`] if the commit failed
    pub fn commit(&mut self) -> CoreResult<()> {
        let mut conn = self.take_active_connection("commit")?;

        match conn.commit() {
            Ok(()) => {
                self.status = TransactionStatus::Committed;
                self.release(conn, true);
                debug!("transaction committed");
                Ok(())
            }
            Err(commit_err) => {
                error!(error = %commit_err, "commit failed, rolling back");
                let rolled_back = match conn.rollback() {
                    Ok(()) => true,
                    Err(rollback_err) => {
                        error!(error = %rollback_err, "rollback after failed commit failed");
                        false
                    }
                };
                self.status = TransactionStatus::RolledBack;
                self.release(conn, rolled_back);
                Err(CoreError::transaction("commit failed", commit_err))
            }
        }
    }

    /// Rolls the transaction back.
    ///
    /// Calling this on a transaction that is not active does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transaction`] if the driver rollback failed. The
    /// status is `RolledBack` and the connection is released regardless.
    pub fn rollback(&mut self) -> CoreResult<()> {
        if self.status != TransactionStatus::Active {
            warn!(status = %self.status, "rollback ignored: transaction not active");
            return Ok(());
        }
        let mut conn = self.take_active_connection("rollback")?;

        let result = conn.rollback();
        self.status = TransactionStatus::RolledBack;
        self.release(conn, result.is_ok());
        match result {
            Ok(()) => {
                debug!("transaction rolled back");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "rollback failed");
                Err(CoreError::transaction("rollback failed", e))
            }
        }
    }

    /// The transaction's connection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalState`] unless active.
    pub fn connection(&mut self) -> CoreResult<&mut dyn Connection> {
        if self.status != TransactionStatus::Active {
            return Err(self.not_active("use the connection of"));
        }
        match self.connection.as_deref_mut() {
            Some(conn) => Ok(conn),
            None => Err(CoreError::illegal_state("active transaction has no connection")),
        }
    }

    /// Registers the flush callback.
    pub fn set_flush_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&mut dyn Connection) -> CoreResult<()> + Send + 'static,
    {
        self.flush_callback = Some(Box::new(callback));
    }

    /// Registers the clear callback.
    pub fn set_clear_callback<F>(&mut self, callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.clear_callback = Some(Box::new(callback));
    }

    /// Runs the flush callback on the active connection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IllegalState`] unless active, or the callback's
    /// error.
    pub fn invoke_flush(&mut self) -> CoreResult<()> {
        if self.status != TransactionStatus::Active {
            return Err(self.not_active("flush"));
        }
        match (self.connection.as_deref_mut(), self.flush_callback.as_mut()) {
            (Some(conn), Some(callback)) => callback(conn),
            (Some(_), None) => Ok(()),
            (None, _) => Err(CoreError::illegal_state("active transaction has no connection")),
        }
    }

    /// Runs the clear callback, if one is registered.
    pub fn invoke_clear(&mut self) {
        if let Some(callback) = self.clear_callback.as_mut() {
            callback();
        }
    }

    fn take_active_connection(&mut self, action: &str) -> CoreResult<Box<dyn Connection>> {
        if self.status != TransactionStatus::Active {
            return Err(self.not_active(action));
        }
        self.connection
            .take()
            .ok_or_else(|| self.not_active(action))
    }

    fn not_active(&self, action: &str) -> CoreError {
        CoreError::illegal_state(format!(
            "cannot {action} a transaction that is {}",
            self.status
        ))
    }

    /// Hands `conn` back to the provider. Auto-commit is restored only after
    /// a clean end, so a failed rollback never commits leftovers.
    fn release(&self, mut conn: Box<dyn Connection>, restore_auto_commit: bool) {
        if restore_auto_commit {
            if let Err(e) = conn.set_auto_commit(true) {
                warn!(error = %e, "failed to restore auto-commit");
            }
        }
        match self.provider.release(conn) {
            Ok(()) => debug!("connection released"),
            Err(e) => warn!(error = %e, "failed to release connection"),
        }
    }
}

impl Drop for TransactionCoordinator {
    fn drop(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            warn!("transaction dropped while active, rolling back");
            let rolled_back = conn.rollback().is_ok();
            self.status = TransactionStatus::RolledBack;
            self.release(conn, rolled_back);
        }
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("status", &self.status)
            .field("has_connection", &self.connection.is_some())
            .field("flush_callback", &self.flush_callback.is_some())
            .field("clear_callback", &self.clear_callback.is_some())
            .finish()
    }
}
