//! Counting and fault-injecting provider wrapper.

use crate::connection::{Connection, ResultSet};
use crate::error::{StorageError, StorageResult};
use crate::provider::ConnectionProvider;
use parking_lot::Mutex;
use relata_codec::SqlValue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Failures an [`InstrumentedProvider`] injects on demand.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Fail every `acquire`.
    pub fail_acquire: bool,
    /// Fail every `commit`.
    pub fail_commit: bool,
    /// Fail every `rollback`.
    pub fail_rollback: bool,
    /// Fail any statement whose SQL contains this fragment.
    pub fail_statement_containing: Option<String>,
}

#[derive(Default)]
struct Shared {
    acquired: AtomicUsize,
    released: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    faults: Mutex<FaultPlan>,
    statements: Mutex<Vec<String>>,
}

impl Shared {
    fn before_statement(&self, sql: &str) -> StorageResult<()> {
        self.statements.lock().push(sql.to_string());
        match &self.faults.lock().fail_statement_containing {
            Some(fragment) if sql.contains(fragment.as_str()) => {
                Err(StorageError::injected(format!("statement failed: {sql}")))
            }
            _ => Ok(()),
        }
    }
}

/// Wraps another provider and records how it is used.
///
/// Every connection handed out is wrapped so that statements, commits and
/// rollbacks are counted and can be made to fail. Clones share counters and
/// the fault plan.
#[derive(Clone)]
pub struct InstrumentedProvider {
    inner: Arc<dyn ConnectionProvider>,
    shared: Arc<Shared>,
}

impl InstrumentedProvider {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn ConnectionProvider>) -> Self {
        Self {
            inner,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Number of successful acquires.
    #[must_use]
    pub fn acquire_count(&self) -> usize {
        self.shared.acquired.load(Ordering::SeqCst)
    }

    /// Number of releases.
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.shared.released.load(Ordering::SeqCst)
    }

    /// Connections acquired and not yet released.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.acquire_count().saturating_sub(self.release_count())
    }

    /// Number of commits attempted.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.shared.commits.load(Ordering::SeqCst)
    }

    /// Number of rollbacks attempted.
    #[must_use]
    pub fn rollback_count(&self) -> usize {
        self.shared.rollbacks.load(Ordering::SeqCst)
    }

    /// SQL of every statement attempted so far, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.shared.statements.lock().clone()
    }

    /// Statements whose SQL starts with `prefix` (ASCII case-insensitive).
    #[must_use]
    pub fn statements_starting_with(&self, prefix: &str) -> Vec<String> {
        self.shared
            .statements
            .lock()
            .iter()
            .filter(|sql| {
                sql.get(..prefix.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
            })
            .cloned()
            .collect()
    }

    /// Forgets recorded statements.
    pub fn clear_statements(&self) {
        self.shared.statements.lock().clear();
    }

    /// Replaces the fault plan.
    pub fn set_faults(&self, plan: FaultPlan) {
        *self.shared.faults.lock() = plan;
    }

    /// Makes `acquire` fail or succeed.
    pub fn fail_acquire(&self, fail: bool) {
        self.shared.faults.lock().fail_acquire = fail;
    }

    /// Makes `commit` fail or succeed.
    pub fn fail_commit(&self, fail: bool) {
        self.shared.faults.lock().fail_commit = fail;
    }

    /// Makes `rollback` fail or succeed.
    pub fn fail_rollback(&self, fail: bool) {
        self.shared.faults.lock().fail_rollback = fail;
    }

    /// Makes statements containing `fragment` fail. `None` clears it.
    pub fn fail_statements_containing(&self, fragment: Option<&str>) {
        self.shared.faults.lock().fail_statement_containing = fragment.map(str::to_string);
    }
}

impl ConnectionProvider for InstrumentedProvider {
    fn acquire(&self) -> StorageResult<Box<dyn Connection>> {
        if self.shared.faults.lock().fail_acquire {
            return Err(StorageError::injected("acquire failed"));
        }
        let inner = self.inner.acquire()?;
        self.shared.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InstrumentedConnection {
            inner,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn release(&self, mut connection: Box<dyn Connection>) -> StorageResult<()> {
        self.shared.released.fetch_add(1, Ordering::SeqCst);
        connection.close()
    }

    fn supports_aggressive_release(&self) -> bool {
        self.inner.supports_aggressive_release()
    }

    fn shutdown(&self) -> StorageResult<()> {
        self.inner.shutdown()
    }
}

impl std::fmt::Debug for InstrumentedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedProvider")
            .field("acquired", &self.acquire_count())
            .field("released", &self.release_count())
            .field("faults", &*self.shared.faults.lock())
            .finish_non_exhaustive()
    }
}

struct InstrumentedConnection {
    inner: Box<dyn Connection>,
    shared: Arc<Shared>,
}

impl Connection for InstrumentedConnection {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> StorageResult<u64> {
        self.shared.before_statement(sql)?;
        self.inner.execute(sql, params)
    }

    fn execute_returning_key(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> StorageResult<Option<SqlValue>> {
        self.shared.before_statement(sql)?;
        self.inner.execute_returning_key(sql, params)
    }

    fn query(&mut self, sql: &str, params: &[SqlValue]) -> StorageResult<ResultSet> {
        self.shared.before_statement(sql)?;
        self.inner.query(sql, params)
    }

    fn execute_batch(&mut self, sql: &str) -> StorageResult<()> {
        self.shared.before_statement(sql)?;
        self.inner.execute_batch(sql)
    }

    fn auto_commit(&self) -> bool {
        self.inner.auto_commit()
    }

    fn set_auto_commit(&mut self, enabled: bool) -> StorageResult<()> {
        self.inner.set_auto_commit(enabled)
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.shared.commits.fetch_add(1, Ordering::SeqCst);
        if self.shared.faults.lock().fail_commit {
            return Err(StorageError::injected("commit failed"));
        }
        self.inner.commit()
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.shared.rollbacks.fetch_add(1, Ordering::SeqCst);
        if self.shared.faults.lock().fail_rollback {
            return Err(StorageError::injected("rollback failed"));
        }
        self.inner.rollback()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn close(&mut self) -> StorageResult<()> {
        self.inner.close()
    }
}
