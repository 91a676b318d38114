//! Raw connection trait and result sets.

use crate::error::StorageResult;
use relata_codec::SqlValue;

/// A raw database connection.
///
/// Connections are **untyped statement pipes**: they execute SQL with
/// positional `?` parameters already encoded as [`SqlValue`]s. Relata owns
/// statement generation and value conversion; connections only move bytes.
///
/// # Auto-commit
///
/// A fresh connection is in auto-commit mode. Turning auto-commit off opens a
/// transaction; while it stays off, `commit` and `rollback` end the current
/// transaction and immediately open the next one. Turning auto-commit back on
/// commits whatever is pending.
///
/// # Invariants
///
/// - Once `close` succeeds, every other operation returns
///   [`StorageError::Closed`](crate::StorageError::Closed)
/// - `close` on a closed connection is a no-op
pub trait Connection: Send {
    /// Executes a statement and returns the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> StorageResult<u64>;

    /// Executes an INSERT and returns the key the database generated for the
    /// new row, if any.
    fn execute_returning_key(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> StorageResult<Option<SqlValue>>;

    /// Runs a query and collects every row.
    fn query(&mut self, sql: &str, params: &[SqlValue]) -> StorageResult<ResultSet>;

    /// Executes one or more parameterless statements, e.g. DDL.
    fn execute_batch(&mut self, sql: &str) -> StorageResult<()>;

    /// Returns whether auto-commit is on.
    fn auto_commit(&self) -> bool;

    /// Switches auto-commit on or off.
    fn set_auto_commit(&mut self, enabled: bool) -> StorageResult<()>;

    /// Commits the current transaction.
    fn commit(&mut self) -> StorageResult<()>;

    /// Rolls back the current transaction.
    fn rollback(&mut self) -> StorageResult<()>;

    /// Returns whether the connection has been closed.
    fn is_closed(&self) -> bool;

    /// Closes the connection.
    fn close(&mut self) -> StorageResult<()>;
}

/// Rows returned by a query, fully materialised.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<String>,
    rows: Vec<Vec<SqlValue>>,
}

impl ResultSet {
    /// Creates a result set from column names and rows.
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    /// Column names in select order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the query produced no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the row at `index`.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// Iterates over the rows.
    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }
}

/// A borrowed view of one result row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [SqlValue],
}

impl<'a> Row<'a> {
    /// Returns the value of the named column (ASCII case-insensitive).
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&'a SqlValue> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|i| self.values.get(i))
    }

    /// Returns the value at a column index.
    #[must_use]
    pub fn get_index(&self, index: usize) -> Option<&'a SqlValue> {
        self.values.get(index)
    }

    /// All values in select order.
    #[must_use]
    pub fn values(&self) -> &'a [SqlValue] {
        self.values
    }
}
