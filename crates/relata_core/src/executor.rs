//! Statement execution against raw connections.

use crate::error::{CoreError, CoreResult};
use crate::sql::Statement;
use relata_codec::{AttributeType, CodecRegistry, SqlValue, Value};
use relata_storage::{Connection, ResultSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// Runs generated statements on a connection.
///
/// Implementations encode parameters, execute, and report driver failures
/// as [`CoreError::PersistenceIo`].
pub trait StatementExecutor: Send + Sync {
    /// Executes an INSERT, UPDATE or DELETE and returns the affected rows.
    fn execute_update(&self, conn: &mut dyn Connection, statement: &Statement) -> CoreResult<u64>;

    /// Executes an INSERT and returns the key the database generated.
    fn execute_insert(
        &self,
        conn: &mut dyn Connection,
        statement: &Statement,
    ) -> CoreResult<Option<Value>>;

    /// Executes a SELECT.
    fn execute_query(
        &self,
        conn: &mut dyn Connection,
        statement: &Statement,
    ) -> CoreResult<ResultSet>;

    /// Decodes one column value read back from the database.
    fn decode(&self, attribute_type: AttributeType, column: SqlValue) -> CoreResult<Value>;
}

/// [`StatementExecutor`] backed by a [`CodecRegistry`].
#[derive(Debug, Clone)]
pub struct SqlExecutor {
    codecs: Arc<CodecRegistry>,
    log_sql: bool,
}

impl SqlExecutor {
    /// Creates an executor using `codecs`.
    #[must_use]
    pub fn new(codecs: Arc<CodecRegistry>) -> Self {
        Self {
            codecs,
            log_sql: false,
        }
    }

    /// Logs every statement at debug level instead of trace.
    #[must_use]
    pub fn with_sql_logging(mut self, enabled: bool) -> Self {
        self.log_sql = enabled;
        self
    }

    /// The codec registry.
    #[must_use]
    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.codecs
    }

    fn prepare(&self, statement: &Statement) -> CoreResult<Vec<SqlValue>> {
        let params = self.codecs.encode_all(statement.parameters())?;
        if self.log_sql {
            debug!(sql = statement.sql(), params = params.len(), "executing statement");
        } else {
            trace!(sql = statement.sql(), params = params.len(), "executing statement");
        }
        Ok(params)
    }
}

fn generated_key(column: SqlValue) -> Option<Value> {
    match column {
        SqlValue::Null => None,
        SqlValue::Integer(n) => Some(Value::Integer(n)),
        SqlValue::Real(n) => Some(Value::Real(n)),
        SqlValue::Text(s) => Some(Value::Text(s)),
        SqlValue::Blob(b) => Some(Value::Bytes(b)),
    }
}

impl StatementExecutor for SqlExecutor {
    fn execute_update(&self, conn: &mut dyn Connection, statement: &Statement) -> CoreResult<u64> {
        let params = self.prepare(statement)?;
        conn.execute(statement.sql(), &params)
            .map_err(|e| CoreError::persistence_io(statement.sql(), e))
    }

    fn execute_insert(
        &self,
        conn: &mut dyn Connection,
        statement: &Statement,
    ) -> CoreResult<Option<Value>> {
        let params = self.prepare(statement)?;
        let key = conn
            .execute_returning_key(statement.sql(), &params)
            .map_err(|e| CoreError::persistence_io(statement.sql(), e))?;
        Ok(key.and_then(generated_key))
    }

    fn execute_query(
        &self,
        conn: &mut dyn Connection,
        statement: &Statement,
    ) -> CoreResult<ResultSet> {
        let params = self.prepare(statement)?;
        conn.query(statement.sql(), &params)
            .map_err(|e| CoreError::persistence_io(statement.sql(), e))
    }

    fn decode(&self, attribute_type: AttributeType, column: SqlValue) -> CoreResult<Value> {
        Ok(self.codecs.decode(attribute_type, column)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relata_storage::{ConnectionProvider, SqliteProvider};

    fn setup() -> (SqliteProvider, Box<dyn Connection>, SqlExecutor) {
        let provider = SqliteProvider::in_memory().unwrap();
        let mut conn = provider.acquire().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, flag INTEGER, name TEXT)")
            .unwrap();
        let executor = SqlExecutor::new(Arc::new(CodecRegistry::new()));
        (provider, conn, executor)
    }

    #[test]
    fn parameters_are_encoded() {
        let (_provider, mut conn, executor) = setup();
        let insert = Statement::new(
            "INSERT INTO t (id, flag, name) VALUES (?, ?, ?)",
            vec![Value::Integer(1), Value::Bool(true), Value::Null],
        );
        assert_eq!(executor.execute_update(conn.as_mut(), &insert).unwrap(), 1);

        let rows = executor
            .execute_query(
                conn.as_mut(),
                &Statement::new("SELECT flag, name FROM t WHERE id = ?", vec![Value::Integer(1)]),
            )
            .unwrap();
        let row = rows.row(0).unwrap();
        assert_eq!(row.get("flag"), Some(&SqlValue::Integer(1)));
        assert_eq!(row.get("name"), Some(&SqlValue::Null));
    }

    #[test]
    fn insert_reports_generated_key() {
        let (_provider, mut conn, executor) = setup();
        let insert = Statement::new("INSERT INTO t (name) VALUES (?)", vec!["a".into()]);
        assert_eq!(
            executor.execute_insert(conn.as_mut(), &insert).unwrap(),
            Some(Value::Integer(1))
        );
        assert_eq!(
            executor.execute_insert(conn.as_mut(), &insert).unwrap(),
            Some(Value::Integer(2))
        );
    }

    #[test]
    fn driver_failure_carries_sql() {
        let (_provider, mut conn, executor) = setup();
        let bad = Statement::new("UPDATE missing SET x = ?", vec![Value::Integer(1)]);
        match executor.execute_update(conn.as_mut(), &bad) {
            Err(CoreError::PersistenceIo { sql, .. }) => assert_eq!(sql, "UPDATE missing SET x = ?"),
            other => panic!("expected PersistenceIo, got {other:?}"),
        }
    }

    #[test]
    fn decode_uses_codecs() {
        let executor = SqlExecutor::new(Arc::new(CodecRegistry::new()));
        assert_eq!(
            executor
                .decode(AttributeType::Bool, SqlValue::Integer(0))
                .unwrap(),
            Value::Bool(false)
        );
    }
}
