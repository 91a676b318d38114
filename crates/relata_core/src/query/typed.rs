//! Executable typed queries.

use super::parser::Parameter;
use super::translator::TranslatedQuery;
use crate::entity::{Entity, EntityRef};
use crate::error::{CoreError, CoreResult};
use crate::session::EntityManager;
use crate::sql::Statement;
use relata_codec::Value;
use std::collections::HashMap;
use std::marker::PhantomData;

/// A query returning instances of `T`, bound to one session.
///
/// Rows already in the session's identity map come back as the tracked
/// instance; other rows become managed. Pending changes are not flushed
/// before the query runs.
pub struct TypedQuery<'m, T> {
    manager: &'m mut EntityManager,
    query: TranslatedQuery,
    named: HashMap<String, Value>,
    positional: HashMap<u32, Value>,
    _marker: PhantomData<fn() -> T>,
}

impl<'m, T: Entity> TypedQuery<'m, T> {
    pub(crate) fn new(manager: &'m mut EntityManager, query: TranslatedQuery) -> Self {
        Self {
            manager,
            query,
            named: HashMap::new(),
            positional: HashMap::new(),
            _marker: PhantomData,
        }
    }

    /// The generated SQL.
    #[must_use]
    pub fn sql(&self) -> &str {
        self.query.sql()
    }

    /// Binds `:name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the query has no such
    /// parameter.
    pub fn set_parameter(
        &mut self,
        name: &str,
        value: impl Into<Value>,
    ) -> CoreResult<&mut Self> {
        let parameter = Parameter::Named(name.to_string());
        self.expect_parameter(&parameter)?;
        self.named.insert(name.to_string(), value.into());
        Ok(self)
    }

    /// Binds `?position`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] if the query has no such
    /// parameter.
    pub fn set_positional(
        &mut self,
        position: u32,
        value: impl Into<Value>,
    ) -> CoreResult<&mut Self> {
        self.expect_parameter(&Parameter::Positional(position))?;
        self.positional.insert(position, value.into());
        Ok(self)
    }

    /// Runs the query inside the session's active transaction.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Query`] if a parameter is unbound
    /// - [`CoreError::IllegalState`] if no transaction is active
    /// - [`CoreError::PersistenceIo`] if the statement fails
    pub fn result_list(&mut self) -> CoreResult<Vec<EntityRef<T>>> {
        let statement = self.bind()?;
        let rows = self.manager.run_query(&statement)?;
        let metadata = std::sync::Arc::clone(self.query.metadata());
        self.manager.materialize::<T>(&metadata, &rows)
    }

    /// Runs the query and returns its only result.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Query`] if there is no result or more than one,
    /// or any error of [`result_list`](Self::result_list).
    pub fn single_result(&mut self) -> CoreResult<EntityRef<T>> {
        let mut results = self.result_list()?;
        match results.len() {
            1 => Ok(results.remove(0)),
            0 => Err(CoreError::query("no result found")),
            n => Err(CoreError::query(format!("non-unique result: {n} rows"))),
        }
    }

    fn expect_parameter(&self, parameter: &Parameter) -> CoreResult<()> {
        if self.query.parameter_order().contains(parameter) {
            Ok(())
        } else {
            Err(CoreError::invalid_argument(format!(
                "query has no parameter {parameter}"
            )))
        }
    }

    fn bind(&self) -> CoreResult<Statement> {
        let values = self
            .query
            .parameter_order()
            .iter()
            .map(|parameter| {
                let bound = match parameter {
                    Parameter::Named(name) => self.named.get(name),
                    Parameter::Positional(position) => self.positional.get(position),
                };
                bound
                    .cloned()
                    .ok_or_else(|| CoreError::query(format!("parameter {parameter} is not bound")))
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Statement::new(self.query.sql(), values))
    }
}

impl<T> std::fmt::Debug for TypedQuery<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedQuery")
            .field("sql", &self.query.sql())
            .field("named", &self.named)
            .field("positional", &self.positional)
            .finish_non_exhaustive()
    }
}
