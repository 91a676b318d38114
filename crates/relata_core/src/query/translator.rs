//! Translation of parsed queries to SQL.

use super::parser::{Parameter, SelectStatement};
use crate::error::{CoreError, CoreResult};
use crate::metadata::{EntityMetadata, MetadataRegistry};
use crate::sql::{SqlBuilder, WhereClause};
use std::sync::Arc;

/// SQL ready to bind, with the parameter each placeholder takes.
#[derive(Debug, Clone)]
pub struct TranslatedQuery {
    metadata: Arc<EntityMetadata>,
    sql: String,
    parameter_order: Vec<Parameter>,
}

impl TranslatedQuery {
    /// Descriptor of the selected entity.
    #[must_use]
    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    /// Generated SQL.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameter bound to each `?`, in placeholder order.
    #[must_use]
    pub fn parameter_order(&self) -> &[Parameter] {
        &self.parameter_order
    }
}

/// Maps entity and field names to tables and columns.
pub struct QueryTranslator<'r> {
    registry: &'r MetadataRegistry,
}

impl<'r> QueryTranslator<'r> {
    /// Creates a translator resolving names through `registry`.
    #[must_use]
    pub fn new(registry: &'r MetadataRegistry) -> Self {
        Self { registry }
    }

    /// Translates `statement`.
    ///
    /// The select list is the identifier followed by every attribute column.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Query`] if the entity or a field is unknown.
    pub fn translate(&self, statement: &SelectStatement) -> CoreResult<TranslatedQuery> {
        let metadata = self
            .registry
            .get_by_name(&statement.entity_name)
            .map_err(|_| CoreError::query(format!("unknown entity {}", statement.entity_name)))?;

        let mut filter = WhereClause::new();
        let mut parameter_order = Vec::with_capacity(statement.conditions.len());
        for condition in &statement.conditions {
            let column = metadata.column_for_field(&condition.field).ok_or_else(|| {
                CoreError::query(format!(
                    "{} has no field {}",
                    metadata.entity_name(),
                    condition.field
                ))
            })?;
            filter = filter.and(column, condition.op);
            parameter_order.push(condition.parameter.clone());
        }

        let sql = SqlBuilder::select(
            &metadata.qualified_table_name(),
            &metadata.select_columns(),
            &filter,
        );
        Ok(TranslatedQuery {
            metadata,
            sql,
            parameter_order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::query::QueryParser;
    use relata_codec::AttributeType;

    #[derive(Default)]
    struct Member {
        id: i64,
        name: String,
        age: i64,
    }

    impl Entity for Member {
        fn metadata() -> CoreResult<EntityMetadata> {
            EntityMetadata::builder::<Member>("Member")
                .table("members")
                .id("id", AttributeType::Integer, |m| m.id.into(), |m, v| {
                    m.id = v.into_typed()?;
                    Ok(())
                })
                .attribute("name", AttributeType::Text, |m| m.name.clone().into(), |m, v| {
                    m.name = v.into_typed()?;
                    Ok(())
                })
                .column("full_name")
                .attribute("age", AttributeType::Integer, |m| m.age.into(), |m, v| {
                    m.age = v.into_typed()?;
                    Ok(())
                })
                .build()
        }
    }

    fn registry() -> MetadataRegistry {
        let registry = MetadataRegistry::new();
        registry.register::<Member>().unwrap();
        registry
    }

    fn translate(text: &str) -> CoreResult<TranslatedQuery> {
        let registry = registry();
        QueryTranslator::new(&registry).translate(&QueryParser::parse(text)?)
    }

    #[test]
    fn maps_fields_to_columns() {
        let query = translate("SELECT m FROM Member m WHERE m.name = :n AND m.age > ?1").unwrap();
        assert_eq!(
            query.sql(),
            "SELECT id, full_name, age FROM members WHERE full_name = ? AND age > ?"
        );
        assert_eq!(
            query.parameter_order(),
            &[Parameter::Named("n".into()), Parameter::Positional(1)]
        );
    }

    #[test]
    fn identifier_field_is_queryable() {
        let query = translate("SELECT m FROM Member m WHERE id = :id").unwrap();
        assert!(query.sql().ends_with("WHERE id = ?"));
    }

    #[test]
    fn unknown_names_are_query_errors() {
        assert!(matches!(
            translate("SELECT t FROM Team t"),
            Err(CoreError::Query { .. })
        ));
        assert!(matches!(
            translate("SELECT m FROM Member m WHERE m.email = :e"),
            Err(CoreError::Query { .. })
        ));
    }
}
