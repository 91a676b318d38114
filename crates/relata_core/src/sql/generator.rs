//! Statements derived from entity metadata.

use super::builder::{SqlBuilder, WhereClause};
use super::Statement;
use crate::error::CoreResult;
use crate::metadata::{EntityMetadata, IdGeneration};
use relata_codec::Value;
use std::any::Any;

/// INSERT for `entity`.
///
/// The identifier column is left out when the database generates it and the
/// entity has none yet. Attributes that are not insertable are left out.
pub fn insert_statement(metadata: &EntityMetadata, entity: &dyn Any) -> CoreResult<Statement> {
    let identifier = metadata.identifier();
    let id = identifier.get_value(entity)?;

    let mut columns = Vec::with_capacity(metadata.attributes().len() + 1);
    let mut parameters = Vec::with_capacity(columns.capacity());
    if !(identifier.generation() == IdGeneration::Generated && id.is_null()) {
        columns.push(identifier.column_name());
        parameters.push(id);
    }
    for attribute in metadata.attributes().iter().filter(|a| a.is_insertable()) {
        columns.push(attribute.column_name());
        parameters.push(attribute.get_value(entity)?);
    }

    Ok(Statement::new(
        SqlBuilder::insert(&metadata.qualified_table_name(), &columns),
        parameters,
    ))
}

/// UPDATE of every updatable attribute, addressed by `id`.
///
/// `id` is the identifier the row is tracked under, which may differ from
/// the one the entity currently holds. Returns `None` when the entity has
/// no updatable attribute.
pub fn update_statement(
    metadata: &EntityMetadata,
    entity: &dyn Any,
    id: Value,
) -> CoreResult<Option<Statement>> {
    let columns: Vec<&str> = metadata
        .attributes()
        .iter()
        .filter(|a| a.is_updatable())
        .map(|a| a.column_name())
        .collect();
    if columns.is_empty() {
        return Ok(None);
    }

    let filter = WhereClause::new().column_eq(metadata.identifier().column_name());
    let sql = SqlBuilder::update(&metadata.qualified_table_name(), &columns, &filter);
    Ok(Some(Statement::new(sql, update_values(metadata, entity, id)?)))
}

/// Parameters of [`update_statement`]: updatable attributes, then `id`.
pub fn update_values(
    metadata: &EntityMetadata,
    entity: &dyn Any,
    id: Value,
) -> CoreResult<Vec<Value>> {
    let mut values = metadata
        .attributes()
        .iter()
        .filter(|a| a.is_updatable())
        .map(|a| a.get_value(entity))
        .collect::<CoreResult<Vec<_>>>()?;
    values.push(id);
    Ok(values)
}

/// DELETE by identifier.
#[must_use]
pub fn delete_statement(metadata: &EntityMetadata, id: Value) -> Statement {
    let filter = WhereClause::new().column_eq(metadata.identifier().column_name());
    Statement::new(
        SqlBuilder::delete(&metadata.qualified_table_name(), &filter),
        vec![id],
    )
}

/// SELECT of the identifier and every attribute, by identifier.
#[must_use]
pub fn select_by_id_statement(metadata: &EntityMetadata, id: Value) -> Statement {
    let filter = WhereClause::new().column_eq(metadata.identifier().column_name());
    Statement::new(
        SqlBuilder::select(
            &metadata.qualified_table_name(),
            &metadata.select_columns(),
            &filter,
        ),
        vec![id],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use relata_codec::AttributeType;

    #[derive(Default)]
    struct Post {
        id: Option<i64>,
        title: String,
        created: i64,
    }

    fn metadata(generated: bool) -> EntityMetadata {
        let builder = EntityMetadata::builder::<Post>("Post")
            .table("posts")
            .id("id", AttributeType::Integer, |p| p.id.into(), |p, v| {
                p.id = v.into_typed()?;
                Ok(())
            });
        let builder = if generated {
            builder.generated_id()
        } else {
            builder
        };
        builder
            .attribute("title", AttributeType::Text, |p| p.title.clone().into(), |p, v| {
                p.title = v.into_typed()?;
                Ok(())
            })
            .attribute("created", AttributeType::Integer, |p| p.created.into(), |p, v| {
                p.created = v.into_typed()?;
                Ok(())
            })
            .updatable(false)
            .build()
            .unwrap()
    }

    fn post(id: Option<i64>) -> Post {
        Post {
            id,
            title: "hello".into(),
            created: 100,
        }
    }

    #[test]
    fn insert_includes_assigned_id() {
        let statement = insert_statement(&metadata(false), &post(Some(5))).unwrap();
        assert_eq!(
            statement.sql(),
            "INSERT INTO posts (id, title, created) VALUES (?, ?, ?)"
        );
        assert_eq!(
            statement.parameters(),
            &[
                Value::Integer(5),
                Value::Text("hello".into()),
                Value::Integer(100)
            ]
        );
    }

    #[test]
    fn insert_omits_pending_generated_id() {
        let statement = insert_statement(&metadata(true), &post(None)).unwrap();
        assert_eq!(
            statement.sql(),
            "INSERT INTO posts (title, created) VALUES (?, ?)"
        );

        // an explicit id is still written
        let statement = insert_statement(&metadata(true), &post(Some(8))).unwrap();
        assert_eq!(statement.parameters()[0], Value::Integer(8));
    }

    #[test]
    fn update_skips_non_updatable() {
        let statement = update_statement(&metadata(false), &post(Some(5)), Value::Integer(5))
            .unwrap()
            .unwrap();
        assert_eq!(statement.sql(), "UPDATE posts SET title = ? WHERE id = ?");
        assert_eq!(
            statement.parameters(),
            &[Value::Text("hello".into()), Value::Integer(5)]
        );
    }

    #[test]
    fn update_is_addressed_by_the_given_id() {
        let statement = update_statement(&metadata(false), &post(Some(99)), Value::Integer(5))
            .unwrap()
            .unwrap();
        assert_eq!(statement.parameters().last(), Some(&Value::Integer(5)));
    }

    #[test]
    fn delete_and_select_by_id() {
        let metadata = metadata(false);
        let delete = delete_statement(&metadata, Value::Integer(5));
        assert_eq!(delete.sql(), "DELETE FROM posts WHERE id = ?");

        let select = select_by_id_statement(&metadata, Value::Integer(5));
        assert_eq!(
            select.sql(),
            "SELECT id, title, created FROM posts WHERE id = ?"
        );
        assert_eq!(select.parameters(), &[Value::Integer(5)]);
    }
}
