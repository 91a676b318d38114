//! Descriptor tables and their builder.

use crate::error::{CoreError, CoreResult};
use crate::types::EntityType;
use relata_codec::{AttributeType, CodecResult, Value};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

type Getter = Arc<dyn Fn(&dyn Any) -> CoreResult<Value> + Send + Sync>;
type Setter = Arc<dyn Fn(&mut dyn Any, Value) -> CoreResult<()> + Send + Sync>;

/// Type-erased get/set pair for one field of `T`.
#[derive(Clone)]
struct Accessor {
    get: Getter,
    set: Setter,
}

impl Accessor {
    fn new<T: 'static>(get: fn(&T) -> Value, set: fn(&mut T, Value) -> CodecResult<()>) -> Self {
        Self {
            get: Arc::new(move |entity: &dyn Any| {
                entity
                    .downcast_ref::<T>()
                    .map(get)
                    .ok_or_else(wrong_entity::<T>)
            }),
            set: Arc::new(move |entity: &mut dyn Any, value: Value| {
                let entity = entity.downcast_mut::<T>().ok_or_else(wrong_entity::<T>)?;
                set(entity, value).map_err(CoreError::from)
            }),
        }
    }
}

fn wrong_entity<T>() -> CoreError {
    CoreError::invalid_argument(format!(
        "accessor applied to an entity that is not a {}",
        std::any::type_name::<T>()
    ))
}

/// How identifier values come into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdGeneration {
    /// The application assigns the identifier before persisting.
    #[default]
    Assigned,
    /// The database generates the identifier on insert.
    Generated,
}

/// Describes the identifier attribute of an entity.
#[derive(Clone)]
pub struct IdentifierMetadata {
    field_name: String,
    column_name: String,
    attribute_type: AttributeType,
    generation: IdGeneration,
    accessor: Accessor,
}

impl IdentifierMetadata {
    /// Field name used in queries.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Column name in the table.
    #[must_use]
    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    /// Storage type.
    #[must_use]
    pub fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }

    /// Generation strategy.
    #[must_use]
    pub fn generation(&self) -> IdGeneration {
        self.generation
    }

    /// Reads the identifier of `entity`.
    pub fn get_value(&self, entity: &dyn Any) -> CoreResult<Value> {
        (self.accessor.get)(entity)
    }

    /// Writes the identifier of `entity`.
    pub fn set_value(&self, entity: &mut dyn Any, value: Value) -> CoreResult<()> {
        (self.accessor.set)(entity, value)
    }
}

impl fmt::Debug for IdentifierMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierMetadata")
            .field("field_name", &self.field_name)
            .field("column_name", &self.column_name)
            .field("attribute_type", &self.attribute_type)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Describes one non-identifier attribute.
#[derive(Clone)]
pub struct AttributeMetadata {
    field_name: String,
    column_name: String,
    attribute_type: AttributeType,
    nullable: bool,
    unique: bool,
    length: Option<u32>,
    insertable: bool,
    updatable: bool,
    accessor: Accessor,
}

impl AttributeMetadata {
    /// Field name used in queries.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Column name in the table.
    #[must_use]
    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    /// Storage type.
    #[must_use]
    pub fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }

    /// Whether the column accepts NULL.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Whether the column is unique.
    #[must_use]
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Declared maximum length, if any.
    #[must_use]
    pub fn length(&self) -> Option<u32> {
        self.length
    }

    /// Whether INSERT statements include the column.
    #[must_use]
    pub fn is_insertable(&self) -> bool {
        self.insertable
    }

    /// Whether UPDATE statements include the column.
    #[must_use]
    pub fn is_updatable(&self) -> bool {
        self.updatable
    }

    /// Reads the attribute from `entity`.
    pub fn get_value(&self, entity: &dyn Any) -> CoreResult<Value> {
        (self.accessor.get)(entity)
    }

    /// Writes the attribute of `entity`.
    pub fn set_value(&self, entity: &mut dyn Any, value: Value) -> CoreResult<()> {
        (self.accessor.set)(entity, value)
    }
}

impl fmt::Debug for AttributeMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeMetadata")
            .field("field_name", &self.field_name)
            .field("column_name", &self.column_name)
            .field("attribute_type", &self.attribute_type)
            .field("nullable", &self.nullable)
            .field("unique", &self.unique)
            .field("length", &self.length)
            .field("insertable", &self.insertable)
            .field("updatable", &self.updatable)
            .finish_non_exhaustive()
    }
}

/// The descriptor table of one entity type.
///
/// Attribute order is declaration order and is the order of snapshot slots.
/// The identifier is not one of the attributes.
#[derive(Debug)]
pub struct EntityMetadata {
    entity_type: EntityType,
    entity_name: String,
    table_name: String,
    schema_name: Option<String>,
    catalog_name: Option<String>,
    identifier: IdentifierMetadata,
    attributes: Vec<AttributeMetadata>,
}

impl EntityMetadata {
    /// Starts a descriptor for `T`, named `entity_name` in queries.
    #[must_use]
    pub fn builder<T: 'static>(entity_name: impl Into<String>) -> EntityMetadataBuilder<T> {
        EntityMetadataBuilder::new(entity_name.into())
    }

    /// The Rust type described.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    /// Name used by the query language.
    #[must_use]
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Unqualified table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Schema name, if declared.
    #[must_use]
    pub fn schema_name(&self) -> Option<&str> {
        self.schema_name.as_deref()
    }

    /// Catalog name, if declared.
    #[must_use]
    pub fn catalog_name(&self) -> Option<&str> {
        self.catalog_name.as_deref()
    }

    /// Table name prefixed by its catalog and schema, if any.
    #[must_use]
    pub fn qualified_table_name(&self) -> String {
        let mut name = String::new();
        for prefix in [&self.catalog_name, &self.schema_name].into_iter().flatten() {
            name.push_str(prefix);
            name.push('.');
        }
        name.push_str(&self.table_name);
        name
    }

    /// The identifier descriptor.
    #[must_use]
    pub fn identifier(&self) -> &IdentifierMetadata {
        &self.identifier
    }

    /// Non-identifier attributes in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &[AttributeMetadata] {
        &self.attributes
    }

    /// Looks up an attribute by field name.
    #[must_use]
    pub fn attribute(&self, field_name: &str) -> Option<&AttributeMetadata> {
        self.attributes.iter().find(|a| a.field_name == field_name)
    }

    /// Maps a field name (identifier included) to its column.
    #[must_use]
    pub fn column_for_field(&self, field_name: &str) -> Option<&str> {
        if self.identifier.field_name == field_name {
            return Some(&self.identifier.column_name);
        }
        self.attribute(field_name).map(AttributeMetadata::column_name)
    }

    /// Identifier column followed by every attribute column.
    #[must_use]
    pub fn select_columns(&self) -> Vec<&str> {
        std::iter::once(self.identifier.column_name.as_str())
            .chain(self.attributes.iter().map(|a| a.column_name.as_str()))
            .collect()
    }

    /// Reads the identifier of `entity`.
    pub fn id_value(&self, entity: &dyn Any) -> CoreResult<Value> {
        self.identifier.get_value(entity)
    }

    /// Reads every attribute of `entity`, one slot per attribute.
    pub fn snapshot(&self, entity: &dyn Any) -> CoreResult<Box<[Value]>> {
        self.attributes
            .iter()
            .map(|a| a.get_value(entity))
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
enum Declared {
    Identifier,
    Attribute,
}

/// Builder for [`EntityMetadata`].
///
/// Column modifiers (`column`, `nullable`, ...) apply to the most recently
/// declared identifier or attribute.
///
/// # Example
///
/// ```rust
/// use relata_core::{AttributeType, EntityMetadata};
///
/// #[derive(Default)]
/// struct Member {
///     id: i64,
///     name: String,
/// }
///
/// let metadata = EntityMetadata::builder::<Member>("Member")
///     .table("members")
///     .id("id", AttributeType::Integer, |m| m.id.into(), |m, v| {
///         m.id = v.into_typed()?;
///         Ok(())
///     })
///     .attribute("name", AttributeType::Text, |m| m.name.clone().into(), |m, v| {
///         m.name = v.into_typed()?;
///         Ok(())
///     })
///     .column("member_name")
///     .nullable(false)
///     .build()
///     .unwrap();
///
/// assert_eq!(metadata.column_for_field("name"), Some("member_name"));
/// ```
pub struct EntityMetadataBuilder<T> {
    entity_name: String,
    table_name: Option<String>,
    schema_name: Option<String>,
    catalog_name: Option<String>,
    identifier: Option<IdentifierMetadata>,
    attributes: Vec<AttributeMetadata>,
    last: Option<Declared>,
    misuse: Option<String>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> EntityMetadataBuilder<T> {
    fn new(entity_name: String) -> Self {
        Self {
            entity_name,
            table_name: None,
            schema_name: None,
            catalog_name: None,
            identifier: None,
            attributes: Vec::new(),
            last: None,
            misuse: None,
            _marker: PhantomData,
        }
    }

    /// Sets the table name. Defaults to the entity name.
    #[must_use]
    pub fn table(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Sets the schema name.
    #[must_use]
    pub fn schema(mut self, name: impl Into<String>) -> Self {
        self.schema_name = Some(name.into());
        self
    }

    /// Sets the catalog name. On SQLite this is an attached database.
    #[must_use]
    pub fn catalog(mut self, name: impl Into<String>) -> Self {
        self.catalog_name = Some(name.into());
        self
    }

    /// Declares the identifier.
    #[must_use]
    pub fn id(
        mut self,
        field_name: impl Into<String>,
        attribute_type: AttributeType,
        get: fn(&T) -> Value,
        set: fn(&mut T, Value) -> CodecResult<()>,
    ) -> Self {
        if self.identifier.is_some() {
            self.note_misuse("identifier declared twice");
        }
        let field_name = field_name.into();
        self.identifier = Some(IdentifierMetadata {
            column_name: field_name.clone(),
            field_name,
            attribute_type,
            generation: IdGeneration::Assigned,
            accessor: Accessor::new(get, set),
        });
        self.last = Some(Declared::Identifier);
        self
    }

    /// Marks the identifier as database-generated.
    #[must_use]
    pub fn generated_id(mut self) -> Self {
        match self.identifier.as_mut() {
            Some(id) => id.generation = IdGeneration::Generated,
            None => self.note_misuse("generated_id before id"),
        }
        self
    }

    /// Declares an attribute.
    #[must_use]
    pub fn attribute(
        mut self,
        field_name: impl Into<String>,
        attribute_type: AttributeType,
        get: fn(&T) -> Value,
        set: fn(&mut T, Value) -> CodecResult<()>,
    ) -> Self {
        let field_name = field_name.into();
        self.attributes.push(AttributeMetadata {
            column_name: field_name.clone(),
            field_name,
            attribute_type,
            nullable: true,
            unique: false,
            length: None,
            insertable: true,
            updatable: true,
            accessor: Accessor::new(get, set),
        });
        self.last = Some(Declared::Attribute);
        self
    }

    /// Overrides the column name of the last declaration.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        match self.last {
            Some(Declared::Identifier) => {
                if let Some(id) = self.identifier.as_mut() {
                    id.column_name = name;
                }
            }
            Some(Declared::Attribute) => {
                if let Some(attr) = self.attributes.last_mut() {
                    attr.column_name = name;
                }
            }
            None => self.note_misuse("column before any declaration"),
        }
        self
    }

    /// Sets nullability of the last attribute.
    #[must_use]
    pub fn nullable(self, nullable: bool) -> Self {
        self.modify("nullable", |a| a.nullable = nullable)
    }

    /// Sets uniqueness of the last attribute.
    #[must_use]
    pub fn unique(self, unique: bool) -> Self {
        self.modify("unique", |a| a.unique = unique)
    }

    /// Sets the maximum length of the last attribute.
    #[must_use]
    pub fn length(self, length: u32) -> Self {
        self.modify("length", |a| a.length = Some(length))
    }

    /// Sets whether the last attribute is written on insert.
    #[must_use]
    pub fn insertable(self, insertable: bool) -> Self {
        self.modify("insertable", |a| a.insertable = insertable)
    }

    /// Sets whether the last attribute is written on update.
    #[must_use]
    pub fn updatable(self, updatable: bool) -> Self {
        self.modify("updatable", |a| a.updatable = updatable)
    }

    fn modify(mut self, what: &str, f: impl FnOnce(&mut AttributeMetadata)) -> Self {
        match (self.last, self.attributes.last_mut()) {
            (Some(Declared::Attribute), Some(attr)) => f(attr),
            _ => self.note_misuse(&format!("{what} must follow an attribute")),
        }
        self
    }

    fn note_misuse(&mut self, message: &str) {
        if self.misuse.is_none() {
            self.misuse = Some(message.to_string());
        }
    }

    /// Validates and finishes the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidMetadata`] if no identifier was declared,
    /// a name is empty, two fields share a name or two columns collide.
    pub fn build(self) -> CoreResult<EntityMetadata> {
        let entity_name = self.entity_name;
        let fail = |message: String| CoreError::invalid_metadata(format!("{entity_name}: {message}"));

        if let Some(message) = self.misuse {
            return Err(fail(message));
        }
        if entity_name.trim().is_empty() {
            return Err(CoreError::invalid_metadata("entity name cannot be empty"));
        }
        let identifier = self
            .identifier
            .ok_or_else(|| fail("no identifier declared".into()))?;
        let table_name = self.table_name.unwrap_or_else(|| entity_name.clone());
        if table_name.trim().is_empty() {
            return Err(fail("table name cannot be empty".into()));
        }

        let mut fields = HashSet::new();
        let mut columns = HashSet::new();
        let declared = std::iter::once((&identifier.field_name, &identifier.column_name)).chain(
            self.attributes
                .iter()
                .map(|a| (&a.field_name, &a.column_name)),
        );
        for (field, column) in declared {
            if field.is_empty() || column.is_empty() {
                return Err(fail("field and column names cannot be empty".into()));
            }
            if !fields.insert(field.as_str()) {
                return Err(fail(format!("field {field} declared twice")));
            }
            if !columns.insert(column.to_ascii_lowercase()) {
                return Err(fail(format!("column {column} mapped twice")));
            }
        }

        Ok(EntityMetadata {
            entity_type: EntityType::of::<T>(),
            entity_name,
            table_name,
            schema_name: self.schema_name,
            catalog_name: self.catalog_name,
            identifier,
            attributes: self.attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Book {
        id: i64,
        title: String,
        pages: Option<i64>,
    }

    fn book() -> EntityMetadataBuilder<Book> {
        EntityMetadata::builder::<Book>("Book")
            .id("id", AttributeType::Integer, |b| b.id.into(), |b, v| {
                b.id = v.into_typed()?;
                Ok(())
            })
            .attribute("title", AttributeType::Text, |b| b.title.clone().into(), |b, v| {
                b.title = v.into_typed()?;
                Ok(())
            })
    }

    fn with_pages(builder: EntityMetadataBuilder<Book>) -> EntityMetadataBuilder<Book> {
        builder.attribute("pages", AttributeType::Integer, |b| b.pages.into(), |b, v| {
            b.pages = v.into_typed()?;
            Ok(())
        })
    }

    #[test]
    fn defaults_follow_names() {
        let metadata = book().build().unwrap();
        assert_eq!(metadata.table_name(), "Book");
        assert_eq!(metadata.qualified_table_name(), "Book");
        assert_eq!(metadata.column_for_field("title"), Some("title"));
        assert_eq!(metadata.identifier().generation(), IdGeneration::Assigned);
        assert!(metadata.attribute("title").unwrap().is_nullable());
    }

    #[test]
    fn modifiers_apply_to_last_declaration() {
        let metadata = with_pages(book().column("book_title").length(80).updatable(false))
            .table("books")
            .schema("library")
            .build()
            .unwrap();

        let title = metadata.attribute("title").unwrap();
        assert_eq!(title.column_name(), "book_title");
        assert_eq!(title.length(), Some(80));
        assert!(!title.is_updatable());
        assert!(metadata.attribute("pages").unwrap().is_updatable());
        assert_eq!(metadata.qualified_table_name(), "library.books");
        assert_eq!(metadata.select_columns(), vec!["id", "book_title", "pages"]);
    }

    #[test]
    fn catalog_prefixes_schema() {
        let metadata = with_pages(book())
            .table("books")
            .catalog("archive")
            .schema("library")
            .build()
            .unwrap();
        assert_eq!(metadata.catalog_name(), Some("archive"));
        assert_eq!(metadata.qualified_table_name(), "archive.library.books");

        let metadata = with_pages(book()).table("books").catalog("archive").build().unwrap();
        assert_eq!(metadata.qualified_table_name(), "archive.books");
    }

    #[test]
    fn accessors_read_and_write() {
        let metadata = with_pages(book()).build().unwrap();
        let mut entity = Book {
            id: 4,
            title: "Dune".into(),
            pages: None,
        };

        assert_eq!(metadata.id_value(&entity).unwrap(), Value::Integer(4));
        assert_eq!(
            &*metadata.snapshot(&entity).unwrap(),
            &[Value::Text("Dune".into()), Value::Null]
        );

        metadata
            .attribute("pages")
            .unwrap()
            .set_value(&mut entity, Value::Integer(412))
            .unwrap();
        assert_eq!(entity.pages, Some(412));
    }

    #[test]
    fn accessor_rejects_foreign_entity() {
        let metadata = book().build().unwrap();
        let err = metadata.id_value(&"not a book").unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }));
    }

    #[test]
    fn missing_identifier_is_rejected() {
        let err = EntityMetadata::builder::<Book>("Book").build().unwrap_err();
        assert!(matches!(err, CoreError::InvalidMetadata { .. }));
    }

    #[test]
    fn column_collision_is_rejected() {
        let err = book().column("ID").build().unwrap_err();
        assert!(matches!(err, CoreError::InvalidMetadata { .. }));
    }

    #[test]
    fn modifier_before_attribute_is_rejected() {
        let err = EntityMetadata::builder::<Book>("Book")
            .id("id", AttributeType::Integer, |b| b.id.into(), |b, v| {
                b.id = v.into_typed()?;
                Ok(())
            })
            .nullable(false)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidMetadata { .. }));
    }
}
