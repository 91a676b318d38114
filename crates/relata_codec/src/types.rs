//! Attribute and column type definitions.

use std::fmt;

/// Semantic storage type of an entity attribute.
///
/// The attribute type selects the [`ValueCodec`](crate::ValueCodec) used to
/// move values between entities and database columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeType {
    /// Boolean.
    Bool,
    /// 64-bit signed integer.
    Integer,
    /// Double-precision real.
    Real,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Bytes,
    /// UUID.
    Uuid,
}

impl AttributeType {
    /// All attribute types, in declaration order.
    pub const ALL: [AttributeType; 6] = [
        AttributeType::Bool,
        AttributeType::Integer,
        AttributeType::Real,
        AttributeType::Text,
        AttributeType::Bytes,
        AttributeType::Uuid,
    ];

    /// Lowercase type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            AttributeType::Bool => "bool",
            AttributeType::Integer => "integer",
            AttributeType::Real => "real",
            AttributeType::Text => "text",
            AttributeType::Bytes => "bytes",
            AttributeType::Uuid => "uuid",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A raw column value as the driver stores it.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL.
    Null,
    /// Integer storage class.
    Integer(i64),
    /// Real storage class.
    Real(f64),
    /// Text storage class.
    Text(String),
    /// Blob storage class.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Check if this value is SQL NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Storage class name, for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Blob(_) => "blob",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_type_display() {
        assert_eq!(AttributeType::Uuid.to_string(), "uuid");
        assert_eq!(format!("{}", AttributeType::Integer), "integer");
    }

    #[test]
    fn sql_value_kind() {
        assert!(SqlValue::Null.is_null());
        assert_eq!(SqlValue::Blob(vec![]).kind_name(), "blob");
    }
}
