//! Dynamic attribute value type.

use crate::error::{CodecError, CodecResult};
use crate::types::AttributeType;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A dynamic attribute value.
///
/// Values are what entity accessors read and write, what snapshots hold, and
/// what statements carry as parameters. Equality and hashing are structural;
/// reals compare by bit pattern so that a `Value` can serve as an identifier
/// and so that an unchanged `NaN` never looks dirty.
#[derive(Debug, Clone)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Double-precision real.
    Real(f64),
    /// Text string (UTF-8).
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// UUID.
    Uuid(Uuid),
}

impl Value {
    /// Returns the attribute type this value naturally belongs to.
    ///
    /// `Null` has no type of its own.
    #[must_use]
    pub fn attribute_type(&self) -> Option<AttributeType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(AttributeType::Bool),
            Value::Integer(_) => Some(AttributeType::Integer),
            Value::Real(_) => Some(AttributeType::Real),
            Value::Text(_) => Some(AttributeType::Text),
            Value::Bytes(_) => Some(AttributeType::Bytes),
            Value::Uuid(_) => Some(AttributeType::Uuid),
        }
    }

    /// Short name of the value's kind, for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        self.attribute_type().map_or("null", AttributeType::name)
    }

    /// Check if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a real, if it is one.
    #[must_use]
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a UUID, if it is one.
    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// Converts into a typed Rust value.
    pub fn into_typed<T: FromValue>(self) -> CodecResult<T> {
        T::from_value(self)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Integer(n) => n.hash(state),
            Value::Real(n) => n.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Uuid(u) => u.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Real(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Uuid(u) => write!(f, "{u}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Real(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

/// Conversion from a [`Value`] into a typed Rust value.
///
/// Used by attribute setters. `Option<T>` maps `Null` to `None`; every other
/// implementation rejects `Null` with [`CodecError::UnexpectedNull`].
pub trait FromValue: Sized {
    /// Converts the value.
    fn from_value(value: Value) -> CodecResult<Self>;
}

impl FromValue for Value {
    fn from_value(value: Value) -> CodecResult<Self> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> CodecResult<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Integer(n) => Ok(n != 0),
            Value::Null => Err(CodecError::UnexpectedNull { expected: "bool" }),
            other => Err(CodecError::type_mismatch("bool", other.kind_name())),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> CodecResult<Self> {
        match value {
            Value::Integer(n) => Ok(n),
            Value::Null => Err(CodecError::UnexpectedNull { expected: "integer" }),
            other => Err(CodecError::type_mismatch("integer", other.kind_name())),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> CodecResult<Self> {
        let n = i64::from_value(value)?;
        i32::try_from(n).map_err(|_| CodecError::IntegerOverflow {
            value: n,
            target: "i32",
        })
    }
}

impl FromValue for u32 {
    fn from_value(value: Value) -> CodecResult<Self> {
        let n = i64::from_value(value)?;
        u32::try_from(n).map_err(|_| CodecError::IntegerOverflow {
            value: n,
            target: "u32",
        })
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> CodecResult<Self> {
        match value {
            Value::Real(n) => Ok(n),
            #[allow(clippy::cast_precision_loss)]
            Value::Integer(n) => Ok(n as f64),
            Value::Null => Err(CodecError::UnexpectedNull { expected: "real" }),
            other => Err(CodecError::type_mismatch("real", other.kind_name())),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> CodecResult<Self> {
        match value {
            Value::Text(s) => Ok(s),
            Value::Null => Err(CodecError::UnexpectedNull { expected: "text" }),
            other => Err(CodecError::type_mismatch("text", other.kind_name())),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> CodecResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::Null => Err(CodecError::UnexpectedNull { expected: "bytes" }),
            other => Err(CodecError::type_mismatch("bytes", other.kind_name())),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> CodecResult<Self> {
        match value {
            Value::Uuid(u) => Ok(u),
            Value::Null => Err(CodecError::UnexpectedNull { expected: "uuid" }),
            other => Err(CodecError::type_mismatch("uuid", other.kind_name())),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> CodecResult<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
