//! Value codec registry.

use crate::error::{CodecError, CodecResult};
use crate::types::{AttributeType, SqlValue};
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Encode/decode strategy for one attribute type.
///
/// Codecs never see `Null`: the registry maps `Value::Null` and
/// `SqlValue::Null` onto each other before dispatching.
pub trait ValueCodec: Send + Sync {
    /// Encodes a non-null attribute value into a column value.
    fn encode(&self, value: &Value) -> CodecResult<SqlValue>;

    /// Decodes a non-null column value into an attribute value.
    fn decode(&self, column: SqlValue) -> CodecResult<Value>;
}

/// Booleans stored as integer 0/1.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoolCodec;

impl ValueCodec for BoolCodec {
    fn encode(&self, value: &Value) -> CodecResult<SqlValue> {
        match value {
            Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
            other => Err(CodecError::type_mismatch("bool", other.kind_name())),
        }
    }

    fn decode(&self, column: SqlValue) -> CodecResult<Value> {
        match column {
            SqlValue::Integer(n) => Ok(Value::Bool(n != 0)),
            SqlValue::Text(s) => match s.as_str() {
                "true" | "TRUE" | "1" => Ok(Value::Bool(true)),
                "false" | "FALSE" | "0" => Ok(Value::Bool(false)),
                _ => Err(CodecError::decoding_failed(format!("not a boolean: {s}"))),
            },
            other => Err(CodecError::type_mismatch("integer", other.kind_name())),
        }
    }
}

/// Integers stored natively.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegerCodec;

impl ValueCodec for IntegerCodec {
    fn encode(&self, value: &Value) -> CodecResult<SqlValue> {
        match value {
            Value::Integer(n) => Ok(SqlValue::Integer(*n)),
            other => Err(CodecError::type_mismatch("integer", other.kind_name())),
        }
    }

    fn decode(&self, column: SqlValue) -> CodecResult<Value> {
        match column {
            SqlValue::Integer(n) => Ok(Value::Integer(n)),
            other => Err(CodecError::type_mismatch("integer", other.kind_name())),
        }
    }
}

/// Reals stored natively; integer columns widen.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealCodec;

impl ValueCodec for RealCodec {
    fn encode(&self, value: &Value) -> CodecResult<SqlValue> {
        match value {
            Value::Real(n) => Ok(SqlValue::Real(*n)),
            other => Err(CodecError::type_mismatch("real", other.kind_name())),
        }
    }

    fn decode(&self, column: SqlValue) -> CodecResult<Value> {
        match column {
            SqlValue::Real(n) => Ok(Value::Real(n)),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Integer(n) => Ok(Value::Real(n as f64)),
            other => Err(CodecError::type_mismatch("real", other.kind_name())),
        }
    }
}

/// Text stored natively.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

impl ValueCodec for TextCodec {
    fn encode(&self, value: &Value) -> CodecResult<SqlValue> {
        match value {
            Value::Text(s) => Ok(SqlValue::Text(s.clone())),
            other => Err(CodecError::type_mismatch("text", other.kind_name())),
        }
    }

    fn decode(&self, column: SqlValue) -> CodecResult<Value> {
        match column {
            SqlValue::Text(s) => Ok(Value::Text(s)),
            other => Err(CodecError::type_mismatch("text", other.kind_name())),
        }
    }
}

/// Bytes stored as blobs.
#[derive(Debug, Default, Clone, Copy)]
pub struct BytesCodec;

impl ValueCodec for BytesCodec {
    fn encode(&self, value: &Value) -> CodecResult<SqlValue> {
        match value {
            Value::Bytes(b) => Ok(SqlValue::Blob(b.clone())),
            other => Err(CodecError::type_mismatch("bytes", other.kind_name())),
        }
    }

    fn decode(&self, column: SqlValue) -> CodecResult<Value> {
        match column {
            SqlValue::Blob(b) => Ok(Value::Bytes(b)),
            other => Err(CodecError::type_mismatch("blob", other.kind_name())),
        }
    }
}

/// UUIDs stored as hyphenated text. Blob columns of 16 bytes are also read.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTextCodec;

impl ValueCodec for UuidTextCodec {
    fn encode(&self, value: &Value) -> CodecResult<SqlValue> {
        match value {
            Value::Uuid(u) => Ok(SqlValue::Text(u.hyphenated().to_string())),
            other => Err(CodecError::type_mismatch("uuid", other.kind_name())),
        }
    }

    fn decode(&self, column: SqlValue) -> CodecResult<Value> {
        match column {
            SqlValue::Text(s) => Uuid::parse_str(&s)
                .map(Value::Uuid)
                .map_err(|e| CodecError::decoding_failed(format!("invalid uuid {s:?}: {e}"))),
            SqlValue::Blob(b) => Uuid::from_slice(&b)
                .map(Value::Uuid)
                .map_err(|e| CodecError::decoding_failed(format!("invalid uuid bytes: {e}"))),
            other => Err(CodecError::type_mismatch("text", other.kind_name())),
        }
    }
}

/// Maps attribute types to their codecs.
///
/// The registry is shared read-mostly; [`register`](Self::register) replaces
/// the codec for one type without affecting any other.
///
/// # Example
///
/// ```rust
/// use relata_codec::{AttributeType, CodecRegistry, SqlValue, Value};
///
/// let codecs = CodecRegistry::new();
/// let column = codecs.encode(&Value::Bool(true)).unwrap();
/// assert_eq!(column, SqlValue::Integer(1));
/// let back = codecs.decode(AttributeType::Bool, column).unwrap();
/// assert_eq!(back, Value::Bool(true));
/// ```
pub struct CodecRegistry {
    codecs: RwLock<HashMap<AttributeType, Arc<dyn ValueCodec>>>,
}

impl CodecRegistry {
    /// Creates a registry populated with the default codecs.
    #[must_use]
    pub fn new() -> Self {
        let mut codecs: HashMap<AttributeType, Arc<dyn ValueCodec>> = HashMap::new();
        codecs.insert(AttributeType::Bool, Arc::new(BoolCodec));
        codecs.insert(AttributeType::Integer, Arc::new(IntegerCodec));
        codecs.insert(AttributeType::Real, Arc::new(RealCodec));
        codecs.insert(AttributeType::Text, Arc::new(TextCodec));
        codecs.insert(AttributeType::Bytes, Arc::new(BytesCodec));
        codecs.insert(AttributeType::Uuid, Arc::new(UuidTextCodec));
        Self {
            codecs: RwLock::new(codecs),
        }
    }

    /// Replaces the codec used for `attribute_type`.
    pub fn register(&self, attribute_type: AttributeType, codec: Arc<dyn ValueCodec>) {
        self.codecs.write().insert(attribute_type, codec);
    }

    fn codec_for(&self, attribute_type: AttributeType) -> CodecResult<Arc<dyn ValueCodec>> {
        self.codecs
            .read()
            .get(&attribute_type)
            .cloned()
            .ok_or_else(|| {
                CodecError::encoding_failed(format!("no codec registered for {attribute_type}"))
            })
    }

    /// Encodes a value using the codec of its own attribute type.
    pub fn encode(&self, value: &Value) -> CodecResult<SqlValue> {
        match value.attribute_type() {
            None => Ok(SqlValue::Null),
            Some(ty) => self.codec_for(ty)?.encode(value),
        }
    }

    /// Decodes a column value as `attribute_type`.
    pub fn decode(&self, attribute_type: AttributeType, column: SqlValue) -> CodecResult<Value> {
        if column.is_null() {
            return Ok(Value::Null);
        }
        self.codec_for(attribute_type)?.decode(column)
    }

    /// Encodes every value of a parameter list.
    pub fn encode_all(&self, values: &[Value]) -> CodecResult<Vec<SqlValue>> {
        values.iter().map(|v| self.encode(v)).collect()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.codecs.read().keys().copied().collect();
        types.sort();
        f.debug_struct("CodecRegistry")
            .field("types", &types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_bypass_codecs() {
        let codecs = CodecRegistry::new();
        assert_eq!(codecs.encode(&Value::Null).unwrap(), SqlValue::Null);
        for ty in AttributeType::ALL {
            assert_eq!(codecs.decode(ty, SqlValue::Null).unwrap(), Value::Null);
        }
    }

    #[test]
    fn bool_stored_as_integer() {
        let codecs = CodecRegistry::new();
        assert_eq!(
            codecs.encode(&Value::Bool(false)).unwrap(),
            SqlValue::Integer(0)
        );
        assert_eq!(
            codecs
                .decode(AttributeType::Bool, SqlValue::Integer(3))
                .unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn uuid_stored_as_text() {
        let codecs = CodecRegistry::new();
        let id = Uuid::new_v4();
        let column = codecs.encode(&Value::Uuid(id)).unwrap();
        assert_eq!(column, SqlValue::Text(id.hyphenated().to_string()));
        assert_eq!(
            codecs.decode(AttributeType::Uuid, column).unwrap(),
            Value::Uuid(id)
        );
    }

    #[test]
    fn real_accepts_integer_column() {
        let codecs = CodecRegistry::new();
        assert_eq!(
            codecs
                .decode(AttributeType::Real, SqlValue::Integer(2))
                .unwrap(),
            Value::Real(2.0)
        );
    }

    #[test]
    fn decode_rejects_wrong_storage_class() {
        let codecs = CodecRegistry::new();
        let err = codecs
            .decode(AttributeType::Integer, SqlValue::Text("x".into()))
            .unwrap_err();
        assert_eq!(err, CodecError::type_mismatch("integer", "text"));
    }

    struct UuidBlobCodec;

    impl ValueCodec for UuidBlobCodec {
        fn encode(&self, value: &Value) -> CodecResult<SqlValue> {
            match value {
                Value::Uuid(u) => Ok(SqlValue::Blob(u.as_bytes().to_vec())),
                other => Err(CodecError::type_mismatch("uuid", other.kind_name())),
            }
        }

        fn decode(&self, column: SqlValue) -> CodecResult<Value> {
            UuidTextCodec.decode(column)
        }
    }

    #[test]
    fn register_replaces_single_codec() {
        let codecs = CodecRegistry::new();
        codecs.register(AttributeType::Uuid, Arc::new(UuidBlobCodec));

        let id = Uuid::new_v4();
        let column = codecs.encode(&Value::Uuid(id)).unwrap();
        assert_eq!(column, SqlValue::Blob(id.as_bytes().to_vec()));
        assert_eq!(
            codecs.decode(AttributeType::Uuid, column).unwrap(),
            Value::Uuid(id)
        );
        // other codecs untouched
        assert_eq!(
            codecs.encode(&Value::Text("a".into())).unwrap(),
            SqlValue::Text("a".into())
        );
    }
}
