//! # Relata Codec
//!
//! Attribute values and column codecs for Relata.
//!
//! This crate provides:
//! - [`Value`], the dynamic value read from and written to entity attributes
//! - [`AttributeType`], the semantic storage type of an attribute
//! - [`SqlValue`], the raw column value a driver stores
//! - [`CodecRegistry`], an extensible mapping from attribute type to
//!   encode/decode strategy
//!
//! ## Usage
//!
//! ```
//! use relata_codec::{AttributeType, CodecRegistry, Value};
//!
//! let codecs = CodecRegistry::new();
//! let column = codecs.encode(&Value::from("Alice")).unwrap();
//! let value = codecs.decode(AttributeType::Text, column).unwrap();
//! assert_eq!(value, Value::Text("Alice".into()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod registry;
mod types;
mod value;

pub use error::{CodecError, CodecResult};
pub use registry::{
    BoolCodec, BytesCodec, CodecRegistry, IntegerCodec, RealCodec, TextCodec, UuidTextCodec,
    ValueCodec,
};
pub use types::{AttributeType, SqlValue};
pub use value::{FromValue, Value};

