//! Entity metadata.
//!
//! Every entity type is described once by an [`EntityMetadata`] descriptor
//! table: its table, its identifier and an ordered list of attributes, each
//! with a get/set accessor pair resolved at declaration time. Descriptors
//! live in a shared [`MetadataRegistry`].

mod model;
mod registry;

pub use model::{
    AttributeMetadata, EntityMetadata, EntityMetadataBuilder, IdGeneration, IdentifierMetadata,
};
pub use registry::MetadataRegistry;
