//! # Relata Testkit
//!
//! Test utilities for Relata.
//!
//! This crate provides:
//! - Sample entities and database fixtures
//! - Property-based test generators using proptest
//! - Log capture for tests
//!
//! ## Usage
//!
//! ```rust
//! use relata_testkit::prelude::*;
//!
//! with_test_db(|db| {
//!     let mut em = db.create_entity_manager().unwrap();
//!     em.begin().unwrap();
//!     em.persist(&member(1, "Alice")).unwrap();
//!     em.commit().unwrap();
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
