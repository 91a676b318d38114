//! A small query language over registered entities.
//!
//! Queries select one entity type and filter it with AND-joined
//! comparisons against bound parameters:
//!
//! ```text
//! SELECT m FROM Member m WHERE m.name = :name AND m.age > ?1
//! ```
//!
//! [`QueryParser`] turns text into a [`SelectStatement`],
//! [`QueryTranslator`] resolves names through the metadata registry, and a
//! [`TypedQuery`] binds parameters and runs the SQL in a session.

mod parser;
mod translator;
mod typed;

pub use parser::{Condition, Parameter, QueryParser, SelectStatement};
pub use translator::{QueryTranslator, TranslatedQuery};
pub use typed::TypedQuery;
