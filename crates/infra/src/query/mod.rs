//! Storage adapters for the filter tree.
//!
//! - `matcher`: evaluates a filter tree against in-memory records
//! - `sql`: translates a filter tree into a parameterised SQL `WHERE` clause
//! - `in_memory`: a CRUD processor over a `Vec` of entities, built on `matcher`

pub mod in_memory;
pub mod matcher;
pub mod sql;

pub use in_memory::InMemoryEntityProcessor;
pub use matcher::{FieldSource, matches, matches_group};
pub use sql::{Placeholder, SqlError, SqlPredicate, SqlQueryBuilder, SqlStatement, SqlWhere};
