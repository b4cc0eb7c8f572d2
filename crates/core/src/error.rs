//! Model error types.

use thiserror::Error;

/// Result type used by CRUD-style command outputs.
pub type EntityResult<T> = Result<T, EntityError>;

/// Entity-level error surfaced by CRUD processors.
///
/// Keep this focused on data failures (validation, missing records, storage).
/// Dispatch and lifecycle failures belong to the application context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EntityError {
    /// An entity failed validation (e.g. duplicate identifier on create).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// The entity could not be mapped to or from its stored representation.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The backing store failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl EntityError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// A leaf filter was built with an operator that does not accept its value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("field name must not be empty")]
    EmptyField,

    #[error("operator `{operator}` does not accept {value_kind} values")]
    InvalidOperand {
        operator: &'static str,
        value_kind: &'static str,
    },
}
