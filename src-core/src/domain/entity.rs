//! Domain Layer - Core Entity Trait
//!
//! This trait defines the basic contract for all domain entities.
//! All entities must have a unique ID and be thread-safe.

use serde::{Deserialize, Serialize};

/// Store-assigned record identity
pub type RecordId = u32;

/// Core trait for all domain entities
pub trait Entity: Sized + Send + Sync + Clone {
    /// The type of the entity's unique identifier
    type Id: Copy + Eq + std::hash::Hash + Send + Sync;

    /// Returns the entity's unique identifier
    fn id(&self) -> Self::Id;
}

/// Common result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail")]
pub enum DomainError {
    /// Unique constraint violation raised by the store's insert/update path
    #[error("Duplicate key: {collection}.{field} = {value}")]
    DuplicateKey {
        collection: String,
        field: String,
        value: String,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn duplicate_key(collection: &str, field: &str, value: impl Into<String>) -> Self {
        DomainError::DuplicateKey {
            collection: collection.to_string(),
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn not_found(what: &str, id: RecordId) -> Self {
        DomainError::NotFound(format!("{} {}", what, id))
    }
}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Storage(e.to_string())
    }
}
