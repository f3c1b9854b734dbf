//! Repository Layer - Core Traits
//!
//! Defines the abstract interfaces for data access.
//! Implementations work against the shared in-memory document store.

use async_trait::async_trait;
use crate::domain::{Entity, DomainResult};

/// Core repository trait for CRUD operations
///
/// Generic over any Entity type.
/// All operations are async since they share the store behind an async lock.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Create a new entity; the store assigns its ID
    async fn create(&self, entity: &T) -> DomainResult<T>;

    /// Find entity by ID
    async fn find_by_id(&self, id: T::Id) -> DomainResult<Option<T>>;

    /// List all entities
    async fn list(&self) -> DomainResult<Vec<T>>;

    /// Replace an existing entity (every field is rewritten)
    async fn update(&self, entity: &T) -> DomainResult<T>;

    /// Delete entity by ID, together with the join rows that reference it
    async fn delete(&self, id: T::Id) -> DomainResult<()>;
}
