use crate::errors::DomainResult;
use async_trait::async_trait;
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

/// Trait for finding entities by ID
#[async_trait]
pub trait FindById<T> {
    /// Find an entity by ID
    async fn find_by_id(&self, id: Uuid) -> DomainResult<T>;
}

/// Trait for entities that support soft deletion
#[async_trait]
pub trait SoftDeletable {
    /// The name of the entity table in the database
    fn entity_name(&self) -> &'static str;

    /// Soft delete an entity by ID (standalone)
    async fn soft_delete(&self, id: Uuid) -> DomainResult<()>;

    /// Soft delete an entity by ID within a transaction.
    ///
    /// Fails with `EntityNotFound` when no live row matched, so a cascade that raced
    /// with another deletion aborts instead of silently skipping the row.
    async fn soft_delete_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;
}
