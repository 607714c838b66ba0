use crate::domains::core::repository::{FindById, SoftDeletable};
use crate::domains::property::types::{NewProperty, Property, PropertyRow, PropertyStatus};
use crate::errors::{DbError, DomainError, DomainResult};
use crate::validation::Validate;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, Pool, Sqlite, Transaction};
use uuid::Uuid;

const PROPERTY_COLUMNS: &str = "id, owner_id, title, base_price, taxes_fees, status, is_deleted, \
    deleted_at, created_at, updated_at";

#[async_trait]
pub trait PropertyRepository: FindById<Property> + SoftDeletable + Send + Sync {
    async fn create(&self, new_property: &NewProperty) -> DomainResult<Property>;

    async fn find_live_by_owner_with_tx(
        &self,
        owner_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<Property>>;
}

/// SQLite implementation for PropertyRepository
#[derive(Debug, Clone)]
pub struct SqlitePropertyRepository {
    pool: Pool<Sqlite>,
}

impl SqlitePropertyRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FindById<Property> for SqlitePropertyRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Property> {
        let row = query_as::<_, PropertyRow>(&format!(
            "SELECT {} FROM properties WHERE id = ?",
            PROPERTY_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?
        .ok_or_else(|| DomainError::EntityNotFound("Property".to_string(), id))?;

        row.into_entity()
    }
}

#[async_trait]
impl SoftDeletable for SqlitePropertyRepository {
    fn entity_name(&self) -> &'static str {
        "properties"
    }

    async fn soft_delete_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();

        let result = query(
            "UPDATE properties SET status = ?, is_deleted = 1, deleted_at = ?, updated_at = ? \
             WHERE id = ? AND is_deleted = 0",
        )
        .bind(PropertyStatus::Deleted.as_str())
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("Property".to_string(), id))
        } else {
            Ok(())
        }
    }

    async fn soft_delete(&self, id: Uuid) -> DomainResult<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        match self.soft_delete_with_tx(id, &mut tx).await {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl PropertyRepository for SqlitePropertyRepository {
    async fn create(&self, new_property: &NewProperty) -> DomainResult<Property> {
        new_property.validate()?;

        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        query(
            "INSERT INTO properties (id, owner_id, title, base_price, taxes_fees, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(new_property.owner_id.to_string())
        .bind(&new_property.title)
        .bind(new_property.base_price.to_string())
        .bind(new_property.taxes_fees.to_string())
        .bind(PropertyStatus::Available.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        self.find_by_id(id).await
    }

    async fn find_live_by_owner_with_tx(
        &self,
        owner_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<Property>> {
        let rows = query_as::<_, PropertyRow>(&format!(
            "SELECT {} FROM properties WHERE owner_id = ? AND is_deleted = 0 ORDER BY created_at ASC",
            PROPERTY_COLUMNS
        ))
        .bind(owner_id.to_string())
        .fetch_all(&mut **tx)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(PropertyRow::into_entity).collect()
    }
}
