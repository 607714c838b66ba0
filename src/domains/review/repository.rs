use crate::domains::core::repository::FindById;
use crate::domains::review::types::{NewReview, Review, ReviewRow, ReviewStatus};
use crate::errors::{DbError, DomainError, DomainResult};
use crate::types::DELETED_USER_PLACEHOLDER;
use crate::validation::Validate;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, Pool, Sqlite, Transaction};
use uuid::Uuid;

const REVIEW_COLUMNS: &str = "id, property_id, author_id, author_token, author_username, feedback, rating, \
    status, is_deleted, deleted_at, created_at, updated_at";

#[async_trait]
pub trait ReviewRepository: FindById<Review> + Send + Sync {
    async fn create(&self, new_review: &NewReview) -> DomainResult<Review>;

    /// Reviews by the author that are not deleted yet
    async fn find_live_by_author_with_tx(
        &self,
        author_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<Review>>;

    /// Every review still linked to the author
    async fn find_by_author_with_tx(
        &self,
        author_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<Review>>;

    /// Hide the review and replace the author name and feedback.
    async fn soft_delete_with_tx(
        &self,
        id: Uuid,
        feedback: &str,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;

    /// Soft delete and also detach the author behind an opaque token.
    async fn privacy_delete_with_tx(
        &self,
        id: Uuid,
        author_token: &str,
        feedback: &str,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;
}

/// SQLite implementation for ReviewRepository
#[derive(Debug, Clone)]
pub struct SqliteReviewRepository {
    pool: Pool<Sqlite>,
}

impl SqliteReviewRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FindById<Review> for SqliteReviewRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Review> {
        let row = query_as::<_, ReviewRow>(&format!("SELECT {} FROM reviews WHERE id = ?", REVIEW_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("Review".to_string(), id))?;

        row.into_entity()
    }
}

#[async_trait]
impl ReviewRepository for SqliteReviewRepository {
    async fn create(&self, new_review: &NewReview) -> DomainResult<Review> {
        new_review.validate()?;

        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        query(
            "INSERT INTO reviews (id, property_id, author_id, author_username, feedback, rating, status, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(new_review.property_id.to_string())
        .bind(new_review.author_id.to_string())
        .bind(&new_review.author_username)
        .bind(&new_review.feedback)
        .bind(new_review.rating)
        .bind(ReviewStatus::Published.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        self.find_by_id(id).await
    }

    async fn find_live_by_author_with_tx(
        &self,
        author_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<Review>> {
        let rows = query_as::<_, ReviewRow>(&format!(
            "SELECT {} FROM reviews WHERE author_id = ? AND is_deleted = 0 ORDER BY created_at ASC",
            REVIEW_COLUMNS
        ))
        .bind(author_id.to_string())
        .fetch_all(&mut **tx)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(ReviewRow::into_entity).collect()
    }

    async fn find_by_author_with_tx(
        &self,
        author_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<Review>> {
        let rows = query_as::<_, ReviewRow>(&format!(
            "SELECT {} FROM reviews WHERE author_id = ? ORDER BY created_at ASC",
            REVIEW_COLUMNS
        ))
        .bind(author_id.to_string())
        .fetch_all(&mut **tx)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(ReviewRow::into_entity).collect()
    }

    async fn soft_delete_with_tx(
        &self,
        id: Uuid,
        feedback: &str,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();

        let result = query(
            "UPDATE reviews SET author_username = ?, feedback = ?, status = ?, is_deleted = 1, \
             deleted_at = ?, updated_at = ? WHERE id = ? AND is_deleted = 0",
        )
        .bind(DELETED_USER_PLACEHOLDER)
        .bind(feedback)
        .bind(ReviewStatus::Deleted.as_str())
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("Review".to_string(), id))
        } else {
            Ok(())
        }
    }

    async fn privacy_delete_with_tx(
        &self,
        id: Uuid,
        author_token: &str,
        feedback: &str,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();

        let result = query(
            "UPDATE reviews SET author_token = ?, author_id = NULL, author_username = ?, feedback = ?, \
             status = ?, is_deleted = 1, deleted_at = COALESCE(deleted_at, ?), updated_at = ? WHERE id = ?",
        )
        .bind(author_token)
        .bind(DELETED_USER_PLACEHOLDER)
        .bind(feedback)
        .bind(ReviewStatus::PrivacyRemoved.as_str())
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("Review".to_string(), id))
        } else {
            Ok(())
        }
    }
}
