use crate::errors::{DomainError, DomainResult};
use crate::types::{parse_datetime, parse_optional_datetime, parse_optional_uuid, parse_uuid};
use crate::validation::{Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    Published,
    Deleted,
    PrivacyRemoved,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Published => "published",
            ReviewStatus::Deleted => "deleted",
            ReviewStatus::PrivacyRemoved => "privacy_removed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "published" => Some(ReviewStatus::Published),
            "deleted" => Some(ReviewStatus::Deleted),
            "privacy_removed" => Some(ReviewStatus::PrivacyRemoved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub property_id: Uuid,
    pub author_id: Option<Uuid>,
    pub author_token: Option<String>,
    pub author_username: String,
    pub feedback: String,
    pub rating: i64,
    pub status: ReviewStatus,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReview {
    pub property_id: Uuid,
    pub author_id: Uuid,
    pub author_username: String,
    pub feedback: String,
    pub rating: i64,
}

impl Validate for NewReview {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("rating", Some(self.rating))
            .range(1, 5)
            .validate()?;

        ValidationBuilder::new("feedback", Some(self.feedback.clone()))
            .max_length(5000)
            .validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    pub id: String,
    pub property_id: String,
    pub author_id: Option<String>,
    pub author_token: Option<String>,
    pub author_username: String,
    pub feedback: String,
    pub rating: i64,
    pub status: String,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ReviewRow {
    pub fn into_entity(self) -> DomainResult<Review> {
        Ok(Review {
            id: parse_uuid(&self.id)?,
            property_id: parse_uuid(&self.property_id)?,
            author_id: parse_optional_uuid(&self.author_id)?,
            author_token: self.author_token,
            author_username: self.author_username,
            feedback: self.feedback,
            rating: self.rating,
            status: ReviewStatus::from_str(&self.status)
                .ok_or_else(|| DomainError::Internal(format!("Invalid review status: {}", self.status)))?,
            is_deleted: self.is_deleted,
            deleted_at: parse_optional_datetime(&self.deleted_at, "deleted_at")?,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}
