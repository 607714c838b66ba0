use crate::errors::{DomainError, DomainResult};
use crate::types::{parse_datetime, parse_decimal, parse_optional_datetime, parse_uuid};
use crate::validation::{Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyStatus {
    Available,
    Unavailable,
    Deleted,
}

impl PropertyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyStatus::Available => "available",
            PropertyStatus::Unavailable => "unavailable",
            PropertyStatus::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(PropertyStatus::Available),
            "unavailable" => Some(PropertyStatus::Unavailable),
            "deleted" => Some(PropertyStatus::Deleted),
            _ => None,
        }
    }
}

/// A rentable listing owned by a landlord profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub base_price: Decimal,
    pub taxes_fees: Decimal,
    pub status: PropertyStatus,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProperty {
    pub owner_id: Uuid,
    pub title: String,
    pub base_price: Decimal,
    pub taxes_fees: Decimal,
}

impl Validate for NewProperty {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("title", Some(self.title.clone()))
            .required()
            .max_length(255)
            .validate()?;

        ValidationBuilder::new("base_price", Some(self.base_price))
            .min(Decimal::new(1, 2))
            .validate()?;

        ValidationBuilder::new("taxes_fees", Some(self.taxes_fees))
            .min(Decimal::ZERO)
            .validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PropertyRow {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub base_price: String,
    pub taxes_fees: String,
    pub status: String,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PropertyRow {
    pub fn into_entity(self) -> DomainResult<Property> {
        Ok(Property {
            id: parse_uuid(&self.id)?,
            owner_id: parse_uuid(&self.owner_id)?,
            title: self.title,
            base_price: parse_decimal(&self.base_price, "base_price")?,
            taxes_fees: parse_decimal(&self.taxes_fees, "taxes_fees")?,
            status: PropertyStatus::from_str(&self.status)
                .ok_or_else(|| DomainError::Internal(format!("Invalid property status: {}", self.status)))?,
            is_deleted: self.is_deleted,
            deleted_at: parse_optional_datetime(&self.deleted_at, "deleted_at")?,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}
