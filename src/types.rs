use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};

// Re-export UserRole and Permission from the permission module
pub use crate::domains::permission::{UserRole, Permission};

/// Placeholder written over author names and scrubbed personal fragments
pub const DELETED_USER_PLACEHOLDER: &str = "deleted_user";

/// Placeholder written over the name of a depersonalized individual landlord
pub const DELETED_LANDLORD_PLACEHOLDER: &str = "Deleted landlord";

// --- Row conversion helpers shared by the SQLite repositories ---

pub fn parse_uuid(value: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| DomainError::InvalidUuid(value.to_string()))
}

pub fn parse_optional_uuid(value: &Option<String>) -> DomainResult<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}

pub fn parse_datetime(value: &str, field: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DomainError::Internal(format!("Invalid {} format: {}", field, value)))
}

pub fn parse_optional_datetime(value: &Option<String>, field: &str) -> DomainResult<Option<DateTime<Utc>>> {
    value.as_deref().map(|v| parse_datetime(v, field)).transpose()
}

pub fn parse_decimal(value: &str, field: &str) -> DomainResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|_| DomainError::Internal(format!("Invalid {} amount: {}", field, value)))
}

/// Fixed-width RFC 3339 text, so stored timestamps compare correctly as strings
pub fn to_db_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn to_db_optional_timestamp(value: &Option<DateTime<Utc>>) -> Option<String> {
    value.as_ref().map(to_db_timestamp)
}
