use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::types::{parse_datetime, parse_optional_datetime, parse_optional_uuid, parse_uuid};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::validation::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            _ => None,
        }
    }

    /// Cancelled and completed bookings are closed and carry a snapshot
    pub fn is_closed(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }
}

/// Point-in-time copy of the parties of a booking, taken when it closes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingSnapshot {
    pub property_title: Option<String>,
    pub property_owner_name: Option<String>,
    pub property_owner_email: Option<String>,
    pub property_owner_type: Option<String>,
    pub guest: Option<Uuid>,
    pub guest_token: Option<String>,
    pub guest_full_name: Option<String>,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_by_token: Option<String>,
    pub cancellation_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub property_id: Uuid,
    pub guest_id: Option<Uuid>,
    pub guest_token: Option<String>,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub status: BookingStatus,
    pub is_active: bool,
    pub cancelled_by: Option<Uuid>,
    pub cancelled_by_token: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub snapshot: Option<BookingSnapshot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Detach the guest, keeping only the opaque token. A guest who also cancelled
    /// the booking loses that reference too.
    pub fn depersonalize_guest(&mut self, guest_token: &str) {
        if self.guest_id.is_none() {
            return;
        }

        let guest_cancelled = self.cancelled_by.is_some() && self.cancelled_by == self.guest_id;
        let snapshot = self.snapshot.get_or_insert_with(BookingSnapshot::default);

        snapshot.guest = None;
        snapshot.guest_token = Some(guest_token.to_string());
        snapshot.guest_full_name = None;
        snapshot.guest_email = None;
        snapshot.guest_phone = None;

        if guest_cancelled {
            snapshot.cancelled_by = None;
            snapshot.cancelled_by_token = Some(guest_token.to_string());
            self.cancelled_by = None;
            self.cancelled_by_token = Some(guest_token.to_string());
        }

        self.guest_token = Some(guest_token.to_string());
        self.guest_id = None;
    }

    /// Replace the cancelling user with the opaque token.
    pub fn depersonalize_canceller(&mut self, cancelled_by_token: &str) {
        if self.cancelled_by.is_none() {
            return;
        }

        let snapshot = self.snapshot.get_or_insert_with(BookingSnapshot::default);
        snapshot.cancelled_by = None;
        snapshot.cancelled_by_token = Some(cancelled_by_token.to_string());

        self.cancelled_by = None;
        self.cancelled_by_token = Some(cancelled_by_token.to_string());
    }

    pub fn depersonalize_property_owner(&mut self) {
        if let Some(snapshot) = self.snapshot.as_mut() {
            snapshot.property_owner_name = None;
            snapshot.property_owner_email = None;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub property_id: Uuid,
    pub guest_id: Uuid,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
}

impl Validate for NewBooking {
    fn validate(&self) -> DomainResult<()> {
        if self.check_out_date <= self.check_in_date {
            return Err(DomainError::Validation(ValidationError::invalid_value(
                "check_out_date",
                "must be after the check-in date",
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct BookingRow {
    pub id: String,
    pub property_id: String,
    pub guest_id: Option<String>,
    pub guest_token: Option<String>,
    pub check_in_date: String,
    pub check_out_date: String,
    pub status: String,
    pub is_active: bool,
    pub cancelled_by: Option<String>,
    pub cancelled_by_token: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<String>,
    pub snapshot_data: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn parse_date(value: &str, field: &str) -> DomainResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| DomainError::Internal(format!("Invalid {} format: {}", field, value)))
}

impl BookingRow {
    pub fn into_entity(self) -> DomainResult<Booking> {
        let snapshot = self
            .snapshot_data
            .as_deref()
            .map(|raw| {
                serde_json::from_str::<BookingSnapshot>(raw)
                    .map_err(|e| DomainError::Internal(format!("Invalid snapshot data: {}", e)))
            })
            .transpose()?;

        Ok(Booking {
            id: parse_uuid(&self.id)?,
            property_id: parse_uuid(&self.property_id)?,
            guest_id: parse_optional_uuid(&self.guest_id)?,
            guest_token: self.guest_token,
            check_in_date: parse_date(&self.check_in_date, "check_in_date")?,
            check_out_date: parse_date(&self.check_out_date, "check_out_date")?,
            status: BookingStatus::from_str(&self.status)
                .ok_or_else(|| DomainError::Internal(format!("Invalid booking status: {}", self.status)))?,
            is_active: self.is_active,
            cancelled_by: parse_optional_uuid(&self.cancelled_by)?,
            cancelled_by_token: self.cancelled_by_token,
            cancellation_reason: self.cancellation_reason,
            cancelled_at: parse_optional_datetime(&self.cancelled_at, "cancelled_at")?,
            snapshot,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}
