use crate::domains::booking::types::{Booking, BookingRow, BookingSnapshot, BookingStatus, NewBooking};
use crate::domains::core::repository::FindById;
use crate::errors::{DbError, DomainError, DomainResult, ValidationError};
use crate::validation::Validate;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, Executor, FromRow, Pool, Sqlite, Transaction};
use uuid::Uuid;

const BOOKING_COLUMNS: &str = "id, property_id, guest_id, guest_token, check_in_date, check_out_date, \
    status, is_active, cancelled_by, cancelled_by_token, cancellation_reason, cancelled_at, snapshot_data, \
    created_at, updated_at";

/// Which side of a booking a lookup starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingScope {
    Guest(Uuid),
    CancelledBy(Uuid),
    /// Bookings on the live properties of a landlord profile
    OwnerProfile(Uuid),
    /// Bookings on every property of a landlord profile, deleted ones included
    AnyOwnerProperty(Uuid),
    Property(Uuid),
}

impl BookingScope {
    fn where_clause(&self) -> &'static str {
        match self {
            BookingScope::Guest(_) => "guest_id = ?",
            BookingScope::CancelledBy(_) => "cancelled_by = ?",
            BookingScope::OwnerProfile(_) => {
                "property_id IN (SELECT id FROM properties WHERE owner_id = ? AND is_deleted = 0)"
            }
            BookingScope::AnyOwnerProperty(_) => {
                "property_id IN (SELECT id FROM properties WHERE owner_id = ?)"
            }
            BookingScope::Property(_) => "property_id = ?",
        }
    }

    fn id(&self) -> Uuid {
        match self {
            BookingScope::Guest(id)
            | BookingScope::CancelledBy(id)
            | BookingScope::OwnerProfile(id)
            | BookingScope::AnyOwnerProperty(id)
            | BookingScope::Property(id) => *id,
        }
    }
}

#[async_trait]
pub trait BookingRepository: FindById<Booking> + Send + Sync {
    async fn create(&self, new_booking: &NewBooking) -> DomainResult<Booking>;

    async fn confirm(&self, id: Uuid) -> DomainResult<Booking>;

    /// Close the booking as cancelled, capturing the snapshot.
    async fn cancel(&self, id: Uuid, cancelled_by: Uuid, reason: Option<&str>) -> DomainResult<Booking>;

    /// Close the booking as completed, capturing the snapshot.
    async fn complete(&self, id: Uuid) -> DomainResult<Booking>;

    async fn find_active(&self, scope: BookingScope) -> DomainResult<Vec<Booking>>;

    async fn find_active_with_tx(
        &self,
        scope: BookingScope,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<Booking>>;

    async fn find_all_with_tx(
        &self,
        scope: BookingScope,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<Booking>>;

    async fn privacy_delete_with_tx(
        &self,
        id: Uuid,
        guest_token: &str,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;

    async fn cancelled_by_privacy_delete_with_tx(
        &self,
        id: Uuid,
        cancelled_by_token: &str,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;

    async fn property_owner_privacy_delete_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;
}

/// Parties of a booking as they look right now
#[derive(Debug, FromRow)]
struct SnapshotSourceRow {
    property_title: String,
    owner_name: String,
    owner_email: String,
    owner_type: String,
    guest_id: Option<String>,
    guest_first_name: Option<String>,
    guest_last_name: Option<String>,
    guest_email: Option<String>,
    guest_phone: Option<String>,
}

/// SQLite implementation for BookingRepository
#[derive(Debug, Clone)]
pub struct SqliteBookingRepository {
    pool: Pool<Sqlite>,
}

impl SqliteBookingRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn fetch<'e, E>(executor: E, scope: BookingScope, active_only: bool) -> DomainResult<Vec<Booking>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let active_filter = if active_only { " AND is_active = 1" } else { "" };
        let sql = format!(
            "SELECT {} FROM bookings WHERE {}{} ORDER BY check_in_date ASC, created_at ASC",
            BOOKING_COLUMNS,
            scope.where_clause(),
            active_filter
        );

        let rows = query_as::<_, BookingRow>(&sql)
            .bind(scope.id().to_string())
            .fetch_all(executor)
            .await
            .map_err(DbError::from)?;

        rows.into_iter().map(BookingRow::into_entity).collect()
    }

    async fn find_by_id_with_tx(&self, id: Uuid, tx: &mut Transaction<'_, Sqlite>) -> DomainResult<Booking> {
        let row = query_as::<_, BookingRow>(&format!("SELECT {} FROM bookings WHERE id = ?", BOOKING_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("Booking".to_string(), id))?;

        row.into_entity()
    }

    async fn save_privacy_fields_with_tx(
        &self,
        booking: &Booking,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let snapshot_data = booking
            .snapshot
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DomainError::Internal(format!("Failed to encode snapshot data: {}", e)))?;

        let result = query(
            "UPDATE bookings SET guest_id = ?, guest_token = ?, cancelled_by = ?, cancelled_by_token = ?, \
             snapshot_data = ?, updated_at = ? WHERE id = ?",
        )
        .bind(booking.guest_id.map(|id| id.to_string()))
        .bind(&booking.guest_token)
        .bind(booking.cancelled_by.map(|id| id.to_string()))
        .bind(&booking.cancelled_by_token)
        .bind(snapshot_data)
        .bind(Utc::now().to_rfc3339())
        .bind(booking.id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("Booking".to_string(), booking.id))
        } else {
            Ok(())
        }
    }

    async fn close(
        &self,
        id: Uuid,
        status: BookingStatus,
        cancelled_by: Option<Uuid>,
        reason: Option<&str>,
    ) -> DomainResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            let booking = self.find_by_id_with_tx(id, &mut tx).await?;
            if !booking.is_active {
                return Err(DomainError::Validation(ValidationError::custom("Booking is already closed.")));
            }

            let source = query_as::<_, SnapshotSourceRow>(
                "SELECT p.title AS property_title, lp.name AS owner_name, lp.email AS owner_email, \
                 lp.type AS owner_type, u.id AS guest_id, u.first_name AS guest_first_name, \
                 u.last_name AS guest_last_name, u.email AS guest_email, up.phone AS guest_phone \
                 FROM bookings b \
                 JOIN properties p ON p.id = b.property_id \
                 JOIN landlord_profiles lp ON lp.id = p.owner_id \
                 LEFT JOIN users u ON u.id = b.guest_id \
                 LEFT JOIN user_profiles up ON up.user_id = u.id \
                 WHERE b.id = ?",
            )
            .bind(id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(DbError::from)?;

            let guest_full_name = match (&source.guest_first_name, &source.guest_last_name) {
                (Some(first), Some(last)) => Some(format!("{} {}", first, last).trim().to_string()),
                _ => None,
            };

            let snapshot = BookingSnapshot {
                property_title: Some(source.property_title),
                property_owner_name: Some(source.owner_name),
                property_owner_email: Some(source.owner_email),
                property_owner_type: Some(source.owner_type),
                guest: crate::types::parse_optional_uuid(&source.guest_id)?,
                guest_token: None,
                guest_full_name,
                guest_email: source.guest_email,
                guest_phone: source.guest_phone,
                cancelled_by,
                cancelled_by_token: None,
                cancellation_reason: reason.map(str::to_string),
            };
            let snapshot_json = serde_json::to_string(&snapshot)
                .map_err(|e| DomainError::Internal(format!("Failed to encode snapshot data: {}", e)))?;

            let now = Utc::now().to_rfc3339();
            query(
                "UPDATE bookings SET status = ?, is_active = 0, cancelled_by = ?, cancellation_reason = ?, \
                 cancelled_at = COALESCE(cancelled_at, ?), snapshot_data = ?, updated_at = ? WHERE id = ?",
            )
            .bind(status.as_str())
            .bind(cancelled_by.map(|u| u.to_string()))
            .bind(reason)
            .bind(&now)
            .bind(snapshot_json)
            .bind(&now)
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;

            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
                self.find_by_id(id).await
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl FindById<Booking> for SqliteBookingRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Booking> {
        let row = query_as::<_, BookingRow>(&format!("SELECT {} FROM bookings WHERE id = ?", BOOKING_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("Booking".to_string(), id))?;

        row.into_entity()
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn create(&self, new_booking: &NewBooking) -> DomainResult<Booking> {
        new_booking.validate()?;

        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        query(
            "INSERT INTO bookings (id, property_id, guest_id, check_in_date, check_out_date, status, \
             is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id.to_string())
        .bind(new_booking.property_id.to_string())
        .bind(new_booking.guest_id.to_string())
        .bind(new_booking.check_in_date.format("%Y-%m-%d").to_string())
        .bind(new_booking.check_out_date.format("%Y-%m-%d").to_string())
        .bind(BookingStatus::Pending.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        self.find_by_id(id).await
    }

    async fn confirm(&self, id: Uuid) -> DomainResult<Booking> {
        let result = query("UPDATE bookings SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(BookingStatus::Confirmed.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .bind(BookingStatus::Pending.as_str())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::EntityNotFound("Booking".to_string(), id));
        }
        self.find_by_id(id).await
    }

    async fn cancel(&self, id: Uuid, cancelled_by: Uuid, reason: Option<&str>) -> DomainResult<Booking> {
        self.close(id, BookingStatus::Cancelled, Some(cancelled_by), reason).await
    }

    async fn complete(&self, id: Uuid) -> DomainResult<Booking> {
        self.close(id, BookingStatus::Completed, None, None).await
    }

    async fn find_active(&self, scope: BookingScope) -> DomainResult<Vec<Booking>> {
        Self::fetch(&self.pool, scope, true).await
    }

    async fn find_active_with_tx(
        &self,
        scope: BookingScope,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<Booking>> {
        Self::fetch(&mut **tx, scope, true).await
    }

    async fn find_all_with_tx(
        &self,
        scope: BookingScope,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<Booking>> {
        Self::fetch(&mut **tx, scope, false).await
    }

    async fn privacy_delete_with_tx(
        &self,
        id: Uuid,
        guest_token: &str,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let mut booking = self.find_by_id_with_tx(id, tx).await?;
        booking.depersonalize_guest(guest_token);
        self.save_privacy_fields_with_tx(&booking, tx).await
    }

    async fn cancelled_by_privacy_delete_with_tx(
        &self,
        id: Uuid,
        cancelled_by_token: &str,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let mut booking = self.find_by_id_with_tx(id, tx).await?;
        booking.depersonalize_canceller(cancelled_by_token);
        self.save_privacy_fields_with_tx(&booking, tx).await
    }

    async fn property_owner_privacy_delete_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let mut booking = self.find_by_id_with_tx(id, tx).await?;
        booking.depersonalize_property_owner();
        self.save_privacy_fields_with_tx(&booking, tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::landlord::LandlordProfileType;
    use crate::test_support::{memory_pool, seed_booking, seed_landlord, seed_property, seed_user};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_cancel_captures_snapshot() {
        let pool = memory_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let guest = seed_user(&pool, "guest@example.com").await;
        let profile = seed_landlord(&pool, &owner, LandlordProfileType::Individual).await;
        let property = seed_property(&pool, &profile, dec!(80)).await;
        let booking = seed_booking(&pool, &property, &guest).await;
        let repo = SqliteBookingRepository::new(pool);

        let cancelled = repo.cancel(booking.id, guest.id, Some("plans changed")).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(!cancelled.is_active);
        assert!(cancelled.cancelled_at.is_some());

        let snapshot = cancelled.snapshot.unwrap();
        assert_eq!(snapshot.property_title.as_deref(), Some(property.title.as_str()));
        assert_eq!(snapshot.property_owner_email.as_deref(), Some(profile.email.as_str()));
        assert_eq!(snapshot.guest, Some(guest.id));
        assert_eq!(snapshot.guest_email.as_deref(), Some("guest@example.com"));
        assert_eq!(snapshot.cancelled_by, Some(guest.id));

        assert!(repo.cancel(booking.id, guest.id, None).await.is_err());
    }

    #[tokio::test]
    async fn test_scopes_select_active_bookings() {
        let pool = memory_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let guest = seed_user(&pool, "guest@example.com").await;
        let profile = seed_landlord(&pool, &owner, LandlordProfileType::Company).await;
        let first = seed_property(&pool, &profile, dec!(80)).await;
        let second = seed_property(&pool, &profile, dec!(90)).await;
        let active = seed_booking(&pool, &first, &guest).await;
        let closed = seed_booking(&pool, &second, &guest).await;
        let repo = SqliteBookingRepository::new(pool.clone());
        repo.complete(closed.id).await.unwrap();

        let by_guest = repo.find_active(BookingScope::Guest(guest.id)).await.unwrap();
        assert_eq!(by_guest.iter().map(|b| b.id).collect::<Vec<_>>(), vec![active.id]);

        let by_owner = repo.find_active(BookingScope::OwnerProfile(profile.id)).await.unwrap();
        assert_eq!(by_owner.len(), 1);

        assert!(repo.find_active(BookingScope::Property(second.id)).await.unwrap().is_empty());

        let mut tx = pool.begin().await.unwrap();
        let all = repo.find_all_with_tx(BookingScope::Guest(guest.id), &mut tx).await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_privacy_delete_persists_scrubbed_snapshot() {
        let pool = memory_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let guest = seed_user(&pool, "guest@example.com").await;
        let profile = seed_landlord(&pool, &owner, LandlordProfileType::Individual).await;
        let property = seed_property(&pool, &profile, dec!(80)).await;
        let booking = seed_booking(&pool, &property, &guest).await;
        let repo = SqliteBookingRepository::new(pool.clone());
        repo.cancel(booking.id, guest.id, None).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        repo.privacy_delete_with_tx(booking.id, "guest-token", &mut tx).await.unwrap();
        repo.property_owner_privacy_delete_with_tx(booking.id, &mut tx).await.unwrap();
        tx.commit().await.unwrap();

        let scrubbed = repo.find_by_id(booking.id).await.unwrap();
        assert_eq!(scrubbed.guest_id, None);
        assert_eq!(scrubbed.cancelled_by, None);
        assert_eq!(scrubbed.cancelled_by_token.as_deref(), Some("guest-token"));
        let snapshot = scrubbed.snapshot.unwrap();
        assert_eq!(snapshot.guest_email, None);
        assert_eq!(snapshot.property_owner_email, None);
    }
}
