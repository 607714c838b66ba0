use crate::domains::booking::{Booking, BookingRepository, BookingScope};
use crate::domains::core::target::DeletionTarget;
use crate::domains::landlord::{LandlordProfile, LandlordProfileRepository};
use crate::domains::user::User;
use crate::errors::{DomainError, DomainResult};
use sqlx::{Sqlite, Transaction};
use std::collections::HashSet;
use std::sync::Arc;

/// Finds the active bookings that keep a target from being deleted
#[derive(Clone)]
pub struct BookingGuard {
    bookings: Arc<dyn BookingRepository>,
    profiles: Arc<dyn LandlordProfileRepository>,
}

fn ensure_profiles(user: &User, profiles: Vec<LandlordProfile>) -> DomainResult<Vec<LandlordProfile>> {
    if profiles.is_empty() {
        return Err(DomainError::Internal(format!("Missing Company Profile for user {}", user.id)));
    }
    Ok(profiles)
}

fn dedup(bookings: Vec<Booking>) -> Vec<Booking> {
    let mut seen = HashSet::new();
    bookings.into_iter().filter(|b| seen.insert(b.id)).collect()
}

impl BookingGuard {
    pub fn new(bookings: Arc<dyn BookingRepository>, profiles: Arc<dyn LandlordProfileRepository>) -> Self {
        Self { bookings, profiles }
    }

    /// Landlord profiles owned by the user. Company members own none.
    pub async fn landlord_profiles(&self, user: &User) -> DomainResult<Vec<LandlordProfile>> {
        if !user.owns_landlord_profiles() {
            return Ok(Vec::new());
        }
        let profiles = self.profiles.find_by_creator(user.id).await?;
        ensure_profiles(user, profiles)
    }

    pub async fn landlord_profiles_with_tx(
        &self,
        user: &User,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<LandlordProfile>> {
        if !user.owns_landlord_profiles() {
            return Ok(Vec::new());
        }
        let profiles = self.profiles.find_by_creator_with_tx(user.id, tx).await?;
        ensure_profiles(user, profiles)
    }

    /// Active bookings blocking the deletion, guest bookings first.
    pub async fn active_bookings(&self, target: &DeletionTarget) -> DomainResult<Vec<Booking>> {
        let mut found = Vec::new();
        match target {
            DeletionTarget::User(user) => {
                found.extend(self.bookings.find_active(BookingScope::Guest(user.id)).await?);
                for profile in self.landlord_profiles(user).await? {
                    found.extend(self.bookings.find_active(BookingScope::OwnerProfile(profile.id)).await?);
                }
            }
            DeletionTarget::LandlordProfile { profile, .. } => {
                found.extend(self.bookings.find_active(BookingScope::OwnerProfile(profile.id)).await?);
            }
            DeletionTarget::Property { property, .. } => {
                found.extend(self.bookings.find_active(BookingScope::Property(property.id)).await?);
            }
        }
        Ok(dedup(found))
    }

    /// Same lookup as [`active_bookings`](Self::active_bookings), read inside the deletion transaction.
    pub async fn active_bookings_with_tx(
        &self,
        target: &DeletionTarget,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<Booking>> {
        let mut found = Vec::new();
        match target {
            DeletionTarget::User(user) => {
                found.extend(self.bookings.find_active_with_tx(BookingScope::Guest(user.id), tx).await?);
                for profile in self.landlord_profiles_with_tx(user, tx).await? {
                    found.extend(
                        self.bookings
                            .find_active_with_tx(BookingScope::OwnerProfile(profile.id), tx)
                            .await?,
                    );
                }
            }
            DeletionTarget::LandlordProfile { profile, .. } => {
                found.extend(
                    self.bookings
                        .find_active_with_tx(BookingScope::OwnerProfile(profile.id), tx)
                        .await?,
                );
            }
            DeletionTarget::Property { property, .. } => {
                found.extend(
                    self.bookings
                        .find_active_with_tx(BookingScope::Property(property.id), tx)
                        .await?,
                );
            }
        }
        Ok(dedup(found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::booking::SqliteBookingRepository;
    use crate::domains::landlord::{LandlordProfileType, SqliteLandlordProfileRepository};
    use crate::domains::user::LandlordType;
    use crate::test_support::{
        memory_pool, seed_booking, seed_landlord, seed_property, seed_user, seed_user_with,
    };
    use rust_decimal_macros::dec;

    fn guard(pool: &sqlx::SqlitePool) -> BookingGuard {
        BookingGuard::new(
            Arc::new(SqliteBookingRepository::new(pool.clone())),
            Arc::new(SqliteLandlordProfileRepository::new(pool.clone())),
        )
    }

    #[tokio::test]
    async fn test_user_guard_covers_guest_and_owned_properties() {
        let pool = memory_pool().await;
        let landlord = seed_user_with(&pool, "host@example.com", LandlordType::Individual).await;
        let guest = seed_user(&pool, "guest@example.com").await;
        let profile = seed_landlord(&pool, &landlord, LandlordProfileType::Individual).await;
        let property = seed_property(&pool, &profile, dec!(90)).await;
        let booking = seed_booking(&pool, &property, &guest).await;
        let guard = guard(&pool);

        let for_guest = guard.active_bookings(&DeletionTarget::User(guest.clone())).await.unwrap();
        let for_host = guard.active_bookings(&DeletionTarget::User(landlord.clone())).await.unwrap();
        assert_eq!(for_guest.iter().map(|b| b.id).collect::<Vec<_>>(), vec![booking.id]);
        assert_eq!(for_host.iter().map(|b| b.id).collect::<Vec<_>>(), vec![booking.id]);

        let target = DeletionTarget::Property { property: property.clone(), owner: profile.clone() };
        let first = guard.active_bookings(&target).await.unwrap();
        let second = guard.active_bookings(&target).await.unwrap();
        assert_eq!(
            first.iter().map(|b| b.id).collect::<Vec<_>>(),
            second.iter().map(|b| b.id).collect::<Vec<_>>()
        );

        let mut tx = pool.begin().await.unwrap();
        let inside = guard.active_bookings_with_tx(&target, &mut tx).await.unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(inside.len(), first.len());
    }

    #[tokio::test]
    async fn test_closed_bookings_do_not_block() {
        let pool = memory_pool().await;
        let landlord = seed_user_with(&pool, "host@example.com", LandlordType::Individual).await;
        let guest = seed_user(&pool, "guest@example.com").await;
        let profile = seed_landlord(&pool, &landlord, LandlordProfileType::Individual).await;
        let property = seed_property(&pool, &profile, dec!(90)).await;
        let booking = seed_booking(&pool, &property, &guest).await;

        SqliteBookingRepository::new(pool.clone())
            .cancel(booking.id, guest.id, Some("Plans changed"))
            .await
            .unwrap();

        let target = DeletionTarget::LandlordProfile { profile, owner: Some(landlord) };
        assert!(guard(&pool).active_bookings(&target).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_landlord_without_profile_is_an_error() {
        let pool = memory_pool().await;
        let orphan = seed_user_with(&pool, "orphan@example.com", LandlordType::Company).await;
        let member = seed_user_with(&pool, "member@example.com", LandlordType::CompanyMember).await;
        let guard = guard(&pool);

        let err = guard.active_bookings(&DeletionTarget::User(orphan.clone())).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Internal error: Missing Company Profile for user {}", orphan.id)
        );
        assert!(guard.landlord_profiles(&member).await.unwrap().is_empty());
    }
}
