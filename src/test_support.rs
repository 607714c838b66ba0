//! Fixtures shared by the unit tests: an in-memory database and seeded rows.

use crate::db_migration::run_migrations;
use crate::domains::booking::{Booking, BookingRepository, BookingStatus, NewBooking, SqliteBookingRepository};
use crate::domains::core::cascade::CascadeRepositories;
use crate::domains::core::notification::{EmailMessage, Mailer};
use crate::domains::discount::{DiscountStatus, DiscountType, DiscountValueType, NewDiscount, SqliteDiscountRepository};
use crate::domains::landlord::{
    CompanyMembership, CompanyMembershipRepository, LandlordProfile, LandlordProfileRepository, LandlordProfileType,
    MembershipRole, NewCompanyMembership, NewLandlordProfile, SqliteCompanyMembershipRepository,
    SqliteLandlordProfileRepository,
};
use crate::domains::property::{NewProperty, Property, PropertyRepository, PropertyStatus, SqlitePropertyRepository};
use crate::domains::review::{NewReview, Review, ReviewRepository, SqliteReviewRepository};
use crate::domains::user::{LandlordType, NewUser, SqliteUserRepository, User, UserRepository};
use crate::errors::{ServiceError, ServiceResult};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Single connection, so every test sees one private database.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

pub fn cascade_repositories(pool: &SqlitePool) -> CascadeRepositories {
    CascadeRepositories {
        users: Arc::new(SqliteUserRepository::new(pool.clone())),
        profiles: Arc::new(SqliteLandlordProfileRepository::new(pool.clone())),
        memberships: Arc::new(SqliteCompanyMembershipRepository::new(pool.clone())),
        properties: Arc::new(SqlitePropertyRepository::new(pool.clone())),
        bookings: Arc::new(SqliteBookingRepository::new(pool.clone())),
        reviews: Arc::new(SqliteReviewRepository::new(pool.clone())),
        discounts: Arc::new(SqliteDiscountRepository::new(pool.clone())),
    }
}

fn local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn new_user(email: &str) -> NewUser {
    let local = local_part(email);
    let mut names = local.split(|c: char| !c.is_alphabetic()).filter(|w| !w.is_empty());
    NewUser {
        email: email.to_string(),
        username: Some(local.replace('.', "_")),
        first_name: names.next().map(capitalized).unwrap_or_default(),
        last_name: names.next().map(capitalized).unwrap_or_default(),
        date_of_birth: None,
        password: "correct horse battery staple".to_string(),
        is_admin: false,
        is_moderator: false,
        is_landlord: false,
        landlord_type: None,
    }
}

pub async fn seed_user(pool: &SqlitePool, email: &str) -> User {
    SqliteUserRepository::new(pool.clone())
        .create(&new_user(email))
        .await
        .unwrap()
}

pub async fn seed_user_with(pool: &SqlitePool, email: &str, landlord_type: LandlordType) -> User {
    let mut input = new_user(email);
    input.is_landlord = landlord_type != LandlordType::None;
    input.landlord_type = Some(landlord_type);
    SqliteUserRepository::new(pool.clone()).create(&input).await.unwrap()
}

/// An administrator, or a moderator when `is_admin` is false.
pub async fn seed_admin(pool: &SqlitePool, email: &str, is_admin: bool) -> User {
    let mut input = new_user(email);
    input.is_admin = is_admin;
    input.is_moderator = !is_admin;
    SqliteUserRepository::new(pool.clone()).create(&input).await.unwrap()
}

pub async fn seed_landlord(pool: &SqlitePool, user: &User, profile_type: LandlordProfileType) -> LandlordProfile {
    let name = match profile_type {
        LandlordProfileType::Company => format!("{} Rentals Ltd", capitalized(local_part(&user.email))),
        LandlordProfileType::Individual => user.full_name(),
    };
    SqliteLandlordProfileRepository::new(pool.clone())
        .create(&NewLandlordProfile {
            profile_type,
            name: if name.trim().is_empty() { "Host".to_string() } else { name },
            email: user.email.clone(),
            phone: "+48 600 100 200".to_string(),
            address: "1 Harbour Street".to_string(),
            description: String::new(),
            created_by: user.id,
        })
        .await
        .unwrap()
}

pub async fn seed_membership(
    pool: &SqlitePool,
    company: &LandlordProfile,
    user: &User,
    role: MembershipRole,
) -> CompanyMembership {
    SqliteCompanyMembershipRepository::new(pool.clone())
        .create(&NewCompanyMembership {
            company_id: company.id,
            user_id: user.id,
            role,
        })
        .await
        .unwrap()
}

pub async fn seed_property(pool: &SqlitePool, owner: &LandlordProfile, base_price: Decimal) -> Property {
    SqlitePropertyRepository::new(pool.clone())
        .create(&NewProperty {
            owner_id: owner.id,
            title: format!("Apartment at {}", base_price),
            base_price,
            taxes_fees: Decimal::ZERO,
        })
        .await
        .unwrap()
}

/// A pending booking a week from now.
pub async fn seed_booking(pool: &SqlitePool, property: &Property, guest: &User) -> Booking {
    let check_in = Utc::now().date_naive() + Duration::days(7);
    SqliteBookingRepository::new(pool.clone())
        .create(&NewBooking {
            property_id: property.id,
            guest_id: guest.id,
            check_in_date: check_in,
            check_out_date: check_in + Duration::days(3),
        })
        .await
        .unwrap()
}

pub async fn seed_review(pool: &SqlitePool, property: &Property, author: &User, feedback: &str) -> Review {
    SqliteReviewRepository::new(pool.clone())
        .create(&NewReview {
            property_id: property.id,
            author_id: author.id,
            author_username: author
                .username
                .clone()
                .unwrap_or_else(|| local_part(&author.email).to_string()),
            feedback: feedback.to_string(),
            rating: 5,
        })
        .await
        .unwrap()
}

/// Active percentage discount without a creator. Seasonal ones start in a minute.
pub fn new_discount(name: &str, discount_type: DiscountType, value: Decimal) -> NewDiscount {
    let now = Utc::now();
    let (valid_from, valid_until) = match discount_type {
        DiscountType::Seasonal => (Some(now + Duration::minutes(1)), Some(now + Duration::days(30))),
        _ => (None, None),
    };
    NewDiscount {
        name: name.to_string(),
        description: String::new(),
        discount_type,
        value_type: DiscountValueType::Percentage,
        value,
        currency: None,
        priority: None,
        status: DiscountStatus::Active,
        valid_from,
        valid_until,
        compatible: true,
        incompatible_with: Vec::new(),
        is_admin_created: true,
        created_by: None,
    }
}

pub fn sample_user(email: &str) -> User {
    let input = new_user(email);
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: input.email,
        username: input.username,
        first_name: input.first_name,
        last_name: input.last_name,
        date_of_birth: None,
        is_admin: false,
        is_moderator: false,
        is_landlord: false,
        landlord_type: LandlordType::None,
        is_verified: true,
        is_deleted: false,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_profile(name: &str, profile_type: LandlordProfileType) -> LandlordProfile {
    let now = Utc::now();
    LandlordProfile {
        id: Uuid::new_v4(),
        profile_type,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        phone: "+48 600 100 200".to_string(),
        address: "1 Harbour Street".to_string(),
        description: String::new(),
        created_by: Some(Uuid::new_v4()),
        created_by_token: None,
        is_deleted: false,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_property(owner: &LandlordProfile, title: &str) -> Property {
    let now = Utc::now();
    Property {
        id: Uuid::new_v4(),
        owner_id: owner.id,
        title: title.to_string(),
        base_price: Decimal::new(10000, 2),
        taxes_fees: Decimal::ZERO,
        status: PropertyStatus::Available,
        is_deleted: false,
        deleted_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_booking() -> Booking {
    let now = Utc::now();
    let check_in = now.date_naive() + Duration::days(7);
    Booking {
        id: Uuid::new_v4(),
        property_id: Uuid::new_v4(),
        guest_id: Some(Uuid::new_v4()),
        guest_token: None,
        check_in_date: check_in,
        check_out_date: check_in + Duration::days(2),
        status: BookingStatus::Confirmed,
        is_active: true,
        cancelled_by: None,
        cancelled_by_token: None,
        cancellation_reason: None,
        cancelled_at: None,
        snapshot: None,
        created_at: now,
        updated_at: now,
    }
}

/// Mailer that keeps every batch it was asked to send
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Vec<EmailMessage>>>,
    fail_next: AtomicBool,
}

impl RecordingMailer {
    /// Make the next send fail without recording anything.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<Vec<EmailMessage>> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, messages: Vec<EmailMessage>) -> ServiceResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ServiceError::ExternalService("mail server unavailable".to_string()));
        }
        self.sent.lock().unwrap().push(messages);
        Ok(())
    }
}
