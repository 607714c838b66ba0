use crate::domains::booking::{BookingRepository, BookingScope};
use crate::domains::core::booking_guard::BookingGuard;
use crate::domains::core::deletion_log::{DeletedModel, DeletionLog, DeletionLogTree, DeletionType};
use crate::domains::core::privacy::{scrub_personal_data, UserTokenGenerator};
use crate::domains::core::target::DeletionTarget;
use crate::domains::discount::DiscountRepository;
use crate::domains::landlord::{CompanyMembershipRepository, LandlordProfile, LandlordProfileRepository};
use crate::domains::property::{Property, PropertyRepository};
use crate::domains::review::ReviewRepository;
use crate::domains::user::{User, UserRepository};
use crate::errors::{DomainError, DomainResult};
use log::debug;
use sqlx::{Sqlite, Transaction};
use std::sync::Arc;

/// Repositories touched by a cascade
#[derive(Clone)]
pub struct CascadeRepositories {
    pub users: Arc<dyn UserRepository>,
    pub profiles: Arc<dyn LandlordProfileRepository>,
    pub memberships: Arc<dyn CompanyMembershipRepository>,
    pub properties: Arc<dyn PropertyRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub discounts: Arc<dyn DiscountRepository>,
}

/// Runs the recursive part of a deletion inside the caller's transaction.
///
/// Dependents are logged and mutated before the entity that owns them, and every
/// child log hangs off the log of its owner. Nothing here commits; the caller
/// decides whether the transaction survives.
#[derive(Clone)]
pub struct Cascade {
    repos: CascadeRepositories,
    guard: BookingGuard,
    tokens: UserTokenGenerator,
}

impl Cascade {
    pub fn new(repos: CascadeRepositories, tokens: UserTokenGenerator) -> Self {
        let guard = BookingGuard::new(repos.bookings.clone(), repos.profiles.clone());
        Self { repos, guard, tokens }
    }

    pub fn guard(&self) -> &BookingGuard {
        &self.guard
    }

    /// Pick the cascade for the target and the kind of deletion, returning the root log.
    pub async fn run(
        &self,
        log: &DeletionLogTree,
        target: &DeletionTarget,
        reason: Option<&str>,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<DeletionLog> {
        match (log.deletion_type(), target) {
            (DeletionType::SoftDelete, DeletionTarget::User(user)) => self.soft_user(log, user, reason, tx).await,
            (DeletionType::SoftDelete, DeletionTarget::LandlordProfile { profile, .. }) => {
                self.soft_landlord_profile(log, profile, reason, None, tx).await
            }
            (DeletionType::SoftDelete, DeletionTarget::Property { property, .. }) => {
                self.soft_property(log, property, reason, None, tx).await
            }
            (DeletionType::PrivacyDelete, DeletionTarget::User(user)) => {
                self.privacy_user(log, user, reason, tx).await
            }
            (DeletionType::PrivacyDelete, other) => Err(DomainError::Internal(format!(
                "Privacy delete is not supported for {}",
                other.model().type_name()
            ))),
        }
    }

    async fn open(
        &self,
        log: &DeletionLogTree,
        parent: Option<&DeletionLog>,
        model: DeletedModel,
        id: uuid::Uuid,
        reason: Option<&str>,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<DeletionLog> {
        match parent {
            Some(parent) => log.child(parent, model, id, tx).await,
            None => log.root(model, id, reason, tx).await,
        }
    }

    pub async fn soft_property(
        &self,
        log: &DeletionLogTree,
        property: &Property,
        reason: Option<&str>,
        parent: Option<&DeletionLog>,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<DeletionLog> {
        let entry = self.open(log, parent, DeletedModel::Property, property.id, reason, tx).await?;
        self.repos.properties.soft_delete_with_tx(property.id, tx).await?;
        Ok(entry)
    }

    async fn soft_memberships_of_company(
        &self,
        log: &DeletionLogTree,
        company: &LandlordProfile,
        parent: &DeletionLog,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        for membership in self.repos.memberships.find_live_by_company_with_tx(company.id, tx).await? {
            log.child(parent, DeletedModel::CompanyMembership, membership.id, tx).await?;
            self.repos.memberships.soft_delete_with_tx(membership.id, tx).await?;
        }
        Ok(())
    }

    async fn soft_properties_of(
        &self,
        log: &DeletionLogTree,
        owner: &LandlordProfile,
        parent: &DeletionLog,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        for property in self.repos.properties.find_live_by_owner_with_tx(owner.id, tx).await? {
            self.soft_property(log, &property, None, Some(parent), tx).await?;
        }
        Ok(())
    }

    /// Company memberships first, then the live properties, then the profile.
    pub async fn soft_landlord_profile(
        &self,
        log: &DeletionLogTree,
        profile: &LandlordProfile,
        reason: Option<&str>,
        parent: Option<&DeletionLog>,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<DeletionLog> {
        let entry = self
            .open(log, parent, DeletedModel::LandlordProfile, profile.id, reason, tx)
            .await?;

        if profile.is_company() {
            self.soft_memberships_of_company(log, profile, &entry, tx).await?;
        }
        self.soft_properties_of(log, profile, &entry, tx).await?;

        self.repos.profiles.soft_delete_with_tx(profile.id, tx).await?;
        Ok(entry)
    }

    async fn soft_memberships_of_user(
        &self,
        log: &DeletionLogTree,
        user: &User,
        parent: &DeletionLog,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        for membership in self.repos.memberships.find_live_by_user_with_tx(user.id, tx).await? {
            log.child(parent, DeletedModel::CompanyMembership, membership.id, tx).await?;
            self.repos.memberships.soft_delete_with_tx(membership.id, tx).await?;
        }
        Ok(())
    }

    pub async fn soft_user(
        &self,
        log: &DeletionLogTree,
        user: &User,
        reason: Option<&str>,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<DeletionLog> {
        let root = log.root(DeletedModel::User, user.id, reason, tx).await?;

        for review in self.repos.reviews.find_live_by_author_with_tx(user.id, tx).await? {
            log.child(&root, DeletedModel::Review, review.id, tx).await?;
            let feedback = scrub_personal_data(&review.feedback, user)?;
            self.repos.reviews.soft_delete_with_tx(review.id, &feedback, tx).await?;
        }

        if user.is_company_member() {
            self.soft_memberships_of_user(log, user, &root, tx).await?;
        } else {
            let profiles = self.guard.landlord_profiles_with_tx(user, tx).await?;
            for profile in profiles.iter().filter(|p| !p.is_deleted) {
                self.soft_landlord_profile(log, profile, None, Some(&root), tx).await?;
            }
        }

        self.repos.users.soft_delete_with_tx(user.id, tx).await?;
        debug!("Soft cascade of user {} finished", user.id);
        Ok(root)
    }

    async fn privacy_memberships_of_user(
        &self,
        log: &DeletionLogTree,
        user: &User,
        token: &str,
        parent: &DeletionLog,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        for membership in self.repos.memberships.find_by_user_with_tx(user.id, tx).await? {
            log.child(parent, DeletedModel::CompanyMembership, membership.id, tx).await?;
            self.repos.memberships.privacy_delete_with_tx(membership.id, token, tx).await?;
        }
        Ok(())
    }

    /// Logs the profile, soft deletes what it owns and tokenises the profile itself.
    async fn privacy_landlord_profile(
        &self,
        log: &DeletionLogTree,
        profile: &LandlordProfile,
        token: &str,
        parent: &DeletionLog,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let entry = log.child(parent, DeletedModel::LandlordProfile, profile.id, tx).await?;

        if profile.is_company() {
            self.soft_memberships_of_company(log, profile, &entry, tx).await?;
        }
        self.soft_properties_of(log, profile, &entry, tx).await?;

        self.repos.profiles.privacy_delete_with_tx(profile.id, Some(token), tx).await
    }

    pub async fn privacy_user(
        &self,
        log: &DeletionLogTree,
        user: &User,
        reason: Option<&str>,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<DeletionLog> {
        let token = self.tokens.moderation_token(user.id)?;
        let root = log.root(DeletedModel::User, user.id, reason, tx).await?;

        if let Some(profile) = self.repos.users.find_profile_by_user_with_tx(user.id, tx).await? {
            self.repos.users.privacy_delete_profile_with_tx(profile.id, &token, tx).await?;
        }

        for review in self.repos.reviews.find_by_author_with_tx(user.id, tx).await? {
            log.child(&root, DeletedModel::Review, review.id, tx).await?;
            let feedback = scrub_personal_data(&review.feedback, user)?;
            self.repos.reviews.privacy_delete_with_tx(review.id, &token, &feedback, tx).await?;
        }

        for booking in self.repos.bookings.find_all_with_tx(BookingScope::Guest(user.id), tx).await? {
            log.child(&root, DeletedModel::Booking, booking.id, tx).await?;
            self.repos.bookings.privacy_delete_with_tx(booking.id, &token, tx).await?;
        }

        if user.is_landlord || user.is_admin || user.is_moderator {
            for booking in self
                .repos
                .bookings
                .find_all_with_tx(BookingScope::CancelledBy(user.id), tx)
                .await?
            {
                self.repos
                    .bookings
                    .cancelled_by_privacy_delete_with_tx(booking.id, &token, tx)
                    .await?;
            }

            for discount in self.repos.discounts.find_created_by_with_tx(user.id, tx).await? {
                log.child(&root, DeletedModel::Discount, discount.id, tx).await?;
                self.repos.discounts.privacy_delete_with_tx(discount.id, &token, tx).await?;
            }
        }

        if user.is_company_member() {
            self.privacy_memberships_of_user(log, user, &token, &root, tx).await?;
        } else {
            for profile in self.guard.landlord_profiles_with_tx(user, tx).await? {
                if !profile.is_company() {
                    for booking in self
                        .repos
                        .bookings
                        .find_all_with_tx(BookingScope::AnyOwnerProperty(profile.id), tx)
                        .await?
                    {
                        self.repos
                            .bookings
                            .property_owner_privacy_delete_with_tx(booking.id, tx)
                            .await?;
                    }
                }
                self.privacy_landlord_profile(log, &profile, &token, &root, tx).await?;
            }
        }

        self.repos.users.privacy_delete_with_tx(user.id, tx).await?;
        debug!("Privacy cascade of user {} finished", user.id);
        Ok(root)
    }
}
