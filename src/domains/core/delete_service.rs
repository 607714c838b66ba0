use crate::auth::AuthContext;
use crate::config::AppConfig;
use crate::domains::booking::Booking;
use crate::domains::core::cascade::{Cascade, CascadeRepositories};
use crate::domains::core::deletion_log::{DeletionLog, DeletionLogRepository, DeletionLogTree, DeletionType};
use crate::domains::core::notification::{Mailer, NotificationDispatcher, NotificationStrategy};
use crate::domains::core::privacy::UserTokenGenerator;
use crate::domains::core::target::DeletionTarget;
use crate::domains::landlord::LandlordProfile;
use crate::domains::user::depersonalized_email;
use crate::errors::{DbError, DomainError, DomainResult, ServiceError, ServiceResult, ValidationError};
use crate::types::Permission;
use crate::validation::ValidationBuilder;
use log::{debug, error, info, warn};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

pub const PRIVACY_USER_ONLY: &str = "Only user accounts can be depersonalised.";
pub const ALREADY_DEPERSONALISED: &str = "Account data is already depersonalised.";

/// Progress of one deletion request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionState {
    Created,
    PermissionChecked,
    Guarded,
    /// Active bookings were found; nothing was changed
    Blocked,
    Deleting,
    Deleted,
    Notified,
    Errored,
}

/// What `execute` did
#[derive(Debug, Clone)]
pub enum DeleteOutcome {
    Deleted { root_log_id: Uuid },
    Blocked { bookings: Vec<Booking> },
    Failed,
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted { .. })
    }
}

/// Result of the transactional step
enum CascadeStep {
    Done(DeletionLog),
    Blocked(Vec<Booking>),
}

/// Entry point for soft deletes and depersonalisation of users, landlord profiles and properties
#[derive(Clone)]
pub struct CascadeDeleteService {
    pool: SqlitePool,
    cascade: Cascade,
    repos: CascadeRepositories,
    logs: Arc<dyn DeletionLogRepository>,
    mailer: Arc<dyn Mailer>,
    config: AppConfig,
}

fn require_reason(reason: Option<&str>) -> DomainResult<()> {
    ValidationBuilder::new("reason", reason.map(|r| r.trim().to_string()))
        .required()
        .validate()
}

fn check_reason_length(reason: Option<&str>) -> DomainResult<()> {
    if reason.is_none() {
        return Ok(());
    }
    ValidationBuilder::new("reason", reason.map(str::to_string))
        .min_length(7)
        .max_length(2000)
        .validate()
}

impl CascadeDeleteService {
    pub fn new(
        pool: SqlitePool,
        repos: CascadeRepositories,
        logs: Arc<dyn DeletionLogRepository>,
        mailer: Arc<dyn Mailer>,
        config: &AppConfig,
    ) -> Self {
        let cascade = Cascade::new(repos.clone(), UserTokenGenerator::new(config));
        Self {
            pool,
            cascade,
            repos,
            logs,
            mailer,
            config: config.clone(),
        }
    }

    /// Users who may delete the profile as its owners
    async fn profile_owners(&self, profile: &LandlordProfile) -> DomainResult<Vec<Uuid>> {
        if profile.is_company() {
            self.repos.profiles.find_admin_ids(profile).await
        } else {
            Ok(profile.created_by.into_iter().collect())
        }
    }

    async fn soft_strategy(&self, target: &DeletionTarget, actor: &AuthContext, reason: Option<&str>) -> ServiceResult<NotificationStrategy> {
        let (self_service, own_permission, moderator_permission) = match target {
            DeletionTarget::User(user) => (
                actor.is_user(&user.id),
                Permission::DeleteOwnAccount,
                Permission::DeleteAnyAccount,
            ),
            DeletionTarget::LandlordProfile { profile, .. } => (
                self.profile_owners(profile).await?.contains(&actor.user_id),
                Permission::DeleteOwnListings,
                Permission::DeleteAnyLandlordProfile,
            ),
            DeletionTarget::Property { owner, .. } => (
                self.profile_owners(owner).await?.contains(&actor.user_id),
                Permission::DeleteOwnListings,
                Permission::DeleteAnyProperty,
            ),
        };

        actor.authorize(if self_service { own_permission } else { moderator_permission })?;

        // company listings always need a reason, anything else only when someone else removes it
        let company_property = matches!(target, DeletionTarget::Property { owner, .. } if owner.is_company());
        if !self_service || company_property {
            require_reason(reason)?;
        }

        Ok(if self_service {
            NotificationStrategy::SoftUser
        } else {
            NotificationStrategy::SoftAdmin
        })
    }

    /// Validate the request and build it. Nothing is read for the guard or written yet.
    ///
    /// Permission problems surface as `ServiceError::PermissionDenied`; a missing reason or an
    /// already deleted target as a validation error.
    pub async fn create(
        &self,
        target: DeletionTarget,
        actor: Option<&AuthContext>,
        reason: Option<&str>,
        deletion_type: DeletionType,
    ) -> ServiceResult<DeletionRequest<'_>> {
        let actor = actor.ok_or_else(|| ServiceError::PermissionDenied("No acting user".to_string()))?;
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());

        let strategy = match deletion_type {
            DeletionType::SoftDelete => {
                if target.is_deleted() {
                    return Err(ValidationError::Custom(target.already_deleted_message().to_string()).into());
                }
                self.soft_strategy(&target, actor, reason).await?
            }
            DeletionType::PrivacyDelete => {
                actor.authorize(Permission::DepersonalizeAccount)?;
                require_reason(reason)?;
                match &target {
                    DeletionTarget::User(user) if user.email == depersonalized_email(user.id) => {
                        return Err(ValidationError::Custom(ALREADY_DEPERSONALISED.to_string()).into());
                    }
                    DeletionTarget::User(_) => NotificationStrategy::PrivacyAdmin,
                    _ => return Err(ValidationError::Custom(PRIVACY_USER_ONLY.to_string()).into()),
                }
            }
        };
        check_reason_length(reason)?;

        debug!(
            "{} of {} {} by {} accepted ({:?})",
            deletion_type.as_str(),
            target.model().type_name(),
            target.id(),
            actor.user_id,
            strategy
        );

        let notifier =
            NotificationDispatcher::new(self.mailer.clone(), &self.config, strategy, target.clone(), &actor.email);
        Ok(DeletionRequest {
            service: self,
            log: DeletionLogTree::new(self.logs.clone(), actor.user_id, deletion_type),
            target,
            reason: reason.map(str::to_string),
            notifier,
            state: DeletionState::PermissionChecked,
        })
    }
}

/// A validated deletion waiting to run
pub struct DeletionRequest<'a> {
    service: &'a CascadeDeleteService,
    target: DeletionTarget,
    reason: Option<String>,
    log: DeletionLogTree,
    notifier: NotificationDispatcher,
    state: DeletionState,
}

impl<'a> DeletionRequest<'a> {
    pub fn state(&self) -> DeletionState {
        self.state
    }

    pub fn strategy(&self) -> NotificationStrategy {
        self.notifier.strategy()
    }

    pub fn target(&self) -> &DeletionTarget {
        &self.target
    }

    fn describe(&self) -> String {
        format!(
            "{} of {} {}",
            self.log.deletion_type().as_str(),
            self.target.model().type_name(),
            self.target.id()
        )
    }

    async fn blocked(&mut self, bookings: Vec<Booking>) -> DeleteOutcome {
        warn!("{} blocked by {} active booking(s)", self.describe(), bookings.len());
        self.state = DeletionState::Blocked;
        self.notifier
            .handle_failed(&bookings, self.target.is_landlord_context())
            .await;
        DeleteOutcome::Blocked { bookings }
    }

    async fn failed(&mut self, err: DomainError) -> DeleteOutcome {
        error!("Failed to run {}: {}", self.describe(), err);
        self.state = DeletionState::Errored;
        self.notifier.handle_error().await;
        DeleteOutcome::Failed
    }

    /// Re-check the guard inside the transaction, then cascade and commit.
    async fn delete(&self) -> DomainResult<CascadeStep> {
        let cascade = &self.service.cascade;
        let mut tx = self.service.pool.begin().await.map_err(DbError::from)?;

        let bookings = match cascade.guard().active_bookings_with_tx(&self.target, &mut tx).await {
            Ok(bookings) => bookings,
            Err(e) => {
                let _ = tx.rollback().await;
                return Err(e);
            }
        };
        if !bookings.is_empty() {
            tx.rollback().await.map_err(DbError::from)?;
            return Ok(CascadeStep::Blocked(bookings));
        }

        match cascade.run(&self.log, &self.target, self.reason.as_deref(), &mut tx).await {
            Ok(root) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(CascadeStep::Done(root))
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }

    /// Run the request once. Outcomes are reported to the parties by mail and returned.
    pub async fn execute(&mut self) -> DeleteOutcome {
        if self.state != DeletionState::PermissionChecked {
            warn!("{} was already executed ({:?})", self.describe(), self.state);
            return DeleteOutcome::Failed;
        }

        let bookings = match self.service.cascade.guard().active_bookings(&self.target).await {
            Ok(bookings) => bookings,
            Err(e) => return self.failed(e).await,
        };
        self.state = DeletionState::Guarded;
        if !bookings.is_empty() {
            return self.blocked(bookings).await;
        }

        self.state = DeletionState::Deleting;
        match self.delete().await {
            Ok(CascadeStep::Done(root)) => {
                self.state = DeletionState::Deleted;
                info!("Finished {} (log {})", self.describe(), root.id);
                self.notifier.handle_success().await;
                self.state = DeletionState::Notified;
                DeleteOutcome::Deleted { root_log_id: root.id }
            }
            Ok(CascadeStep::Blocked(bookings)) => self.blocked(bookings).await,
            Err(e) => self.failed(e).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::core::deletion_log::{DeletedModel, NewDeletionLog, SqliteDeletionLogRepository};
    use crate::domains::core::notification::{SUBJECT_ERROR, SUBJECT_FAILED, SUBJECT_SUCCESS};
    use crate::domains::landlord::{LandlordProfileType, MembershipRole};
    use crate::domains::user::{LandlordType, User};
    use crate::test_support::{
        cascade_repositories, memory_pool, seed_admin, seed_booking, seed_landlord, seed_membership, seed_property,
        seed_review, seed_user, seed_user_with, RecordingMailer,
    };
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use sqlx::{Sqlite, Transaction};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Delegates to SQLite but fails the n-th log write
    struct FailingLogs {
        inner: SqliteDeletionLogRepository,
        fail_on: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DeletionLogRepository for FailingLogs {
        async fn create_with_tx(
            &self,
            new_log: &NewDeletionLog,
            tx: &mut Transaction<'_, Sqlite>,
        ) -> DomainResult<DeletionLog> {
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
                return Err(DomainError::Internal("injected fault".to_string()));
            }
            self.inner.create_with_tx(new_log, tx).await
        }

        async fn find_by_id(&self, id: Uuid) -> DomainResult<DeletionLog> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_actor(&self, user_id: Uuid) -> DomainResult<Vec<DeletionLog>> {
            self.inner.find_by_actor(user_id).await
        }

        async fn find_by_object(&self, model: DeletedModel, object_id: Uuid) -> DomainResult<Vec<DeletionLog>> {
            self.inner.find_by_object(model, object_id).await
        }

        async fn find_children(&self, parent_log_id: Uuid) -> DomainResult<Vec<DeletionLog>> {
            self.inner.find_children(parent_log_id).await
        }

        async fn find_tree(&self, root_id: Uuid) -> DomainResult<Vec<DeletionLog>> {
            self.inner.find_tree(root_id).await
        }
    }

    fn service_with(
        pool: &SqlitePool,
        logs: Arc<dyn DeletionLogRepository>,
    ) -> (CascadeDeleteService, Arc<RecordingMailer>) {
        let mailer = Arc::new(RecordingMailer::default());
        let service = CascadeDeleteService::new(
            pool.clone(),
            cascade_repositories(pool),
            logs,
            mailer.clone(),
            &AppConfig::for_tests(),
        );
        (service, mailer)
    }

    fn service(pool: &SqlitePool) -> (CascadeDeleteService, Arc<RecordingMailer>) {
        service_with(pool, Arc::new(SqliteDeletionLogRepository::new(pool.clone())))
    }

    async fn log_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM deletion_logs")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn reload(pool: &SqlitePool, user: &User) -> User {
        cascade_repositories(pool).users.find_by_id(user.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_permission_and_reason_rules() {
        let pool = memory_pool().await;
        let (service, _) = service(&pool);
        let guest = seed_user(&pool, "guest@example.com").await;
        let stranger = seed_user(&pool, "stranger@example.com").await;
        let moderator = seed_admin(&pool, "mod@example.com", false).await;

        let target = DeletionTarget::User(guest.clone());
        let err = service
            .create(target.clone(), None, None, DeletionType::SoftDelete)
            .await
            .err()
            .unwrap();
        assert!(err.is_permission_denied());

        let err = service
            .create(target.clone(), Some(&AuthContext::for_user(&stranger)), Some("Spam account"), DeletionType::SoftDelete)
            .await
            .err()
            .unwrap();
        assert!(err.is_permission_denied());

        let err = service
            .create(target.clone(), Some(&AuthContext::for_user(&moderator)), None, DeletionType::SoftDelete)
            .await
            .err()
            .unwrap();
        assert!(err.is_validation());

        let own = service
            .create(target.clone(), Some(&AuthContext::for_user(&guest)), None, DeletionType::SoftDelete)
            .await
            .unwrap();
        assert_eq!(own.strategy(), NotificationStrategy::SoftUser);
        assert_eq!(own.state(), DeletionState::PermissionChecked);

        let moderated = service
            .create(target.clone(), Some(&AuthContext::for_user(&moderator)), Some("Spam account"), DeletionType::SoftDelete)
            .await
            .unwrap();
        assert_eq!(moderated.strategy(), NotificationStrategy::SoftAdmin);

        let err = service
            .create(target, Some(&AuthContext::for_user(&moderator)), Some("Data subject request"), DeletionType::PrivacyDelete)
            .await
            .err()
            .unwrap();
        assert!(err.is_permission_denied());
    }

    #[tokio::test]
    async fn test_individual_owner_needs_no_reason_for_own_listings() {
        let pool = memory_pool().await;
        let (service, _) = service(&pool);
        let landlord = seed_user_with(&pool, "host@example.com", LandlordType::Individual).await;
        let moderator = seed_admin(&pool, "mod@example.com", false).await;
        let profile = seed_landlord(&pool, &landlord, LandlordProfileType::Individual).await;
        let property = seed_property(&pool, &profile, dec!(65)).await;
        let owner = AuthContext::for_user(&landlord);

        let listing = DeletionTarget::Property { property, owner: profile.clone() };
        let request = service
            .create(listing.clone(), Some(&owner), None, DeletionType::SoftDelete)
            .await
            .unwrap();
        assert_eq!(request.strategy(), NotificationStrategy::SoftUser);

        let request = service
            .create(
                DeletionTarget::LandlordProfile { profile, owner: Some(landlord.clone()) },
                Some(&owner),
                None,
                DeletionType::SoftDelete,
            )
            .await
            .unwrap();
        assert_eq!(request.strategy(), NotificationStrategy::SoftUser);

        let err = service
            .create(listing, Some(&AuthContext::for_user(&moderator)), None, DeletionType::SoftDelete)
            .await
            .err()
            .unwrap();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_company_admin_deletes_property_as_owner() {
        let pool = memory_pool().await;
        let (service, _) = service(&pool);
        let owner = seed_user_with(&pool, "owner@example.com", LandlordType::Company).await;
        let partner = seed_user_with(&pool, "partner@example.com", LandlordType::CompanyMember).await;
        let company = seed_landlord(&pool, &owner, LandlordProfileType::Company).await;
        seed_membership(&pool, &company, &partner, MembershipRole::Admin).await;
        let property = seed_property(&pool, &company, dec!(100)).await;

        let target = DeletionTarget::Property { property, owner: company };
        let err = service
            .create(target.clone(), Some(&AuthContext::for_user(&partner)), None, DeletionType::SoftDelete)
            .await
            .err()
            .unwrap();
        assert!(err.is_validation());

        let request = service
            .create(target, Some(&AuthContext::for_user(&partner)), Some("Listing sold"), DeletionType::SoftDelete)
            .await
            .unwrap();
        assert_eq!(request.strategy(), NotificationStrategy::SoftUser);
    }

    #[tokio::test]
    async fn test_already_deleted_target_is_rejected() {
        let pool = memory_pool().await;
        let (service, _) = service(&pool);
        let guest = seed_user(&pool, "guest@example.com").await;
        cascade_repositories(&pool).users.soft_delete(guest.id).await.unwrap();
        let guest = reload(&pool, &guest).await;

        let err = service
            .create(DeletionTarget::User(guest.clone()), Some(&AuthContext::for_user(&guest)), None, DeletionType::SoftDelete)
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "Domain error: Validation error: Account data is already deleted.");
    }

    #[tokio::test]
    async fn test_blocked_deletion_changes_nothing() {
        let pool = memory_pool().await;
        let (service, mailer) = service(&pool);
        let landlord = seed_user_with(&pool, "host@example.com", LandlordType::Individual).await;
        let guest = seed_user(&pool, "guest@example.com").await;
        let profile = seed_landlord(&pool, &landlord, LandlordProfileType::Individual).await;
        let property = seed_property(&pool, &profile, dec!(75)).await;
        let booking = seed_booking(&pool, &property, &guest).await;

        let mut request = service
            .create(DeletionTarget::User(landlord.clone()), Some(&AuthContext::for_user(&landlord)), None, DeletionType::SoftDelete)
            .await
            .unwrap();
        let outcome = request.execute().await;

        match outcome {
            DeleteOutcome::Blocked { bookings } => assert_eq!(bookings[0].id, booking.id),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(request.state(), DeletionState::Blocked);
        assert!(!reload(&pool, &landlord).await.is_deleted);
        assert_eq!(log_count(&pool).await, 0);

        let batches = mailer.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].subject, SUBJECT_FAILED);
        assert!(batches[0][0].text_body.contains(&booking.id.to_string()));
    }

    #[tokio::test]
    async fn test_fault_mid_cascade_rolls_everything_back() {
        let pool = memory_pool().await;
        let owner = seed_user_with(&pool, "owner@example.com", LandlordType::Company).await;
        let staff = seed_user_with(&pool, "staff@example.com", LandlordType::CompanyMember).await;
        let company = seed_landlord(&pool, &owner, LandlordProfileType::Company).await;
        let membership = seed_membership(&pool, &company, &staff, MembershipRole::Member).await;
        let first = seed_property(&pool, &company, dec!(50)).await;
        let second = seed_property(&pool, &company, dec!(70)).await;

        // root log, membership log, first property log, then the fault
        let logs = Arc::new(FailingLogs {
            inner: SqliteDeletionLogRepository::new(pool.clone()),
            fail_on: 4,
            calls: AtomicUsize::new(0),
        });
        let (service, mailer) = service_with(&pool, logs);
        let admin = seed_admin(&pool, "admin@example.com", true).await;

        let mut request = service
            .create(
                DeletionTarget::LandlordProfile { profile: company.clone(), owner: Some(owner.clone()) },
                Some(&AuthContext::for_user(&admin)),
                Some("Fraudulent listings"),
                DeletionType::SoftDelete,
            )
            .await
            .unwrap();
        assert!(matches!(request.execute().await, DeleteOutcome::Failed));
        assert_eq!(request.state(), DeletionState::Errored);

        let repos = cascade_repositories(&pool);
        assert!(!repos.profiles.find_by_id(company.id).await.unwrap().is_deleted);
        assert!(!repos.properties.find_by_id(first.id).await.unwrap().is_deleted);
        assert!(!repos.properties.find_by_id(second.id).await.unwrap().is_deleted);
        assert!(!repos.memberships.find_by_id(membership.id).await.unwrap().is_deleted);
        assert_eq!(log_count(&pool).await, 0);
        assert_eq!(mailer.batches()[0][0].subject, SUBJECT_ERROR);
    }

    #[tokio::test]
    async fn test_company_profile_audit_tree() {
        let pool = memory_pool().await;
        let (service, mailer) = service(&pool);
        let owner = seed_user_with(&pool, "owner@example.com", LandlordType::Company).await;
        let company = seed_landlord(&pool, &owner, LandlordProfileType::Company).await;
        for email in ["anna@example.com", "bartek@example.com"] {
            let member = seed_user_with(&pool, email, LandlordType::CompanyMember).await;
            seed_membership(&pool, &company, &member, MembershipRole::Member).await;
        }
        for price in [dec!(40), dec!(60), dec!(80)] {
            seed_property(&pool, &company, price).await;
        }

        let mut request = service
            .create(
                DeletionTarget::LandlordProfile { profile: company.clone(), owner: Some(owner.clone()) },
                Some(&AuthContext::for_user(&owner)),
                Some("Closing the business"),
                DeletionType::SoftDelete,
            )
            .await
            .unwrap();
        let root_id = match request.execute().await {
            DeleteOutcome::Deleted { root_log_id } => root_log_id,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(request.state(), DeletionState::Notified);

        let logs = SqliteDeletionLogRepository::new(pool.clone());
        let children = logs.find_children(root_id).await.unwrap();
        assert_eq!(children.len(), 5);
        assert!(children.iter().all(|l| l.parent_log_id == Some(root_id) && l.is_cascade));
        assert_eq!(logs.find_tree(root_id).await.unwrap().len(), 6);

        let batches = mailer.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].subject, SUBJECT_SUCCESS);
        assert_eq!(batches[0][0].to, vec!["owner@example.com"]);

        // a second run is refused without touching the log
        assert!(matches!(request.execute().await, DeleteOutcome::Failed));
        assert_eq!(log_count(&pool).await, 6);
    }

    #[tokio::test]
    async fn test_privacy_delete_is_irreversible() {
        let pool = memory_pool().await;
        let (service, mailer) = service(&pool);
        let admin = seed_admin(&pool, "admin@example.com", true).await;
        let guest = seed_user(&pool, "olga.berg@example.com").await;
        let landlord = seed_user_with(&pool, "host@example.com", LandlordType::Individual).await;
        let profile = seed_landlord(&pool, &landlord, LandlordProfileType::Individual).await;
        let property = seed_property(&pool, &profile, dec!(90)).await;
        let booking = seed_booking(&pool, &property, &guest).await;
        let review = seed_review(&pool, &property, &guest, "olga.berg enjoyed the view").await;
        let repos = cascade_repositories(&pool);
        repos.bookings.complete(booking.id).await.unwrap();

        let mut request = service
            .create(
                DeletionTarget::User(guest.clone()),
                Some(&AuthContext::for_user(&admin)),
                Some("Data subject erasure request"),
                DeletionType::PrivacyDelete,
            )
            .await
            .unwrap();
        assert!(request.execute().await.is_deleted());

        assert!(repos.users.find_by_email("olga.berg@example.com").await.is_err());
        let scrubbed = reload(&pool, &guest).await;
        assert!(scrubbed.is_deleted);
        assert_eq!(scrubbed.email, depersonalized_email(guest.id));

        let review = repos.reviews.find_by_id(review.id).await.unwrap();
        assert!(!review.feedback.contains("olga"));
        assert_eq!(review.author_id, None);
        let booking = repos.bookings.find_by_id(booking.id).await.unwrap();
        assert_eq!(booking.guest_id, None);
        assert!(booking.guest_token.is_some());

        let batches = mailer.batches();
        assert_eq!(batches[0][1].to, vec!["olga.berg@example.com"]);

        let err = service
            .create(
                DeletionTarget::User(scrubbed),
                Some(&AuthContext::for_user(&admin)),
                Some("Data subject erasure request"),
                DeletionType::PrivacyDelete,
            )
            .await
            .err()
            .unwrap();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_mail_outage_does_not_turn_success_into_failure() {
        let pool = memory_pool().await;
        let (service, mailer) = service(&pool);
        let guest = seed_user(&pool, "guest@example.com").await;
        mailer.fail_next();

        let mut request = service
            .create(DeletionTarget::User(guest.clone()), Some(&AuthContext::for_user(&guest)), None, DeletionType::SoftDelete)
            .await
            .unwrap();
        assert!(request.execute().await.is_deleted());
        assert!(reload(&pool, &guest).await.is_deleted);
        assert!(mailer.batches().is_empty());
    }
}
