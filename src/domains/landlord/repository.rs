use crate::domains::core::repository::{FindById, SoftDeletable};
use crate::domains::landlord::types::{
    CompanyMembership, CompanyMembershipRow, LandlordProfile, LandlordProfileRow,
    MembershipRole, NewCompanyMembership, NewLandlordProfile,
};
use crate::errors::{DbError, DomainError, DomainResult};
use crate::types::{parse_uuid, DELETED_LANDLORD_PLACEHOLDER};
use crate::validation::Validate;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, query_scalar, Pool, Sqlite, Transaction};
use uuid::Uuid;

const PROFILE_COLUMNS: &str = "id, type, name, email, phone, address, description, created_by, \
    created_by_token, is_deleted, deleted_at, created_at, updated_at";

const MEMBERSHIP_COLUMNS: &str = "id, company_id, user_id, user_token, role, is_active, is_deleted, \
    deleted_at, joined_at, left_at, updated_at";

#[async_trait]
pub trait LandlordProfileRepository: FindById<LandlordProfile> + SoftDeletable + Send + Sync {
    async fn create(&self, new_profile: &NewLandlordProfile) -> DomainResult<LandlordProfile>;

    async fn find_by_id_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<LandlordProfile>;

    /// Every profile created by the user, deleted ones included, oldest first
    async fn find_by_creator(&self, user_id: Uuid) -> DomainResult<Vec<LandlordProfile>>;

    async fn find_by_creator_with_tx(
        &self,
        user_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<LandlordProfile>>;

    /// Users allowed to manage the profile: its creator plus active company admins
    async fn find_admin_ids(&self, profile: &LandlordProfile) -> DomainResult<Vec<Uuid>>;

    /// Tokenise the creator; an individual profile also loses its contact details.
    async fn privacy_delete_with_tx(
        &self,
        id: Uuid,
        created_by_token: Option<&str>,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;
}

#[async_trait]
pub trait CompanyMembershipRepository: SoftDeletable + Send + Sync {
    async fn create(&self, new_membership: &NewCompanyMembership) -> DomainResult<CompanyMembership>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<CompanyMembership>;

    async fn find_live_by_company_with_tx(
        &self,
        company_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<CompanyMembership>>;

    async fn find_live_by_user_with_tx(
        &self,
        user_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<CompanyMembership>>;

    /// Every membership still linked to the user, left or not
    async fn find_by_user_with_tx(
        &self,
        user_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<CompanyMembership>>;

    /// Replace the member with a token and close the membership.
    async fn privacy_delete_with_tx(
        &self,
        id: Uuid,
        user_token: &str,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;
}

/// SQLite implementation for LandlordProfileRepository
#[derive(Debug, Clone)]
pub struct SqliteLandlordProfileRepository {
    pool: Pool<Sqlite>,
}

impl SqliteLandlordProfileRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FindById<LandlordProfile> for SqliteLandlordProfileRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<LandlordProfile> {
        let row = query_as::<_, LandlordProfileRow>(&format!(
            "SELECT {} FROM landlord_profiles WHERE id = ?",
            PROFILE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?
        .ok_or_else(|| DomainError::EntityNotFound("LandlordProfile".to_string(), id))?;

        row.into_entity()
    }
}

#[async_trait]
impl SoftDeletable for SqliteLandlordProfileRepository {
    fn entity_name(&self) -> &'static str {
        "landlord_profiles"
    }

    async fn soft_delete_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();

        let result = query(
            "UPDATE landlord_profiles SET is_deleted = 1, deleted_at = ?, updated_at = ? \
             WHERE id = ? AND is_deleted = 0",
        )
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("LandlordProfile".to_string(), id))
        } else {
            Ok(())
        }
    }

    async fn soft_delete(&self, id: Uuid) -> DomainResult<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        match self.soft_delete_with_tx(id, &mut tx).await {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl LandlordProfileRepository for SqliteLandlordProfileRepository {
    async fn create(&self, new_profile: &NewLandlordProfile) -> DomainResult<LandlordProfile> {
        new_profile.validate()?;

        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        query(
            "INSERT INTO landlord_profiles (id, type, name, email, phone, address, description, \
             created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(new_profile.profile_type.as_str())
        .bind(&new_profile.name)
        .bind(&new_profile.email)
        .bind(&new_profile.phone)
        .bind(&new_profile.address)
        .bind(&new_profile.description)
        .bind(new_profile.created_by.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        self.find_by_id(id).await
    }

    async fn find_by_id_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<LandlordProfile> {
        let row = query_as::<_, LandlordProfileRow>(&format!(
            "SELECT {} FROM landlord_profiles WHERE id = ?",
            PROFILE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&mut **tx)
        .await
        .map_err(DbError::from)?
        .ok_or_else(|| DomainError::EntityNotFound("LandlordProfile".to_string(), id))?;

        row.into_entity()
    }

    async fn find_by_creator(&self, user_id: Uuid) -> DomainResult<Vec<LandlordProfile>> {
        let rows = query_as::<_, LandlordProfileRow>(&format!(
            "SELECT {} FROM landlord_profiles WHERE created_by = ? ORDER BY created_at ASC",
            PROFILE_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(LandlordProfileRow::into_entity).collect()
    }

    async fn find_by_creator_with_tx(
        &self,
        user_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<LandlordProfile>> {
        let rows = query_as::<_, LandlordProfileRow>(&format!(
            "SELECT {} FROM landlord_profiles WHERE created_by = ? ORDER BY created_at ASC",
            PROFILE_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&mut **tx)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(LandlordProfileRow::into_entity).collect()
    }

    async fn find_admin_ids(&self, profile: &LandlordProfile) -> DomainResult<Vec<Uuid>> {
        let mut admins: Vec<Uuid> = profile.created_by.into_iter().collect();

        if profile.is_company() {
            let member_ids = query_scalar::<_, String>(
                "SELECT user_id FROM company_memberships \
                 WHERE company_id = ? AND role = ? AND is_active = 1 AND is_deleted = 0 AND user_id IS NOT NULL",
            )
            .bind(profile.id.to_string())
            .bind(MembershipRole::Admin.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

            for raw in member_ids {
                let id = parse_uuid(&raw)?;
                if !admins.contains(&id) {
                    admins.push(id);
                }
            }
        }

        Ok(admins)
    }

    async fn privacy_delete_with_tx(
        &self,
        id: Uuid,
        created_by_token: Option<&str>,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let profile = self.find_by_id_with_tx(id, tx).await?;
        let now = Utc::now().to_rfc3339();
        let deleted_at = profile.deleted_at.map(|d| d.to_rfc3339()).unwrap_or_else(|| now.clone());

        let result = (if profile.is_company() {
            query(
                "UPDATE landlord_profiles SET created_by_token = ?, created_by = NULL, is_deleted = 1, \
                 deleted_at = ?, updated_at = ? WHERE id = ?",
            )
            .bind(created_by_token)
            .bind(&deleted_at)
            .bind(&now)
            .bind(id.to_string())
            .execute(&mut **tx)
            .await
        } else {
            query(
                "UPDATE landlord_profiles SET created_by_token = ?, created_by = NULL, name = ?, email = ?, \
                 phone = ?, address = '', description = '', is_deleted = 1, deleted_at = ?, updated_at = ? \
                 WHERE id = ?",
            )
            .bind(created_by_token)
            .bind(DELETED_LANDLORD_PLACEHOLDER)
            .bind(format!("deleted_{}@example.com", id))
            .bind(format!("deleted_{}", id))
            .bind(&deleted_at)
            .bind(&now)
            .bind(id.to_string())
            .execute(&mut **tx)
            .await
        })
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("LandlordProfile".to_string(), id))
        } else {
            Ok(())
        }
    }
}

/// SQLite implementation for CompanyMembershipRepository
#[derive(Debug, Clone)]
pub struct SqliteCompanyMembershipRepository {
    pool: Pool<Sqlite>,
}

impl SqliteCompanyMembershipRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SoftDeletable for SqliteCompanyMembershipRepository {
    fn entity_name(&self) -> &'static str {
        "company_memberships"
    }

    async fn soft_delete_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();

        let result = query(
            "UPDATE company_memberships SET is_deleted = 1, deleted_at = ?, left_at = ?, is_active = 0, \
             updated_at = ? WHERE id = ? AND is_deleted = 0",
        )
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("CompanyMembership".to_string(), id))
        } else {
            Ok(())
        }
    }

    async fn soft_delete(&self, id: Uuid) -> DomainResult<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;
        match self.soft_delete_with_tx(id, &mut tx).await {
            Ok(()) => {
                tx.commit().await.map_err(DbError::from)?;
                Ok(())
            }
            Err(e) => {
                let _ = tx.rollback().await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl CompanyMembershipRepository for SqliteCompanyMembershipRepository {
    async fn create(&self, new_membership: &NewCompanyMembership) -> DomainResult<CompanyMembership> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        query(
            "INSERT INTO company_memberships (id, company_id, user_id, role, joined_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(new_membership.company_id.to_string())
        .bind(new_membership.user_id.to_string())
        .bind(new_membership.role.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        self.find_by_id(id).await
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<CompanyMembership> {
        let row = query_as::<_, CompanyMembershipRow>(&format!(
            "SELECT {} FROM company_memberships WHERE id = ?",
            MEMBERSHIP_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?
        .ok_or_else(|| DomainError::EntityNotFound("CompanyMembership".to_string(), id))?;

        row.into_entity()
    }

    async fn find_live_by_company_with_tx(
        &self,
        company_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<CompanyMembership>> {
        let rows = query_as::<_, CompanyMembershipRow>(&format!(
            "SELECT {} FROM company_memberships WHERE company_id = ? AND is_deleted = 0 ORDER BY joined_at ASC",
            MEMBERSHIP_COLUMNS
        ))
        .bind(company_id.to_string())
        .fetch_all(&mut **tx)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(CompanyMembershipRow::into_entity).collect()
    }

    async fn find_live_by_user_with_tx(
        &self,
        user_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<CompanyMembership>> {
        let rows = query_as::<_, CompanyMembershipRow>(&format!(
            "SELECT {} FROM company_memberships WHERE user_id = ? AND is_deleted = 0 ORDER BY joined_at ASC",
            MEMBERSHIP_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&mut **tx)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(CompanyMembershipRow::into_entity).collect()
    }

    async fn find_by_user_with_tx(
        &self,
        user_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<CompanyMembership>> {
        let rows = query_as::<_, CompanyMembershipRow>(&format!(
            "SELECT {} FROM company_memberships WHERE user_id = ? ORDER BY joined_at ASC",
            MEMBERSHIP_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&mut **tx)
        .await
        .map_err(DbError::from)?;

        rows.into_iter().map(CompanyMembershipRow::into_entity).collect()
    }

    async fn privacy_delete_with_tx(
        &self,
        id: Uuid,
        user_token: &str,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();

        let result = query(
            "UPDATE company_memberships SET user_token = ?, user_id = NULL, is_active = 0, is_deleted = 1, \
             deleted_at = ?, left_at = COALESCE(left_at, ?), updated_at = ? WHERE id = ? AND user_id IS NOT NULL",
        )
        .bind(user_token)
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("CompanyMembership".to_string(), id))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::landlord::types::LandlordProfileType;
    use crate::test_support::{memory_pool, seed_landlord, seed_membership, seed_user};

    #[tokio::test]
    async fn test_company_admins_include_admin_members() {
        let pool = memory_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let co_admin = seed_user(&pool, "coadmin@example.com").await;
        let manager = seed_user(&pool, "manager@example.com").await;
        let company = seed_landlord(&pool, &owner, LandlordProfileType::Company).await;
        seed_membership(&pool, &company, &co_admin, MembershipRole::Admin).await;
        seed_membership(&pool, &company, &manager, MembershipRole::Manager).await;

        let repo = SqliteLandlordProfileRepository::new(pool);
        let admins = repo.find_admin_ids(&company).await.unwrap();
        assert_eq!(admins, vec![owner.id, co_admin.id]);
    }

    #[tokio::test]
    async fn test_privacy_delete_individual_replaces_contact_details() {
        let pool = memory_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let profile = seed_landlord(&pool, &owner, LandlordProfileType::Individual).await;
        let repo = SqliteLandlordProfileRepository::new(pool.clone());

        let mut tx = pool.begin().await.unwrap();
        repo.privacy_delete_with_tx(profile.id, Some("token"), &mut tx).await.unwrap();
        tx.commit().await.unwrap();

        let scrubbed = repo.find_by_id(profile.id).await.unwrap();
        assert_eq!(scrubbed.name, DELETED_LANDLORD_PLACEHOLDER);
        assert_eq!(scrubbed.email, format!("deleted_{}@example.com", profile.id));
        assert!(scrubbed.address.is_empty());
        assert_eq!(scrubbed.created_by, None);
        assert_eq!(scrubbed.created_by_token.as_deref(), Some("token"));
        assert!(scrubbed.is_deleted);
    }

    #[tokio::test]
    async fn test_privacy_delete_company_keeps_name() {
        let pool = memory_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let company = seed_landlord(&pool, &owner, LandlordProfileType::Company).await;
        let repo = SqliteLandlordProfileRepository::new(pool.clone());

        let mut tx = pool.begin().await.unwrap();
        repo.privacy_delete_with_tx(company.id, Some("token"), &mut tx).await.unwrap();
        tx.commit().await.unwrap();

        let scrubbed = repo.find_by_id(company.id).await.unwrap();
        assert_eq!(scrubbed.name, company.name);
        assert_eq!(scrubbed.created_by, None);
        assert!(scrubbed.is_deleted);
    }

    #[tokio::test]
    async fn test_membership_soft_delete_marks_left() {
        let pool = memory_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let member = seed_user(&pool, "member@example.com").await;
        let company = seed_landlord(&pool, &owner, LandlordProfileType::Company).await;
        let membership = seed_membership(&pool, &company, &member, MembershipRole::Member).await;

        let repo = SqliteCompanyMembershipRepository::new(pool);
        repo.soft_delete(membership.id).await.unwrap();

        let left = repo.find_by_id(membership.id).await.unwrap();
        assert!(left.is_deleted);
        assert!(!left.is_active);
        assert!(left.left_at.is_some());
    }

    #[tokio::test]
    async fn test_membership_privacy_delete_tokenises_member() {
        let pool = memory_pool().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let member = seed_user(&pool, "member@example.com").await;
        let company = seed_landlord(&pool, &owner, LandlordProfileType::Company).await;
        let first = seed_membership(&pool, &company, &member, MembershipRole::Member).await;
        let repo = SqliteCompanyMembershipRepository::new(pool.clone());
        repo.soft_delete(first.id).await.unwrap();
        let left_at = repo.find_by_id(first.id).await.unwrap().left_at;
        let second = seed_membership(&pool, &company, &member, MembershipRole::Manager).await;

        let mut tx = pool.begin().await.unwrap();
        let linked = repo.find_by_user_with_tx(member.id, &mut tx).await.unwrap();
        assert_eq!(linked.len(), 2);
        for membership in &linked {
            repo.privacy_delete_with_tx(membership.id, "member-token", &mut tx).await.unwrap();
        }
        assert!(repo.find_by_user_with_tx(member.id, &mut tx).await.unwrap().is_empty());
        assert!(matches!(
            repo.privacy_delete_with_tx(second.id, "member-token", &mut tx).await,
            Err(DomainError::EntityNotFound(_, _))
        ));
        tx.commit().await.unwrap();

        let first = repo.find_by_id(first.id).await.unwrap();
        assert_eq!(first.user_id, None);
        assert_eq!(first.user_token.as_deref(), Some("member-token"));
        assert_eq!(first.left_at, left_at);

        let second = repo.find_by_id(second.id).await.unwrap();
        assert_eq!(second.user_id, None);
        assert!(second.is_deleted && !second.is_active);
        assert!(second.left_at.is_some());
    }
}
