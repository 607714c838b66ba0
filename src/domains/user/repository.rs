use crate::auth::hash_password;
use crate::domains::core::repository::{FindById, SoftDeletable};
use crate::domains::user::types::{
    depersonalized_email, depersonalized_username, LandlordType, NewUser, NewUserProfile, User,
    UserProfile, UserProfileRow, UserRow,
};
use crate::errors::{DbError, DomainError, DomainResult};
use crate::validation::Validate;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, Pool, Sqlite, Transaction};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, date_of_birth, is_admin, \
    is_moderator, is_landlord, landlord_type, is_verified, is_deleted, deleted_at, created_at, updated_at";

const PROFILE_COLUMNS: &str =
    "id, user_id, user_token, phone, gender, citizenship, created_at, updated_at";

/// Trait defining user repository operations
#[async_trait]
pub trait UserRepository: FindById<User> + SoftDeletable + Send + Sync {
    async fn create(&self, new_user: &NewUser) -> DomainResult<User>;

    async fn find_by_email(&self, email: &str) -> DomainResult<User>;

    async fn find_by_id_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<User>;

    /// Replace identifying fields with placeholders, clear credentials and roles, mark deleted.
    async fn privacy_delete_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;

    async fn create_profile(&self, new_profile: &NewUserProfile) -> DomainResult<UserProfile>;

    async fn find_profile_by_user(&self, user_id: Uuid) -> DomainResult<Option<UserProfile>>;

    async fn find_profile_by_user_with_tx(
        &self,
        user_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Option<UserProfile>>;

    /// Detach the profile from its user, keeping only the opaque token.
    async fn privacy_delete_profile_with_tx(
        &self,
        profile_id: Uuid,
        user_token: &str,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;
}

/// SQLite implementation for UserRepository
#[derive(Debug, Clone)]
pub struct SqliteUserRepository {
    pool: Pool<Sqlite>,
}

impl SqliteUserRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FindById<User> for SqliteUserRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<User> {
        let row = query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("User".to_string(), id))?;

        row.into_entity()
    }
}

#[async_trait]
impl SoftDeletable for SqliteUserRepository {
    fn entity_name(&self) -> &'static str {
        "users"
    }

    async fn soft_delete_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();

        let result = query(
            "UPDATE users SET is_deleted = 1, deleted_at = ?, updated_at = ? WHERE id = ? AND is_deleted = 0",
        )
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("User".to_string(), id))
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
impl UserRepository for SqliteUserRepository {
    async fn create(&self, new_user: &NewUser) -> DomainResult<User> {
        new_user.validate()?;

        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        let landlord_type = new_user.landlord_type.unwrap_or(LandlordType::None);
        let password_hash = hash_password(&new_user.password)?;

        query(
            "INSERT INTO users (id, email, username, first_name, last_name, date_of_birth, password, \
             is_admin, is_moderator, is_landlord, landlord_type, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(new_user.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(&password_hash)
        .bind(new_user.is_admin)
        .bind(new_user.is_moderator)
        .bind(new_user.is_landlord)
        .bind(landlord_type.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => DomainError::Database(
                DbError::Conflict(format!("Email already registered: {}", new_user.email)),
            ),
            _ => DomainError::Database(DbError::from(e)),
        })?;

        self.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> DomainResult<User> {
        let row = query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = ? COLLATE NOCASE",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?
        .ok_or_else(|| DomainError::Database(DbError::NotFound("User".to_string(), email.to_string())))?;

        row.into_entity()
    }

    async fn find_by_id_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<User> {
        let row = query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("User".to_string(), id))?;

        row.into_entity()
    }

    async fn privacy_delete_with_tx(
        &self,
        id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();

        // deleted_at keeps the first deletion time when the account was soft deleted before
        let result = query(
            "UPDATE users SET username = ?, email = ?, first_name = '', last_name = '', \
             date_of_birth = NULL, password = '', is_admin = 0, is_moderator = 0, is_landlord = 0, \
             is_verified = 0, is_deleted = 1, deleted_at = COALESCE(deleted_at, ?), updated_at = ? \
             WHERE id = ?",
        )
        .bind(depersonalized_username(id))
        .bind(depersonalized_email(id))
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("User".to_string(), id))
        } else {
            Ok(())
        }
    }

    async fn create_profile(&self, new_profile: &NewUserProfile) -> DomainResult<UserProfile> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        query(
            "INSERT INTO user_profiles (id, user_id, phone, gender, citizenship, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(new_profile.user_id.to_string())
        .bind(&new_profile.phone)
        .bind(&new_profile.gender)
        .bind(&new_profile.citizenship)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        self.find_profile_by_user(new_profile.user_id)
            .await?
            .ok_or_else(|| DomainError::EntityNotFound("UserProfile".to_string(), id))
    }

    async fn find_profile_by_user(&self, user_id: Uuid) -> DomainResult<Option<UserProfile>> {
        let row = query_as::<_, UserProfileRow>(&format!(
            "SELECT {} FROM user_profiles WHERE user_id = ?",
            PROFILE_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?;

        row.map(UserProfileRow::into_entity).transpose()
    }

    async fn find_profile_by_user_with_tx(
        &self,
        user_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Option<UserProfile>> {
        let row = query_as::<_, UserProfileRow>(&format!(
            "SELECT {} FROM user_profiles WHERE user_id = ?",
            PROFILE_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_optional(&mut **tx)
        .await
        .map_err(DbError::from)?;

        row.map(UserProfileRow::into_entity).transpose()
    }

    async fn privacy_delete_profile_with_tx(
        &self,
        profile_id: Uuid,
        user_token: &str,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();

        let result = query(
            "UPDATE user_profiles SET user_token = ?, user_id = NULL, phone = ?, gender = '', \
             citizenship = '', updated_at = ? WHERE id = ?",
        )
        .bind(user_token)
        .bind(format!("deleted_{}", profile_id))
        .bind(&now)
        .bind(profile_id.to_string())
        .execute(&mut **tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            Err(DomainError::EntityNotFound("UserProfile".to_string(), profile_id))
        } else {
            Ok(())
        }
    }
}
