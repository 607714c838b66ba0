use crate::domains::core::repository::FindById;
use crate::domains::discount::types::{
    Discount, DiscountProperty, DiscountPropertyRow, DiscountRow, DiscountStatus, DiscountType, DiscountUser,
    DiscountUserRow, DiscountUserStatus, NewDiscount,
};
use crate::errors::{DbError, DomainError, DomainResult};
use crate::types::{parse_uuid, to_db_optional_timestamp, to_db_timestamp};
use crate::validation::Validate;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{query, query_as, Executor, FromRow, Pool, Sqlite, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

const DISCOUNT_COLUMNS: &str = "d.id, d.name, d.description, d.type, d.value_type, d.value, d.currency, \
    d.priority, d.status, d.valid_from, d.valid_until, d.compatible, d.is_admin_created, d.created_by, \
    d.created_by_token, d.created_at, d.updated_at";

const DISCOUNT_PROPERTY_COLUMNS: &str =
    "id, discount_id, property_id, added_by, is_active, removed_at, removed_by, created_at, updated_at";

const DISCOUNT_USER_COLUMNS: &str = "id, discount_id, user_id, status, expires_at, used_at, created_at, updated_at";

/// Active discounts linked to a property whose validity window contains `now`
const APPLICABLE_FILTER: &str = "d.status = 'active' \
    AND dp.is_active = 1 \
    AND (d.valid_from IS NULL OR d.valid_from <= ?) \
    AND (d.valid_until IS NULL OR d.valid_until >= ?)";

#[async_trait]
pub trait DiscountRepository: FindById<Discount> + Send + Sync {
    async fn create(&self, new_discount: &NewDiscount) -> DomainResult<Discount>;

    /// Disable the discount. Disabling a disabled discount changes nothing.
    async fn set_disabled(&self, id: Uuid) -> DomainResult<Discount>;

    /// Activate the discount. Activating an active discount changes nothing.
    async fn set_active(&self, id: Uuid) -> DomainResult<Discount>;

    async fn find_created_by_with_tx(
        &self,
        user_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<Discount>>;

    /// Detach the creator behind a token and disable the discount.
    /// A discount without a creator is left as is.
    async fn privacy_delete_with_tx(
        &self,
        id: Uuid,
        created_by_token: &str,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()>;

    async fn link_property(
        &self,
        discount_id: Uuid,
        property_id: Uuid,
        added_by: Option<Uuid>,
    ) -> DomainResult<DiscountProperty>;

    async fn find_property_link(&self, id: Uuid) -> DomainResult<DiscountProperty>;

    async fn set_property_link_deactivated(&self, id: Uuid, removed_by: Uuid) -> DomainResult<DiscountProperty>;

    async fn set_property_link_active(&self, id: Uuid) -> DomainResult<DiscountProperty>;

    async fn assign_user(
        &self,
        discount_id: Uuid,
        user_id: Uuid,
        status: DiscountUserStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> DomainResult<DiscountUser>;

    async fn find_user_assignment(&self, id: Uuid) -> DomainResult<DiscountUser>;

    async fn set_user_used(&self, id: Uuid) -> DomainResult<DiscountUser>;

    async fn set_user_expired(&self, id: Uuid) -> DomainResult<DiscountUser>;

    /// Discounts that can apply to a stay at the property right now.
    /// With a user, only discounts assigned to that user in an active, unexpired assignment.
    async fn find_applicable(
        &self,
        property_id: Uuid,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Discount>>;

    /// Seasonal and referral discounts per property, for listing prices.
    async fn find_base_for_properties(
        &self,
        property_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> DomainResult<HashMap<Uuid, Vec<Discount>>>;

    /// Mark active discounts whose end has passed as expired.
    async fn expire_due(&self, now: DateTime<Utc>) -> DomainResult<u64>;

    /// Start scheduled discounts whose start has come.
    async fn activate_due(&self, now: DateTime<Utc>) -> DomainResult<u64>;
}

#[derive(Debug, FromRow)]
struct IncompatibilityRow {
    discount_id: String,
    incompatible_id: String,
}

#[derive(Debug, FromRow)]
struct PropertyDiscountRow {
    property_id: String,
    #[sqlx(flatten)]
    discount: DiscountRow,
}

/// SQLite implementation for DiscountRepository
#[derive(Debug, Clone)]
pub struct SqliteDiscountRepository {
    pool: Pool<Sqlite>,
}

impl SqliteDiscountRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn placeholders(count: usize) -> String {
        vec!["?"; count].join(", ")
    }

    async fn load_incompatibilities<'e, E>(executor: E, ids: &[String]) -> DomainResult<HashMap<String, Vec<Uuid>>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let mut map: HashMap<String, Vec<Uuid>> = HashMap::new();
        if ids.is_empty() {
            return Ok(map);
        }

        let sql = format!(
            "SELECT discount_id, incompatible_id FROM discount_incompatibilities WHERE discount_id IN ({})",
            Self::placeholders(ids.len())
        );
        let mut q = query_as::<_, IncompatibilityRow>(&sql);
        for id in ids {
            q = q.bind(id);
        }
        let rows = q.fetch_all(executor).await.map_err(DbError::from)?;

        for row in rows {
            let incompatible = parse_uuid(&row.incompatible_id)?;
            map.entry(row.discount_id).or_default().push(incompatible);
        }
        Ok(map)
    }

    async fn hydrate(&self, rows: Vec<DiscountRow>) -> DomainResult<Vec<Discount>> {
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut incompatibilities = Self::load_incompatibilities(&self.pool, &ids).await?;
        rows.into_iter()
            .map(|row| {
                let incompatible = incompatibilities.remove(&row.id).unwrap_or_default();
                row.into_entity(incompatible)
            })
            .collect()
    }

    async fn set_status(&self, id: Uuid, status: DiscountStatus) -> DomainResult<Discount> {
        let current = self.find_by_id(id).await?;
        if current.status == status {
            return Ok(current);
        }

        query("UPDATE discounts SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(to_db_timestamp(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        self.find_by_id(id).await
    }

    async fn set_user_status(&self, id: Uuid, status: DiscountUserStatus) -> DomainResult<DiscountUser> {
        let current = self.find_user_assignment(id).await?;
        if current.status == status {
            return Ok(current);
        }

        let now = to_db_timestamp(&Utc::now());
        let used_at = if status == DiscountUserStatus::Used { Some(now.clone()) } else { None };

        query("UPDATE discount_users SET status = ?, used_at = COALESCE(?, used_at), updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(used_at)
            .bind(&now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;

        self.find_user_assignment(id).await
    }
}

#[async_trait]
impl FindById<Discount> for SqliteDiscountRepository {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Discount> {
        let row = query_as::<_, DiscountRow>(&format!("SELECT {} FROM discounts d WHERE d.id = ?", DISCOUNT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("Discount".to_string(), id))?;

        self.hydrate(vec![row])
            .await?
            .pop()
            .ok_or_else(|| DomainError::EntityNotFound("Discount".to_string(), id))
    }
}

#[async_trait]
impl DiscountRepository for SqliteDiscountRepository {
    async fn create(&self, new_discount: &NewDiscount) -> DomainResult<Discount> {
        new_discount.validate()?;

        let id = Uuid::new_v4();
        let now = to_db_timestamp(&Utc::now());
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let result = async {
            query(
                "INSERT INTO discounts (id, name, description, type, value_type, value, currency, priority, status, \
                 valid_from, valid_until, compatible, is_admin_created, created_by, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id.to_string())
            .bind(&new_discount.name)
            .bind(&new_discount.description)
            .bind(new_discount.discount_type.as_str())
            .bind(new_discount.value_type.as_str())
            .bind(new_discount.value.to_string())
            .bind(&new_discount.currency)
            .bind(new_discount.effective_priority())
            .bind(new_discount.status.as_str())
            .bind(to_db_optional_timestamp(&new_discount.valid_from))
            .bind(to_db_optional_timestamp(&new_discount.valid_until))
            .bind(new_discount.compatible)
            .bind(new_discount.is_admin_created)
            .bind(new_discount.created_by.map(|u| u.to_string()))
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    DbError::Conflict(format!("Discount named '{}' already exists", new_discount.name))
                }
                other => DbError::from(other),
            })?;

            for incompatible in &new_discount.incompatible_with {
                query("INSERT INTO discount_incompatibilities (discount_id, incompatible_id) VALUES (?, ?)")
                    .bind(id.to_string())
                    .bind(incompatible.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(DbError::from)?;
            }
            Ok::<(), DomainError>(())
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

    async fn set_disabled(&self, id: Uuid) -> DomainResult<Discount> {
        self.set_status(id, DiscountStatus::Disabled).await
    }

    async fn set_active(&self, id: Uuid) -> DomainResult<Discount> {
        self.set_status(id, DiscountStatus::Active).await
    }

    async fn find_created_by_with_tx(
        &self,
        user_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<Vec<Discount>> {
        let rows = query_as::<_, DiscountRow>(&format!(
            "SELECT {} FROM discounts d WHERE d.created_by = ? ORDER BY d.created_at ASC",
            DISCOUNT_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&mut **tx)
        .await
        .map_err(DbError::from)?;

        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let mut incompatibilities = Self::load_incompatibilities(&mut **tx, &ids).await?;
        rows.into_iter()
            .map(|row| {
                let incompatible = incompatibilities.remove(&row.id).unwrap_or_default();
                row.into_entity(incompatible)
            })
            .collect()
    }

    async fn privacy_delete_with_tx(
        &self,
        id: Uuid,
        created_by_token: &str,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<()> {
        let created_by: Option<Option<String>> = sqlx::query_scalar("SELECT created_by FROM discounts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut **tx)
            .await
            .map_err(DbError::from)?;

        match created_by {
            None => Err(DomainError::EntityNotFound("Discount".to_string(), id)),
            Some(None) => Ok(()),
            Some(Some(_)) => {
                query(
                    "UPDATE discounts SET created_by_token = ?, created_by = NULL, status = ?, updated_at = ? \
                     WHERE id = ?",
                )
                .bind(created_by_token)
                .bind(DiscountStatus::Disabled.as_str())
                .bind(to_db_timestamp(&Utc::now()))
                .bind(id.to_string())
                .execute(&mut **tx)
                .await
                .map_err(DbError::from)?;
                Ok(())
            }
        }
    }

    async fn link_property(
        &self,
        discount_id: Uuid,
        property_id: Uuid,
        added_by: Option<Uuid>,
    ) -> DomainResult<DiscountProperty> {
        let id = Uuid::new_v4();
        let now = to_db_timestamp(&Utc::now());

        query(
            "INSERT INTO discount_properties (id, discount_id, property_id, added_by, is_active, created_at, \
             updated_at) VALUES (?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(id.to_string())
        .bind(discount_id.to_string())
        .bind(property_id.to_string())
        .bind(added_by.map(|u| u.to_string()))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                DbError::Conflict("Discount is already linked to this property".to_string())
            }
            other => DbError::from(other),
        })?;

        self.find_property_link(id).await
    }

    async fn find_property_link(&self, id: Uuid) -> DomainResult<DiscountProperty> {
        let row = query_as::<_, DiscountPropertyRow>(&format!(
            "SELECT {} FROM discount_properties WHERE id = ?",
            DISCOUNT_PROPERTY_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?
        .ok_or_else(|| DomainError::EntityNotFound("DiscountProperty".to_string(), id))?;

        row.into_entity()
    }

    async fn set_property_link_deactivated(&self, id: Uuid, removed_by: Uuid) -> DomainResult<DiscountProperty> {
        let link = self.find_property_link(id).await?;
        if !link.is_active {
            return Ok(link);
        }

        let now = to_db_timestamp(&Utc::now());
        query(
            "UPDATE discount_properties SET is_active = 0, removed_at = ?, removed_by = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(&now)
        .bind(removed_by.to_string())
        .bind(&now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        self.find_property_link(id).await
    }

    async fn set_property_link_active(&self, id: Uuid) -> DomainResult<DiscountProperty> {
        let link = self.find_property_link(id).await?;
        if link.is_active {
            return Ok(link);
        }

        query(
            "UPDATE discount_properties SET is_active = 1, removed_at = NULL, removed_by = NULL, updated_at = ? \
             WHERE id = ?",
        )
        .bind(to_db_timestamp(&Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        self.find_property_link(id).await
    }

    async fn assign_user(
        &self,
        discount_id: Uuid,
        user_id: Uuid,
        status: DiscountUserStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> DomainResult<DiscountUser> {
        let id = Uuid::new_v4();
        let now = to_db_timestamp(&Utc::now());

        query(
            "INSERT INTO discount_users (id, discount_id, user_id, status, expires_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(discount_id.to_string())
        .bind(user_id.to_string())
        .bind(status.as_str())
        .bind(to_db_optional_timestamp(&expires_at))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        self.find_user_assignment(id).await
    }

    async fn find_user_assignment(&self, id: Uuid) -> DomainResult<DiscountUser> {
        let row = query_as::<_, DiscountUserRow>(&format!(
            "SELECT {} FROM discount_users WHERE id = ?",
            DISCOUNT_USER_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::from)?
        .ok_or_else(|| DomainError::EntityNotFound("DiscountUser".to_string(), id))?;

        row.into_entity()
    }

    async fn set_user_used(&self, id: Uuid) -> DomainResult<DiscountUser> {
        self.set_user_status(id, DiscountUserStatus::Used).await
    }

    async fn set_user_expired(&self, id: Uuid) -> DomainResult<DiscountUser> {
        self.set_user_status(id, DiscountUserStatus::Expired).await
    }

    async fn find_applicable(
        &self,
        property_id: Uuid,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Discount>> {
        let now = to_db_timestamp(&now);

        let rows = (match user_id {
            None => {
                let sql = format!(
                    "SELECT DISTINCT {} FROM discounts d \
                     JOIN discount_properties dp ON dp.discount_id = d.id \
                     WHERE dp.property_id = ? AND {} ORDER BY d.priority ASC, d.created_at ASC",
                    DISCOUNT_COLUMNS, APPLICABLE_FILTER
                );
                query_as::<_, DiscountRow>(&sql)
                    .bind(property_id.to_string())
                    .bind(&now)
                    .bind(&now)
                    .fetch_all(&self.pool)
                    .await
            }
            Some(user_id) => {
                let sql = format!(
                    "SELECT DISTINCT {} FROM discounts d \
                     JOIN discount_properties dp ON dp.discount_id = d.id \
                     JOIN discount_users du ON du.discount_id = d.id \
                     WHERE dp.property_id = ? AND {} \
                     AND du.user_id = ? AND du.status = 'active' \
                     AND (du.expires_at IS NULL OR du.expires_at >= ?) \
                     ORDER BY d.priority ASC, d.created_at ASC",
                    DISCOUNT_COLUMNS, APPLICABLE_FILTER
                );
                query_as::<_, DiscountRow>(&sql)
                    .bind(property_id.to_string())
                    .bind(&now)
                    .bind(&now)
                    .bind(user_id.to_string())
                    .bind(&now)
                    .fetch_all(&self.pool)
                    .await
            }
        })
        .map_err(DbError::from)?;

        self.hydrate(rows).await
    }

    async fn find_base_for_properties(
        &self,
        property_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> DomainResult<HashMap<Uuid, Vec<Discount>>> {
        let mut by_property: HashMap<Uuid, Vec<Discount>> = HashMap::new();
        if property_ids.is_empty() {
            return Ok(by_property);
        }

        let now = to_db_timestamp(&now);
        let sql = format!(
            "SELECT dp.property_id AS property_id, {} FROM discounts d \
             JOIN discount_properties dp ON dp.discount_id = d.id \
             WHERE d.type IN (?, ?) AND dp.property_id IN ({}) AND {} \
             ORDER BY d.priority ASC, d.created_at ASC",
            DISCOUNT_COLUMNS,
            Self::placeholders(property_ids.len()),
            APPLICABLE_FILTER
        );

        let mut q = query_as::<_, PropertyDiscountRow>(&sql)
            .bind(DiscountType::Seasonal.as_str())
            .bind(DiscountType::Referral.as_str());
        for id in property_ids {
            q = q.bind(id.to_string());
        }
        let rows = q.bind(&now).bind(&now).fetch_all(&self.pool).await.map_err(DbError::from)?;

        let ids: Vec<String> = rows.iter().map(|r| r.discount.id.clone()).collect();
        let incompatibilities = Self::load_incompatibilities(&self.pool, &ids).await?;

        for row in rows {
            let property_id = parse_uuid(&row.property_id)?;
            let incompatible = incompatibilities.get(&row.discount.id).cloned().unwrap_or_default();
            by_property
                .entry(property_id)
                .or_default()
                .push(row.discount.into_entity(incompatible)?);
        }

        Ok(by_property)
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let now = to_db_timestamp(&now);
        let result = query(
            "UPDATE discounts SET status = ?, updated_at = ? \
             WHERE status = ? AND valid_until IS NOT NULL AND valid_until <= ?",
        )
        .bind(DiscountStatus::Expired.as_str())
        .bind(&now)
        .bind(DiscountStatus::Active.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(result.rows_affected())
    }

    async fn activate_due(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let now = to_db_timestamp(&now);
        let result = query(
            "UPDATE discounts SET status = ?, updated_at = ? \
             WHERE status = ? AND valid_from IS NOT NULL AND valid_from <= ?",
        )
        .bind(DiscountStatus::Active.as_str())
        .bind(&now)
        .bind(DiscountStatus::Scheduled.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::discount::types::DiscountValueType;
    use crate::domains::landlord::LandlordProfileType;
    use crate::test_support::{memory_pool, new_discount, seed_landlord, seed_property, seed_user};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_create_with_priority_and_incompatibilities() {
        let pool = memory_pool().await;
        let repo = SqliteDiscountRepository::new(pool.clone());

        let first = repo.create(&new_discount("Spring", DiscountType::Seasonal, dec!(10))).await.unwrap();
        let mut second = new_discount("Friends", DiscountType::Referral, dec!(5));
        second.incompatible_with = vec![first.id];
        let second = repo.create(&second).await.unwrap();

        assert_eq!(first.priority, 40);
        assert_eq!(second.priority, 20);
        assert_eq!(second.incompatible_with, vec![first.id]);
        assert!(repo.find_by_id(first.id).await.unwrap().incompatible_with.is_empty());

        let duplicate = repo.create(&new_discount("Spring", DiscountType::Coupon, dec!(3))).await;
        assert!(matches!(duplicate, Err(DomainError::Database(DbError::Conflict(_)))));
    }

    #[tokio::test]
    async fn test_status_toggles_are_idempotent() {
        let pool = memory_pool().await;
        let repo = SqliteDiscountRepository::new(pool.clone());
        let discount = repo.create(&new_discount("Toggle", DiscountType::Custom, dec!(10))).await.unwrap();

        let disabled = repo.set_disabled(discount.id).await.unwrap();
        assert_eq!(disabled.status, DiscountStatus::Disabled);
        let again = repo.set_disabled(discount.id).await.unwrap();
        assert_eq!(again.updated_at, disabled.updated_at);

        assert_eq!(repo.set_active(discount.id).await.unwrap().status, DiscountStatus::Active);
    }

    #[tokio::test]
    async fn test_privacy_delete_detaches_creator() {
        let pool = memory_pool().await;
        let repo = SqliteDiscountRepository::new(pool.clone());
        let creator = seed_user(&pool, "creator@example.com").await;

        let mut owned = new_discount("Owned", DiscountType::Custom, dec!(10));
        owned.created_by = Some(creator.id);
        let owned = repo.create(&owned).await.unwrap();
        let orphan = repo.create(&new_discount("Orphan", DiscountType::Custom, dec!(10))).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        assert_eq!(repo.find_created_by_with_tx(creator.id, &mut tx).await.unwrap().len(), 1);
        repo.privacy_delete_with_tx(owned.id, "tok", &mut tx).await.unwrap();
        repo.privacy_delete_with_tx(orphan.id, "tok", &mut tx).await.unwrap();
        tx.commit().await.unwrap();

        let owned = repo.find_by_id(owned.id).await.unwrap();
        assert_eq!(owned.created_by, None);
        assert_eq!(owned.created_by_token.as_deref(), Some("tok"));
        assert_eq!(owned.status, DiscountStatus::Disabled);

        let orphan = repo.find_by_id(orphan.id).await.unwrap();
        assert_eq!(orphan.created_by_token, None);
        assert_eq!(orphan.status, DiscountStatus::Active);
    }

    #[tokio::test]
    async fn test_property_link_lifecycle() {
        let pool = memory_pool().await;
        let repo = SqliteDiscountRepository::new(pool.clone());
        let owner = seed_user(&pool, "owner@example.com").await;
        let profile = seed_landlord(&pool, &owner, LandlordProfileType::Individual).await;
        let property = seed_property(&pool, &profile, dec!(100)).await;
        let discount = repo.create(&new_discount("Linked", DiscountType::Custom, dec!(10))).await.unwrap();

        let link = repo.link_property(discount.id, property.id, Some(owner.id)).await.unwrap();
        let removed = repo.set_property_link_deactivated(link.id, owner.id).await.unwrap();
        assert!(!removed.is_active);
        assert_eq!(removed.removed_by, Some(owner.id));
        assert!(removed.removed_at.is_some());
        assert!(repo.find_applicable(property.id, None, Utc::now()).await.unwrap().is_empty());

        let restored = repo.set_property_link_active(link.id).await.unwrap();
        assert!(restored.is_active);
        assert_eq!(restored.removed_by, None);
        assert_eq!(repo.find_applicable(property.id, None, Utc::now()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_applicable_for_user_requires_live_assignment() {
        let pool = memory_pool().await;
        let repo = SqliteDiscountRepository::new(pool.clone());
        let owner = seed_user(&pool, "owner@example.com").await;
        let guest = seed_user(&pool, "guest@example.com").await;
        let profile = seed_landlord(&pool, &owner, LandlordProfileType::Individual).await;
        let property = seed_property(&pool, &profile, dec!(100)).await;

        let mut fixed = new_discount("Welcome back", DiscountType::Welcome, dec!(5));
        fixed.value_type = DiscountValueType::Fixed;
        fixed.currency = Some("EUR".to_string());
        let discount = repo.create(&fixed).await.unwrap();
        repo.link_property(discount.id, property.id, None).await.unwrap();

        let now = Utc::now();
        assert!(repo.find_applicable(property.id, Some(guest.id), now).await.unwrap().is_empty());

        let assignment = repo
            .assign_user(discount.id, guest.id, DiscountUserStatus::Active, Some(now + Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(repo.find_applicable(property.id, Some(guest.id), now).await.unwrap().len(), 1);
        assert!(repo
            .find_applicable(property.id, Some(guest.id), now + Duration::days(2))
            .await
            .unwrap()
            .is_empty());

        let used = repo.set_user_used(assignment.id).await.unwrap();
        assert_eq!(used.status, DiscountUserStatus::Used);
        assert!(used.used_at.is_some());
        assert_eq!(repo.set_user_used(assignment.id).await.unwrap().used_at, used.used_at);
        assert!(repo.find_applicable(property.id, Some(guest.id), now).await.unwrap().is_empty());

        assert_eq!(repo.set_user_expired(assignment.id).await.unwrap().status, DiscountUserStatus::Expired);
    }

    #[tokio::test]
    async fn test_base_discounts_grouped_by_property() {
        let pool = memory_pool().await;
        let repo = SqliteDiscountRepository::new(pool.clone());
        let owner = seed_user(&pool, "owner@example.com").await;
        let profile = seed_landlord(&pool, &owner, LandlordProfileType::Individual).await;
        let first = seed_property(&pool, &profile, dec!(100)).await;
        let second = seed_property(&pool, &profile, dec!(80)).await;
        let bare = seed_property(&pool, &profile, dec!(60)).await;

        let referral = repo.create(&new_discount("Refer", DiscountType::Referral, dec!(5))).await.unwrap();
        let coupon = repo.create(&new_discount("Coupon", DiscountType::Coupon, dec!(5))).await.unwrap();
        repo.link_property(referral.id, first.id, None).await.unwrap();
        repo.link_property(referral.id, second.id, None).await.unwrap();
        repo.link_property(coupon.id, first.id, None).await.unwrap();

        let grouped = repo
            .find_base_for_properties(&[first.id, second.id, bare.id], Utc::now())
            .await
            .unwrap();
        assert_eq!(grouped.get(&first.id).map(Vec::len), Some(1));
        assert_eq!(grouped.get(&second.id).map(Vec::len), Some(1));
        assert!(!grouped.contains_key(&bare.id));
    }

    #[tokio::test]
    async fn test_expire_and_activate_due() {
        let pool = memory_pool().await;
        let repo = SqliteDiscountRepository::new(pool.clone());
        let now = Utc::now();

        let mut ending = new_discount("Ending", DiscountType::Seasonal, dec!(10));
        ending.valid_from = Some(now + Duration::minutes(1));
        ending.valid_until = Some(now + Duration::hours(1));
        let ending = repo.create(&ending).await.unwrap();

        let mut upcoming = new_discount("Upcoming", DiscountType::Seasonal, dec!(10));
        upcoming.status = DiscountStatus::Scheduled;
        upcoming.valid_from = Some(now + Duration::minutes(30));
        upcoming.valid_until = Some(now + Duration::days(3));
        let upcoming = repo.create(&upcoming).await.unwrap();

        let later = now + Duration::hours(2);
        assert_eq!(repo.expire_due(later).await.unwrap(), 1);
        assert_eq!(repo.activate_due(later).await.unwrap(), 1);
        assert_eq!(repo.find_by_id(ending.id).await.unwrap().status, DiscountStatus::Expired);
        assert_eq!(repo.find_by_id(upcoming.id).await.unwrap().status, DiscountStatus::Active);

        assert_eq!(repo.expire_due(later).await.unwrap(), 0);
    }
}
