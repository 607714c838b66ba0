use crate::errors::{DbError, DomainError, DomainResult};
use crate::types::{parse_datetime, parse_optional_uuid, parse_uuid, to_db_timestamp};
use crate::validation::{Validate, ValidationBuilder};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use sqlx::{query, query_as, FromRow, Pool, Sqlite, Transaction};
use std::sync::Arc;
use uuid::Uuid;

const LOG_COLUMNS: &str = "id, deleted_by, deleted_by_token, deleted_model_name, deleted_object_id, reason, \
    deletion_type, is_cascade, parent_log_id, parent_log_name, deleted_at, created_at";

/// Name recorded on child logs for their parent
pub const PARENT_LOG_NAME: &str = "deletionlog";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionType {
    SoftDelete,
    PrivacyDelete,
}

impl DeletionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionType::SoftDelete => "soft_delete",
            DeletionType::PrivacyDelete => "privacy_delete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "soft_delete" => Some(DeletionType::SoftDelete),
            "privacy_delete" => Some(DeletionType::PrivacyDelete),
            _ => None,
        }
    }
}

/// Kind of row a log entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeletedModel {
    User,
    LandlordProfile,
    Property,
    CompanyMembership,
    Review,
    Booking,
    Discount,
}

impl DeletedModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletedModel::User => "properties.user",
            DeletedModel::LandlordProfile => "properties.landlordprofile",
            DeletedModel::Property => "properties.property",
            DeletedModel::CompanyMembership => "properties.companymembership",
            DeletedModel::Review => "properties.review",
            DeletedModel::Booking => "properties.booking",
            DeletedModel::Discount => "properties.discount",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "properties.user" => Some(DeletedModel::User),
            "properties.landlordprofile" => Some(DeletedModel::LandlordProfile),
            "properties.property" => Some(DeletedModel::Property),
            "properties.companymembership" => Some(DeletedModel::CompanyMembership),
            "properties.review" => Some(DeletedModel::Review),
            "properties.booking" => Some(DeletedModel::Booking),
            "properties.discount" => Some(DeletedModel::Discount),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            DeletedModel::User => "User",
            DeletedModel::LandlordProfile => "LandlordProfile",
            DeletedModel::Property => "Property",
            DeletedModel::CompanyMembership => "CompanyMembership",
            DeletedModel::Review => "Review",
            DeletedModel::Booking => "Booking",
            DeletedModel::Discount => "Discount",
        }
    }
}

/// Immutable audit record of one deleted or depersonalized row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionLog {
    pub id: Uuid,
    pub deleted_by: Option<Uuid>,
    pub deleted_by_token: Option<String>,
    pub deleted_model: DeletedModel,
    pub deleted_object_id: Uuid,
    pub reason: Option<String>,
    pub deletion_type: DeletionType,
    pub is_cascade: bool,
    pub parent_log_id: Option<Uuid>,
    pub parent_log_name: String,
    pub deleted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDeletionLog {
    pub deleted_by: Uuid,
    pub deleted_model: DeletedModel,
    pub deleted_object_id: Uuid,
    pub reason: Option<String>,
    pub deletion_type: DeletionType,
    pub parent_log_id: Option<Uuid>,
}

impl Validate for NewDeletionLog {
    fn validate(&self) -> DomainResult<()> {
        if let Some(reason) = &self.reason {
            ValidationBuilder::new("reason", Some(reason.clone()))
                .min_length(7)
                .max_length(2000)
                .validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DeletionLogRow {
    pub id: String,
    pub deleted_by: Option<String>,
    pub deleted_by_token: Option<String>,
    pub deleted_model_name: String,
    pub deleted_object_id: String,
    pub reason: Option<String>,
    pub deletion_type: String,
    pub is_cascade: bool,
    pub parent_log_id: Option<String>,
    pub parent_log_name: String,
    pub deleted_at: String,
    pub created_at: String,
}

impl DeletionLogRow {
    pub fn into_entity(self) -> DomainResult<DeletionLog> {
        Ok(DeletionLog {
            id: parse_uuid(&self.id)?,
            deleted_by: parse_optional_uuid(&self.deleted_by)?,
            deleted_by_token: self.deleted_by_token,
            deleted_model: DeletedModel::from_str(&self.deleted_model_name).ok_or_else(|| {
                DomainError::Internal(format!("Invalid deleted model: {}", self.deleted_model_name))
            })?,
            deleted_object_id: parse_uuid(&self.deleted_object_id)?,
            reason: self.reason,
            deletion_type: DeletionType::from_str(&self.deletion_type)
                .ok_or_else(|| DomainError::Internal(format!("Invalid deletion type: {}", self.deletion_type)))?,
            is_cascade: self.is_cascade,
            parent_log_id: parse_optional_uuid(&self.parent_log_id)?,
            parent_log_name: self.parent_log_name,
            deleted_at: parse_datetime(&self.deleted_at, "deleted_at")?,
            created_at: parse_datetime(&self.created_at, "created_at")?,
        })
    }
}

#[async_trait]
pub trait DeletionLogRepository: Send + Sync {
    async fn create_with_tx(
        &self,
        new_log: &NewDeletionLog,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<DeletionLog>;

    async fn find_by_id(&self, id: Uuid) -> DomainResult<DeletionLog>;

    async fn find_by_actor(&self, user_id: Uuid) -> DomainResult<Vec<DeletionLog>>;

    async fn find_by_object(&self, model: DeletedModel, object_id: Uuid) -> DomainResult<Vec<DeletionLog>>;

    async fn find_children(&self, parent_log_id: Uuid) -> DomainResult<Vec<DeletionLog>>;

    /// The root log followed by every descendant, oldest first.
    async fn find_tree(&self, root_id: Uuid) -> DomainResult<Vec<DeletionLog>>;
}

/// SQLite implementation for DeletionLogRepository
#[derive(Debug, Clone)]
pub struct SqliteDeletionLogRepository {
    pool: Pool<Sqlite>,
}

impl SqliteDeletionLogRepository {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    fn map_rows(rows: Vec<DeletionLogRow>) -> DomainResult<Vec<DeletionLog>> {
        rows.into_iter().map(DeletionLogRow::into_entity).collect()
    }
}

#[async_trait]
impl DeletionLogRepository for SqliteDeletionLogRepository {
    async fn create_with_tx(
        &self,
        new_log: &NewDeletionLog,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<DeletionLog> {
        new_log.validate()?;

        let id = Uuid::new_v4();
        let now = to_db_timestamp(&Utc::now());
        let parent_log_name = if new_log.parent_log_id.is_some() { PARENT_LOG_NAME } else { "" };

        query(
            "INSERT INTO deletion_logs (id, deleted_by, deleted_model_name, deleted_object_id, reason, \
             deletion_type, is_cascade, parent_log_id, parent_log_name, deleted_at, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(new_log.deleted_by.to_string())
        .bind(new_log.deleted_model.as_str())
        .bind(new_log.deleted_object_id.to_string())
        .bind(&new_log.reason)
        .bind(new_log.deletion_type.as_str())
        .bind(new_log.parent_log_id.is_some())
        .bind(new_log.parent_log_id.map(|p| p.to_string()))
        .bind(parent_log_name)
        .bind(&now)
        .bind(&now)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            DomainError::Internal(format!(
                "Failed to create deletion log for {} with id={}: {}",
                new_log.deleted_model.type_name(),
                new_log.deleted_object_id,
                DbError::from(e)
            ))
        })?;

        let row = query_as::<_, DeletionLogRow>(&format!("SELECT {} FROM deletion_logs WHERE id = ?", LOG_COLUMNS))
            .bind(id.to_string())
            .fetch_one(&mut **tx)
            .await
            .map_err(DbError::from)?;

        row.into_entity()
    }

    async fn find_by_id(&self, id: Uuid) -> DomainResult<DeletionLog> {
        let row = query_as::<_, DeletionLogRow>(&format!("SELECT {} FROM deletion_logs WHERE id = ?", LOG_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| DomainError::EntityNotFound("DeletionLog".to_string(), id))?;

        row.into_entity()
    }

    async fn find_by_actor(&self, user_id: Uuid) -> DomainResult<Vec<DeletionLog>> {
        let rows = query_as::<_, DeletionLogRow>(&format!(
            "SELECT {} FROM deletion_logs WHERE deleted_by = ? ORDER BY created_at ASC, rowid ASC",
            LOG_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Self::map_rows(rows)
    }

    async fn find_by_object(&self, model: DeletedModel, object_id: Uuid) -> DomainResult<Vec<DeletionLog>> {
        let rows = query_as::<_, DeletionLogRow>(&format!(
            "SELECT {} FROM deletion_logs WHERE deleted_model_name = ? AND deleted_object_id = ? \
             ORDER BY created_at ASC, rowid ASC",
            LOG_COLUMNS
        ))
        .bind(model.as_str())
        .bind(object_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Self::map_rows(rows)
    }

    async fn find_children(&self, parent_log_id: Uuid) -> DomainResult<Vec<DeletionLog>> {
        let rows = query_as::<_, DeletionLogRow>(&format!(
            "SELECT {} FROM deletion_logs WHERE parent_log_id = ? ORDER BY created_at ASC, rowid ASC",
            LOG_COLUMNS
        ))
        .bind(parent_log_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Self::map_rows(rows)
    }

    async fn find_tree(&self, root_id: Uuid) -> DomainResult<Vec<DeletionLog>> {
        let rows = query_as::<_, DeletionLogRow>(&format!(
            "WITH RECURSIVE tree(id) AS ( \
                 SELECT id FROM deletion_logs WHERE id = ? \
                 UNION ALL \
                 SELECT l.id FROM deletion_logs l JOIN tree t ON l.parent_log_id = t.id \
             ) \
             SELECT {} FROM deletion_logs WHERE id IN (SELECT id FROM tree) ORDER BY created_at ASC, rowid ASC",
            LOG_COLUMNS
        ))
        .bind(root_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::from)?;

        Self::map_rows(rows)
    }
}

/// Writes the audit entries of one cascade: a root entry and children hanging off it
#[derive(Clone)]
pub struct DeletionLogTree {
    repo: Arc<dyn DeletionLogRepository>,
    deleted_by: Uuid,
    deletion_type: DeletionType,
}

impl DeletionLogTree {
    pub fn new(repo: Arc<dyn DeletionLogRepository>, deleted_by: Uuid, deletion_type: DeletionType) -> Self {
        Self {
            repo,
            deleted_by,
            deletion_type,
        }
    }

    pub fn deletion_type(&self) -> DeletionType {
        self.deletion_type
    }

    pub async fn root(
        &self,
        model: DeletedModel,
        object_id: Uuid,
        reason: Option<&str>,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<DeletionLog> {
        self.write(model, object_id, reason, None, tx).await
    }

    pub async fn child(
        &self,
        parent: &DeletionLog,
        model: DeletedModel,
        object_id: Uuid,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<DeletionLog> {
        self.write(model, object_id, None, Some(parent.id), tx).await
    }

    async fn write(
        &self,
        model: DeletedModel,
        object_id: Uuid,
        reason: Option<&str>,
        parent_log_id: Option<Uuid>,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> DomainResult<DeletionLog> {
        let new_log = NewDeletionLog {
            deleted_by: self.deleted_by,
            deleted_model: model,
            deleted_object_id: object_id,
            reason: reason.map(str::to_string),
            deletion_type: self.deletion_type,
            parent_log_id,
        };
        let log = self.repo.create_with_tx(&new_log, tx).await?;
        debug!(
            "Logged {} of {} {} (parent {:?})",
            self.deletion_type.as_str(),
            model.type_name(),
            object_id,
            parent_log_id
        );
        Ok(log)
    }
}
