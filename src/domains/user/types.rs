use crate::errors::{DomainError, DomainResult};
use crate::types::{
    parse_datetime, parse_optional_datetime, parse_optional_uuid, parse_uuid, UserRole,
};
use crate::validation::{Validate, ValidationBuilder};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

/// How an account participates in renting out properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LandlordType {
    None,
    Individual,
    Company,
    CompanyMember,
}

impl LandlordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LandlordType::None => "none",
            LandlordType::Individual => "individual",
            LandlordType::Company => "company",
            LandlordType::CompanyMember => "company_member",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" | "" => Some(LandlordType::None),
            "individual" => Some(LandlordType::Individual),
            "company" => Some(LandlordType::Company),
            "company_member" => Some(LandlordType::CompanyMember),
            _ => None,
        }
    }

    /// Owners have landlord profiles of their own; members only hold memberships.
    pub fn owns_profiles(&self) -> bool {
        matches!(self, LandlordType::Individual | LandlordType::Company)
    }
}

impl fmt::Display for LandlordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Account of a guest, landlord or staff member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub is_admin: bool,
    pub is_moderator: bool,
    pub is_landlord: bool,
    pub landlord_type: LandlordType,
    pub is_verified: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> UserRole {
        UserRole::from_flags(self.is_admin, self.is_moderator)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// Landlord that owns individual or company profiles
    pub fn owns_landlord_profiles(&self) -> bool {
        self.is_landlord && self.landlord_type.owns_profiles()
    }

    pub fn is_company_member(&self) -> bool {
        self.is_landlord && self.landlord_type == LandlordType::CompanyMember
    }
}

/// Replacement identity written by a privacy delete
pub fn depersonalized_username(id: Uuid) -> String {
    format!("deleted_{}", id)
}

pub fn depersonalized_email(id: Uuid) -> String {
    format!("deleted_{}@example.com", id)
}

/// NewUser DTO
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub password: String,
    pub is_admin: bool,
    pub is_moderator: bool,
    pub is_landlord: bool,
    pub landlord_type: Option<LandlordType>,
}

impl Validate for NewUser {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("email", Some(self.email.clone()))
            .required()
            .email()
            .max_length(254)
            .validate()?;

        if let Some(username) = &self.username {
            ValidationBuilder::new("username", Some(username.clone()))
                .min_length(2)
                .max_length(150)
                .validate()?;
        }

        ValidationBuilder::new("first_name", Some(self.first_name.clone()))
            .max_length(150)
            .validate()?;

        ValidationBuilder::new("last_name", Some(self.last_name.clone()))
            .max_length(150)
            .validate()?;

        let landlord_type = self.landlord_type.unwrap_or(LandlordType::None);
        if !self.is_landlord && landlord_type != LandlordType::None {
            return Err(DomainError::Validation(crate::errors::ValidationError::invalid_value(
                "landlord_type",
                "only landlords can have a landlord type",
            )));
        }

        Ok(())
    }
}

/// UserRow - SQLite row representation for mapping from database
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<String>,
    pub is_admin: bool,
    pub is_moderator: bool,
    pub is_landlord: bool,
    pub landlord_type: String,
    pub is_verified: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRow {
    /// Convert database row to domain entity
    pub fn into_entity(self) -> DomainResult<User> {
        let date_of_birth = self
            .date_of_birth
            .as_deref()
            .map(|raw| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| DomainError::Internal(format!("Invalid date_of_birth format: {}", raw)))
            })
            .transpose()?;

        Ok(User {
            id: parse_uuid(&self.id)?,
            email: self.email,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            date_of_birth,
            is_admin: self.is_admin,
            is_moderator: self.is_moderator,
            is_landlord: self.is_landlord,
            landlord_type: LandlordType::from_str(&self.landlord_type).ok_or_else(|| {
                DomainError::Internal(format!("Invalid landlord type: {}", self.landlord_type))
            })?,
            is_verified: self.is_verified,
            is_deleted: self.is_deleted,
            deleted_at: parse_optional_datetime(&self.deleted_at, "deleted_at")?,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

/// Personal details kept apart from the account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_token: Option<String>,
    pub phone: Option<String>,
    pub gender: String,
    pub citizenship: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUserProfile {
    pub user_id: Uuid,
    pub phone: Option<String>,
    pub gender: String,
    pub citizenship: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserProfileRow {
    pub id: String,
    pub user_id: Option<String>,
    pub user_token: Option<String>,
    pub phone: Option<String>,
    pub gender: String,
    pub citizenship: String,
    pub created_at: String,
    pub updated_at: String,
}

impl UserProfileRow {
    pub fn into_entity(self) -> DomainResult<UserProfile> {
        Ok(UserProfile {
            id: parse_uuid(&self.id)?,
            user_id: parse_optional_uuid(&self.user_id)?,
            user_token: self.user_token,
            phone: self.phone,
            gender: self.gender,
            citizenship: self.citizenship,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}
