use crate::errors::{DomainError, DomainResult};
use crate::types::{parse_datetime, parse_optional_datetime, parse_optional_uuid, parse_uuid};
use crate::validation::{Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LandlordProfileType {
    Individual,
    Company,
}

impl LandlordProfileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LandlordProfileType::Individual => "individual",
            LandlordProfileType::Company => "company",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "individual" => Some(LandlordProfileType::Individual),
            "company" => Some(LandlordProfileType::Company),
            _ => None,
        }
    }
}

impl fmt::Display for LandlordProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Public face of a landlord: either a person or a company
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandlordProfile {
    pub id: Uuid,
    pub profile_type: LandlordProfileType,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub description: String,
    pub created_by: Option<Uuid>,
    pub created_by_token: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LandlordProfile {
    pub fn is_company(&self) -> bool {
        self.profile_type == LandlordProfileType::Company
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLandlordProfile {
    pub profile_type: LandlordProfileType,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub description: String,
    pub created_by: Uuid,
}

impl Validate for NewLandlordProfile {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .max_length(255)
            .validate()?;

        ValidationBuilder::new("email", Some(self.email.clone()))
            .required()
            .email()
            .validate()?;

        ValidationBuilder::new("description", Some(self.description.clone()))
            .max_length(4000)
            .validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct LandlordProfileRow {
    pub id: String,
    #[sqlx(rename = "type")]
    pub profile_type: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub description: String,
    pub created_by: Option<String>,
    pub created_by_token: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl LandlordProfileRow {
    pub fn into_entity(self) -> DomainResult<LandlordProfile> {
        Ok(LandlordProfile {
            id: parse_uuid(&self.id)?,
            profile_type: LandlordProfileType::from_str(&self.profile_type).ok_or_else(|| {
                DomainError::Internal(format!("Invalid landlord profile type: {}", self.profile_type))
            })?,
            name: self.name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            description: self.description,
            created_by: parse_optional_uuid(&self.created_by)?,
            created_by_token: self.created_by_token,
            is_deleted: self.is_deleted,
            deleted_at: parse_optional_datetime(&self.deleted_at, "deleted_at")?,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipRole {
    Admin,
    Manager,
    Member,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Admin => "admin",
            MembershipRole::Manager => "manager",
            MembershipRole::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(MembershipRole::Admin),
            "manager" => Some(MembershipRole::Manager),
            "member" => Some(MembershipRole::Member),
            _ => None,
        }
    }
}

/// A user's seat in a company landlord profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyMembership {
    pub id: Uuid,
    pub company_id: Uuid,
    pub user_id: Option<Uuid>,
    pub user_token: Option<String>,
    pub role: MembershipRole,
    pub is_active: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCompanyMembership {
    pub company_id: Uuid,
    pub user_id: Uuid,
    pub role: MembershipRole,
}

#[derive(Debug, Clone, FromRow)]
pub struct CompanyMembershipRow {
    pub id: String,
    pub company_id: String,
    pub user_id: Option<String>,
    pub user_token: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
    pub joined_at: String,
    pub left_at: Option<String>,
    pub updated_at: String,
}

impl CompanyMembershipRow {
    pub fn into_entity(self) -> DomainResult<CompanyMembership> {
        Ok(CompanyMembership {
            id: parse_uuid(&self.id)?,
            company_id: parse_uuid(&self.company_id)?,
            user_id: parse_optional_uuid(&self.user_id)?,
            user_token: self.user_token,
            role: MembershipRole::from_str(&self.role).ok_or_else(|| {
                DomainError::Internal(format!("Invalid membership role: {}", self.role))
            })?,
            is_active: self.is_active,
            is_deleted: self.is_deleted,
            deleted_at: parse_optional_datetime(&self.deleted_at, "deleted_at")?,
            joined_at: parse_datetime(&self.joined_at, "joined_at")?,
            left_at: parse_optional_datetime(&self.left_at, "left_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}
