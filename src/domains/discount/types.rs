use crate::errors::{DomainError, DomainResult, ValidationError};
use crate::types::{parse_datetime, parse_decimal, parse_optional_datetime, parse_optional_uuid, parse_uuid};
use crate::validation::{NestedValidator, Validate, ValidationBuilder};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const PAST_VALID_FROM: &str = "Start date (time) cannot be in the past.";
pub const SHORT_DURATION: &str =
    "The end date (time) must be at least one day (hour) later than the start date (time).";
pub const CURRENCY_REQUIRED: &str = "For fixed amounts, you must specify the currency.";
pub const SEASONAL_DATES_REQUIRED: &str =
    "For seasonal discounts, you need to specify the start and end dates.";
pub const SCHEDULED_DATES_REQUIRED: &str =
    "For scheduled discounts, you need to specify the start and end dates.";
pub const BOTH_DATES_REQUIRED: &str = "You need to specify both the start and end dates.";
pub const PRICING_UNAVAILABLE: &str =
    "Unexpected issues occurred while checking for discounts. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscountType {
    Seasonal,
    Referral,
    Custom,
    Coupon,
    Welcome,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Seasonal => "seasonal",
            DiscountType::Referral => "referral",
            DiscountType::Custom => "custom",
            DiscountType::Coupon => "coupon",
            DiscountType::Welcome => "welcome",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "seasonal" => Some(DiscountType::Seasonal),
            "referral" => Some(DiscountType::Referral),
            "custom" => Some(DiscountType::Custom),
            "coupon" => Some(DiscountType::Coupon),
            "welcome" => Some(DiscountType::Welcome),
            _ => None,
        }
    }

    /// Seasonal and referral discounts reduce the listed price directly.
    pub fn is_base(&self) -> bool {
        matches!(self, DiscountType::Seasonal | DiscountType::Referral)
    }

    pub fn default_priority(&self) -> i64 {
        match self {
            DiscountType::Custom => 10,
            DiscountType::Referral => 20,
            DiscountType::Coupon => 30,
            DiscountType::Seasonal | DiscountType::Welcome => 40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountValueType {
    Percentage,
    Fixed,
}

impl DiscountValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountValueType::Percentage => "percentage",
            DiscountValueType::Fixed => "fixed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(DiscountValueType::Percentage),
            "fixed" => Some(DiscountValueType::Fixed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountStatus {
    Draft,
    Scheduled,
    Active,
    Expired,
    Disabled,
}

impl DiscountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountStatus::Draft => "draft",
            DiscountStatus::Scheduled => "scheduled",
            DiscountStatus::Active => "active",
            DiscountStatus::Expired => "expired",
            DiscountStatus::Disabled => "disabled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(DiscountStatus::Draft),
            "scheduled" => Some(DiscountStatus::Scheduled),
            "active" => Some(DiscountStatus::Active),
            "expired" => Some(DiscountStatus::Expired),
            "disabled" => Some(DiscountStatus::Disabled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discount {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub value_type: DiscountValueType,
    pub value: Decimal,
    pub currency: Option<String>,
    pub priority: i64,
    pub status: DiscountStatus,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub compatible: bool,
    /// Discounts this one must not be combined with; the relation is one-directional
    pub incompatible_with: Vec<Uuid>,
    pub is_admin_created: bool,
    pub created_by: Option<Uuid>,
    pub created_by_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Discount {
    /// Amount the discount takes off the given price.
    pub fn saving(&self, base_price: Decimal) -> Decimal {
        match self.value_type {
            DiscountValueType::Percentage => base_price * (self.value / dec!(100)),
            DiscountValueType::Fixed => self.value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDiscount {
    pub name: String,
    pub description: String,
    pub discount_type: DiscountType,
    pub value_type: DiscountValueType,
    pub value: Decimal,
    pub currency: Option<String>,
    /// Filled from the discount type when unset or zero
    pub priority: Option<i64>,
    pub status: DiscountStatus,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub compatible: bool,
    pub incompatible_with: Vec<Uuid>,
    pub is_admin_created: bool,
    pub created_by: Option<Uuid>,
}

impl NewDiscount {
    pub fn effective_priority(&self) -> i64 {
        match self.priority {
            Some(priority) if priority != 0 => priority,
            _ => self.discount_type.default_priority(),
        }
    }

    /// Every date and currency rule the discount breaks, in a stable order without repeats.
    pub fn clean_errors(&self, now: DateTime<Utc>) -> Vec<&'static str> {
        let mut errors: Vec<&'static str> = Vec::new();
        let mut push = |message: &'static str| {
            if !errors.contains(&message) {
                errors.push(message);
            }
        };

        let has_from = self.valid_from.is_some();
        let has_until = self.valid_until.is_some();

        if self.discount_type == DiscountType::Seasonal {
            if !has_from || !has_until {
                push(SEASONAL_DATES_REQUIRED);
            }
        } else if has_from != has_until {
            push(BOTH_DATES_REQUIRED);
        }

        if self.status == DiscountStatus::Scheduled {
            if !has_from || !has_until {
                push(SCHEDULED_DATES_REQUIRED);
            }
        } else if has_from != has_until {
            push(BOTH_DATES_REQUIRED);
        }

        if matches!(self.valid_from, Some(from) if from < now) {
            push(PAST_VALID_FROM);
        }

        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until) {
            if until <= from {
                push(SHORT_DURATION);
            }
        }

        let missing_currency = self.currency.as_deref().map(str::trim).unwrap_or("").is_empty();
        if self.value_type == DiscountValueType::Fixed && missing_currency {
            push(CURRENCY_REQUIRED);
        }

        errors
    }

    pub fn clean(&self, now: DateTime<Utc>) -> DomainResult<()> {
        let mut validator = NestedValidator::new();
        for message in self.clean_errors(now) {
            validator.add_error(ValidationError::custom(message));
        }
        validator.validate()
    }
}

impl Validate for NewDiscount {
    fn validate(&self) -> DomainResult<()> {
        ValidationBuilder::new("name", Some(self.name.clone()))
            .required()
            .max_length(100)
            .validate()?;

        ValidationBuilder::new("value", Some(self.value))
            .min(dec!(0.01))
            .validate()?;

        if self.value_type == DiscountValueType::Percentage {
            ValidationBuilder::new("value", Some(self.value))
                .range(dec!(0.01), dec!(100))
                .validate()?;
        }

        ValidationBuilder::new("priority", Some(self.effective_priority()))
            .range(0, 100)
            .validate()?;

        self.clean(Utc::now())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DiscountRow {
    pub id: String,
    pub name: String,
    pub description: String,
    #[sqlx(rename = "type")]
    pub discount_type: String,
    pub value_type: String,
    pub value: String,
    pub currency: Option<String>,
    pub priority: i64,
    pub status: String,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    pub compatible: bool,
    pub is_admin_created: bool,
    pub created_by: Option<String>,
    pub created_by_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl DiscountRow {
    pub fn into_entity(self, incompatible_with: Vec<Uuid>) -> DomainResult<Discount> {
        Ok(Discount {
            id: parse_uuid(&self.id)?,
            name: self.name,
            description: self.description,
            discount_type: DiscountType::from_str(&self.discount_type).ok_or_else(|| {
                DomainError::Internal(format!("Invalid discount type: {}", self.discount_type))
            })?,
            value_type: DiscountValueType::from_str(&self.value_type).ok_or_else(|| {
                DomainError::Internal(format!("Invalid discount value type: {}", self.value_type))
            })?,
            value: parse_decimal(&self.value, "value")?,
            currency: self.currency,
            priority: self.priority,
            status: DiscountStatus::from_str(&self.status)
                .ok_or_else(|| DomainError::Internal(format!("Invalid discount status: {}", self.status)))?,
            valid_from: parse_optional_datetime(&self.valid_from, "valid_from")?,
            valid_until: parse_optional_datetime(&self.valid_until, "valid_until")?,
            compatible: self.compatible,
            incompatible_with,
            is_admin_created: self.is_admin_created,
            created_by: parse_optional_uuid(&self.created_by)?,
            created_by_token: self.created_by_token,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

/// Link between a discount and a property it applies to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountProperty {
    pub id: Uuid,
    pub discount_id: Uuid,
    pub property_id: Uuid,
    pub added_by: Option<Uuid>,
    pub is_active: bool,
    pub removed_at: Option<DateTime<Utc>>,
    pub removed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DiscountPropertyRow {
    pub id: String,
    pub discount_id: String,
    pub property_id: String,
    pub added_by: Option<String>,
    pub is_active: bool,
    pub removed_at: Option<String>,
    pub removed_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl DiscountPropertyRow {
    pub fn into_entity(self) -> DomainResult<DiscountProperty> {
        Ok(DiscountProperty {
            id: parse_uuid(&self.id)?,
            discount_id: parse_uuid(&self.discount_id)?,
            property_id: parse_uuid(&self.property_id)?,
            added_by: parse_optional_uuid(&self.added_by)?,
            is_active: self.is_active,
            removed_at: parse_optional_datetime(&self.removed_at, "removed_at")?,
            removed_by: parse_optional_uuid(&self.removed_by)?,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountUserStatus {
    Scheduled,
    Active,
    Used,
    Expired,
    Removed,
}

impl DiscountUserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountUserStatus::Scheduled => "scheduled",
            DiscountUserStatus::Active => "active",
            DiscountUserStatus::Used => "used",
            DiscountUserStatus::Expired => "expired",
            DiscountUserStatus::Removed => "removed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(DiscountUserStatus::Scheduled),
            "active" => Some(DiscountUserStatus::Active),
            "used" => Some(DiscountUserStatus::Used),
            "expired" => Some(DiscountUserStatus::Expired),
            "removed" => Some(DiscountUserStatus::Removed),
            _ => None,
        }
    }
}

/// Assignment of a discount to a single user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountUser {
    pub id: Uuid,
    pub discount_id: Uuid,
    pub user_id: Option<Uuid>,
    pub status: DiscountUserStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DiscountUserRow {
    pub id: String,
    pub discount_id: String,
    pub user_id: Option<String>,
    pub status: String,
    pub expires_at: Option<String>,
    pub used_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl DiscountUserRow {
    pub fn into_entity(self) -> DomainResult<DiscountUser> {
        Ok(DiscountUser {
            id: parse_uuid(&self.id)?,
            discount_id: parse_uuid(&self.discount_id)?,
            user_id: parse_optional_uuid(&self.user_id)?,
            status: DiscountUserStatus::from_str(&self.status).ok_or_else(|| {
                DomainError::Internal(format!("Invalid discount user status: {}", self.status))
            })?,
            expires_at: parse_optional_datetime(&self.expires_at, "expires_at")?,
            used_at: parse_optional_datetime(&self.used_at, "used_at")?,
            created_at: parse_datetime(&self.created_at, "created_at")?,
            updated_at: parse_datetime(&self.updated_at, "updated_at")?,
        })
    }
}
