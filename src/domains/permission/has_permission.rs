use serde::{Deserialize, Serialize};

// --- User Role Definition ---

/// Role of an acting user, derived from the account flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    Admin,
    Moderator,
    Member,
}

// --- Permission Enum Definition ---

/// Permission enum representing individual capabilities in the marketplace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    // Self-service
    DeleteOwnAccount,
    DeleteOwnListings,

    // Moderation
    DeleteAnyAccount,
    DeleteAnyLandlordProfile,
    DeleteAnyProperty,

    // Administration
    DepersonalizeAccount,
    ViewDeletionLogs,
    ManageDiscounts,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Moderator => "moderator",
            UserRole::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "moderator" => Some(UserRole::Moderator),
            "member" => Some(UserRole::Member),
            _ => None,
        }
    }

    /// Admin wins over moderator when both flags are set.
    pub fn from_flags(is_admin: bool, is_moderator: bool) -> Self {
        if is_admin {
            UserRole::Admin
        } else if is_moderator {
            UserRole::Moderator
        } else {
            UserRole::Member
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        match self {
            UserRole::Admin => true,
            UserRole::Moderator => match permission {
                Permission::DepersonalizeAccount
                | Permission::ManageDiscounts => false,

                Permission::DeleteOwnAccount
                | Permission::DeleteOwnListings
                | Permission::DeleteAnyAccount
                | Permission::DeleteAnyLandlordProfile
                | Permission::DeleteAnyProperty
                | Permission::ViewDeletionLogs => true,
            },
            UserRole::Member => matches!(
                permission,
                Permission::DeleteOwnAccount | Permission::DeleteOwnListings
            ),
        }
    }

    /// Check if the role has all of the specified permissions
    pub fn has_permissions(&self, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.has_permission(*p))
    }

    /// Admins and moderators may act on records they do not own
    pub fn can_moderate(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Moderator)
    }
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::DeleteOwnAccount => "delete_own_account",
            Permission::DeleteOwnListings => "delete_own_listings",
            Permission::DeleteAnyAccount => "delete_any_account",
            Permission::DeleteAnyLandlordProfile => "delete_any_landlord_profile",
            Permission::DeleteAnyProperty => "delete_any_property",
            Permission::DepersonalizeAccount => "depersonalize_account",
            Permission::ViewDeletionLogs => "view_deletion_logs",
            Permission::ManageDiscounts => "manage_discounts",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "delete_own_account" => Some(Permission::DeleteOwnAccount),
            "delete_own_listings" => Some(Permission::DeleteOwnListings),
            "delete_any_account" => Some(Permission::DeleteAnyAccount),
            "delete_any_landlord_profile" => Some(Permission::DeleteAnyLandlordProfile),
            "delete_any_property" => Some(Permission::DeleteAnyProperty),
            "depersonalize_account" => Some(Permission::DepersonalizeAccount),
            "view_deletion_logs" => Some(Permission::ViewDeletionLogs),
            "manage_discounts" => Some(Permission::ManageDiscounts),
            _ => None,
        }
    }

    pub fn all() -> Vec<Permission> {
        vec![
            Permission::DeleteOwnAccount, Permission::DeleteOwnListings,
            Permission::DeleteAnyAccount, Permission::DeleteAnyLandlordProfile, Permission::DeleteAnyProperty,
            Permission::DepersonalizeAccount, Permission::ViewDeletionLogs, Permission::ManageDiscounts,
        ]
    }
}
