use uuid::Uuid;
use crate::types::{UserRole, Permission};
use crate::errors::ServiceError;
use crate::domains::user::User;

pub const PERMISSION_DENIED_MESSAGE: &str = "You do not have permission to perform this action.";

/// Represents the acting user of the current operation
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The ID of the acting user
    pub user_id: Uuid,

    /// The role of the acting user
    pub role: UserRole,

    /// Address used to notify the actor about the outcome of their request
    pub email: String,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: UserRole, email: String) -> Self {
        Self {
            user_id,
            role,
            email,
        }
    }

    /// Build the context for an authenticated account
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            role: UserRole::from_flags(user.is_admin, user.is_moderator),
            email: user.email.clone(),
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    /// Authorize a specific permission, returning an error if not allowed
    pub fn authorize(&self, permission: Permission) -> Result<(), ServiceError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(format!(
                "User does not have permission: {}",
                permission.as_str()
            )))
        }
    }

    /// Verify user is an admin
    pub fn authorize_admin(&self) -> Result<(), ServiceError> {
        if matches!(self.role, UserRole::Admin) {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(PERMISSION_DENIED_MESSAGE.to_string()))
        }
    }

    /// Verify user is an admin or a moderator
    pub fn authorize_moderator(&self) -> Result<(), ServiceError> {
        if self.role.can_moderate() {
            Ok(())
        } else {
            Err(ServiceError::PermissionDenied(PERMISSION_DENIED_MESSAGE.to_string()))
        }
    }

    pub fn is_user(&self, user_id: &Uuid) -> bool {
        &self.user_id == user_id
    }
}
