use crate::domains::core::deletion_log::DeletedModel;
use crate::domains::landlord::LandlordProfile;
use crate::domains::property::Property;
use crate::domains::user::User;
use uuid::Uuid;

/// Kind of entity a deletion request starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    User,
    LandlordProfile,
    Property,
}

/// The entity a deletion request is about, with the related rows its messages need
#[derive(Debug, Clone)]
pub enum DeletionTarget {
    User(User),
    LandlordProfile {
        profile: LandlordProfile,
        /// The user who created the profile, if still linked
        owner: Option<User>,
    },
    Property {
        property: Property,
        owner: LandlordProfile,
    },
}

impl DeletionTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            DeletionTarget::User(_) => TargetKind::User,
            DeletionTarget::LandlordProfile { .. } => TargetKind::LandlordProfile,
            DeletionTarget::Property { .. } => TargetKind::Property,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            DeletionTarget::User(user) => user.id,
            DeletionTarget::LandlordProfile { profile, .. } => profile.id,
            DeletionTarget::Property { property, .. } => property.id,
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            DeletionTarget::User(user) => user.is_deleted,
            DeletionTarget::LandlordProfile { profile, .. } => profile.is_deleted,
            DeletionTarget::Property { property, .. } => property.is_deleted,
        }
    }

    pub fn model(&self) -> DeletedModel {
        match self.kind() {
            TargetKind::User => DeletedModel::User,
            TargetKind::LandlordProfile => DeletedModel::LandlordProfile,
            TargetKind::Property => DeletedModel::Property,
        }
    }

    pub fn already_deleted_message(&self) -> &'static str {
        match self.kind() {
            TargetKind::User => "Account data is already deleted.",
            TargetKind::LandlordProfile => "Landlord profile is already deleted.",
            TargetKind::Property => "Property is already deleted.",
        }
    }

    /// Address of the party told about an administrative deletion
    pub fn contact_email(&self) -> &str {
        match self {
            DeletionTarget::User(user) => &user.email,
            DeletionTarget::LandlordProfile { profile, .. } => &profile.email,
            DeletionTarget::Property { owner, .. } => &owner.email,
        }
    }

    /// Whether failure messages should mention properties as well as the subject itself
    pub fn is_landlord_context(&self) -> bool {
        match self {
            DeletionTarget::User(user) => user.owns_landlord_profiles(),
            DeletionTarget::LandlordProfile { .. } | DeletionTarget::Property { .. } => true,
        }
    }
}
