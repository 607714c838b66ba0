pub mod repository;
pub mod types;

pub use repository::{SqliteUserRepository, UserRepository};
pub use types::{
    depersonalized_email, depersonalized_username, LandlordType, NewUser, NewUserProfile, User, UserProfile,
};
