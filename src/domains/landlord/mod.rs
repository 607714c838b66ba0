pub mod repository;
pub mod types;

pub use repository::{
    CompanyMembershipRepository, LandlordProfileRepository, SqliteCompanyMembershipRepository,
    SqliteLandlordProfileRepository,
};
pub use types::{
    CompanyMembership, LandlordProfile, LandlordProfileType, MembershipRole, NewCompanyMembership,
    NewLandlordProfile,
};
