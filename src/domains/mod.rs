pub mod booking;
pub mod core;
pub mod discount;
pub mod landlord;
pub mod permission;
pub mod property;
pub mod review;
pub mod user;

pub use user::User;
