pub mod calculator;
pub mod expiry;
pub mod repository;
pub mod types;

pub use calculator::{Currency, DiscountCalculator, ListingPrice, PriceQuote};
pub use expiry::{DiscountExpiryChecker, ExpiryReport};
pub use repository::{DiscountRepository, SqliteDiscountRepository};
pub use types::{
    Discount, DiscountProperty, DiscountStatus, DiscountType, DiscountUser, DiscountUserStatus, DiscountValueType,
    NewDiscount,
};
