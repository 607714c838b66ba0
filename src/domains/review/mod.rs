pub mod repository;
pub mod types;

pub use repository::{ReviewRepository, SqliteReviewRepository};
pub use types::{NewReview, Review, ReviewStatus};
