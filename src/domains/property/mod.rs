pub mod repository;
pub mod types;

pub use repository::{PropertyRepository, SqlitePropertyRepository};
pub use types::{NewProperty, Property, PropertyStatus};
