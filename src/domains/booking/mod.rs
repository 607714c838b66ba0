pub mod repository;
pub mod types;

pub use repository::{BookingRepository, BookingScope, SqliteBookingRepository};
pub use types::{Booking, BookingSnapshot, BookingStatus, NewBooking};
