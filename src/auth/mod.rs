pub mod context;
pub mod password;

pub use context::AuthContext;
pub use password::{hash_password, verify_password};
