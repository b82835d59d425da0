pub mod admin;
pub mod auth;
pub mod rate_limit;
pub mod tenant;

pub use auth::*;
pub use tenant::*;
