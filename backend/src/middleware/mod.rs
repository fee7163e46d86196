pub mod auth;
pub mod request_log;

pub use auth::*;
pub use request_log::*;
