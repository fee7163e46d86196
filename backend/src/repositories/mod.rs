pub mod chat;
pub mod request_log;
pub mod user;
