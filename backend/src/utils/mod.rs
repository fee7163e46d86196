pub mod cookies;
pub mod jwt;
pub mod keys;
pub mod password;
