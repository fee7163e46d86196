//! Data models shared across storage and API handlers.

use serde::{Deserialize, Serialize};

/// Generic `{count}` body returned by counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Count {
    pub count: i64,
}

pub mod chat;
pub mod invite;
pub mod request_log;
pub mod user;
