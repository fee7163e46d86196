use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A chat message as it travels over the socket and pub/sub channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Message {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub room: i32,
    #[serde(default)]
    pub user_id: i32,
    #[serde(default)]
    pub body: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: i32,
    pub owner_id: i32,
    pub name: String,
    pub public: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomQuery {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    /// Kept as text so a malformed flag can be reported as a bad request.
    #[serde(default)]
    pub public: Option<String>,
}

/// Paging for room history. `prev` is an exclusive upper bound on message ids.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MessagesQuery {
    #[serde(default)]
    pub prev: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

impl Default for MessagesQuery {
    fn default() -> Self {
        Self {
            prev: 0,
            offset: 0,
            limit: default_limit(),
        }
    }
}

impl MessagesQuery {
    pub fn limit(&self) -> i64 {
        if self.limit <= 0 {
            default_limit()
        } else {
            self.limit.min(100)
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset.max(0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageList {
    pub messages: Vec<Message>,
}
