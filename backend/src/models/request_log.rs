use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RequestLog {
    pub id: i64,
    pub method: String,
    pub status: i32,
    pub ip: String,
    pub uri: String,
    pub referer: String,
    pub user_agent: String,
    /// Milliseconds.
    pub latency: i64,
    pub error: String,
    pub requested_at: DateTime<Utc>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct NewRequestLog {
    pub method: String,
    pub status: i32,
    pub ip: String,
    pub uri: String,
    pub referer: String,
    pub user_agent: String,
    pub latency: i64,
    pub error: String,
    pub user_id: Option<Uuid>,
}

/// `offset` is the first log id to return, not a row count.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LogQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub rev: bool,
}

fn default_limit() -> i64 {
    20
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            offset: 0,
            rev: false,
        }
    }
}

impl LogQuery {
    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, 500)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogList {
    pub logs: Vec<RequestLog>,
}
