use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::request_log::{LogQuery, NewRequestLog, RequestLog};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RequestLogRepository: Send + Sync {
    async fn write(&self, log: NewRequestLog) -> Result<(), sqlx::Error>;
    async fn list(&self, query: LogQuery) -> Result<Vec<RequestLog>, sqlx::Error>;
    async fn count_by_uri(&self, uri: &str) -> Result<i64, sqlx::Error>;
}

pub struct PgRequestLogRepository {
    pool: PgPool,
}

impl PgRequestLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestLogRepository for PgRequestLogRepository {
    async fn write(&self, log: NewRequestLog) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO request_log \
             (method, status, ip, uri, referer, user_agent, latency, error, user_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&log.method)
        .bind(log.status)
        .bind(&log.ip)
        .bind(&log.uri)
        .bind(&log.referer)
        .bind(&log.user_agent)
        .bind(log.latency)
        .bind(&log.error)
        .bind(log.user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, query: LogQuery) -> Result<Vec<RequestLog>, sqlx::Error> {
        let order = if query.rev { "DESC" } else { "ASC" };
        sqlx::query_as::<_, RequestLog>(&format!(
            "SELECT id, method, status, ip, uri, referer, user_agent, latency, error, \
             requested_at, user_id \
             FROM request_log \
             WHERE id >= $1 \
             ORDER BY requested_at {} \
             LIMIT $2",
            order
        ))
        .bind(query.offset)
        .bind(query.limit())
        .fetch_all(&self.pool)
        .await
    }

    async fn count_by_uri(&self, uri: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT count(*) FROM request_log WHERE uri = $1")
            .bind(uri)
            .fetch_one(&self.pool)
            .await
    }
}
