use async_trait::async_trait;
use bb8_redis::redis::AsyncCommands;

use crate::db::redis::RedisPool;

pub const HITS_CACHE_TTL_SECS: u64 = 60 * 60;

pub fn hits_key(uri: &str) -> String {
    let uri = if uri.is_empty() { "/" } else { uri };
    format!("hits:{}", uri)
}

/// Counter cache in front of the request log.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HitsCache: Send + Sync {
    /// Increments and returns the cached count. A key that did not exist
    /// yet is reported as an error so the caller reloads the real count.
    async fn next(&self, key: &str) -> anyhow::Result<i64>;
    async fn put(&self, key: &str, count: i64) -> anyhow::Result<()>;
}

pub struct RedisHitsCache {
    pool: RedisPool,
}

impl RedisHitsCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HitsCache for RedisHitsCache {
    async fn next(&self, key: &str) -> anyhow::Result<i64> {
        let mut conn = self.pool.get().await?;
        let count: i64 = conn.incr(key, 1).await?;
        if count <= 1 {
            anyhow::bail!("hits cache miss for {}", key);
        }
        Ok(count)
    }

    async fn put(&self, key: &str, count: i64) -> anyhow::Result<()> {
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(key, count, HITS_CACHE_TTL_SECS).await?;
        Ok(())
    }
}
