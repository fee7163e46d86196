//! Refresh-token storage keyed by user id. Storing a token replaces the
//! previous one for that user.

use async_trait::async_trait;
use bb8_redis::redis::AsyncCommands;
use tracing::Instrument;
use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::db::redis::RedisPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn set(&self, user_id: i32, token: &str) -> anyhow::Result<()>;
    async fn get(&self, user_id: i32) -> anyhow::Result<Option<String>>;
    async fn del(&self, user_id: i32) -> anyhow::Result<()>;
}

pub struct RedisTokenStore {
    pool: RedisPool,
    timeout: Duration,
}

impl RedisTokenStore {
    pub fn new(pool: RedisPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    fn key(user_id: i32) -> String {
        format!("rt:{}", user_id)
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn set(&self, user_id: i32, token: &str) -> anyhow::Result<()> {
        let span = tracing::debug_span!("redis_set_refresh_token", user_id);
        async {
            let mut conn = self.pool.get().await?;
            conn.set_ex::<_, _, ()>(Self::key(user_id), token, self.timeout.as_secs().max(1))
                .await?;
            Ok::<_, anyhow::Error>(())
        }
        .instrument(span)
        .await
    }

    async fn get(&self, user_id: i32) -> anyhow::Result<Option<String>> {
        let span = tracing::debug_span!("redis_get_refresh_token", user_id);
        async {
            let mut conn = self.pool.get().await?;
            let token: Option<String> = conn.get(Self::key(user_id)).await?;
            Ok::<_, anyhow::Error>(token)
        }
        .instrument(span)
        .await
    }

    async fn del(&self, user_id: i32) -> anyhow::Result<()> {
        let span = tracing::debug_span!("redis_del_refresh_token", user_id);
        async {
            let mut conn = self.pool.get().await?;
            conn.del::<_, ()>(Self::key(user_id)).await?;
            Ok::<_, anyhow::Error>(())
        }
        .instrument(span)
        .await
    }
}

/// Process-local store used when Redis is not configured. Expired entries
/// read as absent and are dropped on access.
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<i32, (String, Instant)>>,
    timeout: Duration,
}

impl MemoryTokenStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<i32, (String, Instant)>>> {
        self.tokens
            .lock()
            .map_err(|_| anyhow::anyhow!("token store lock poisoned"))
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn set(&self, user_id: i32, token: &str) -> anyhow::Result<()> {
        let mut tokens = self.lock()?;
        let now = Instant::now();
        tokens.retain(|_, (_, expires)| *expires > now);
        tokens.insert(user_id, (token.to_string(), now + self.timeout));
        Ok(())
    }

    async fn get(&self, user_id: i32) -> anyhow::Result<Option<String>> {
        let mut tokens = self.lock()?;
        match tokens.get(&user_id) {
            Some((token, expires)) if *expires > Instant::now() => Ok(Some(token.clone())),
            Some(_) => {
                tokens.remove(&user_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn del(&self, user_id: i32) -> anyhow::Result<()> {
        self.lock()?.remove(&user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_overwrites_previous_token() {
        let store = MemoryTokenStore::new(Duration::from_secs(60));
        store.set(1, "first").await.unwrap();
        store.set(1, "second").await.unwrap();
        assert_eq!(store.get(1).await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.get(2).await.unwrap(), None);

        store.del(1).await.unwrap();
        assert_eq!(store.get(1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_store_expires_tokens() {
        let store = MemoryTokenStore::new(Duration::from_millis(20));
        store.set(3, "short-lived").await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get(3).await.unwrap(), None);
    }
}
