use crate::config::Config;
use bb8::Pool;
use bb8_redis::{redis, RedisConnectionManager};
use std::time::Duration;

pub type RedisPool = Pool<RedisConnectionManager>;

pub async fn create_redis_pool(config: &Config) -> anyhow::Result<Option<RedisPool>> {
    let Some(url) = &config.redis_url else {
        tracing::info!("Redis URL not set, using in-memory stores");
        return Ok(None);
    };

    let manager = RedisConnectionManager::new(url.clone())?;
    let pool = Pool::builder()
        .max_size(config.redis_pool_size)
        .connection_timeout(Duration::from_secs(config.redis_connect_timeout))
        .build(manager)
        .await?;

    tracing::info!(
        "Redis connection pool created (size: {})",
        config.redis_pool_size
    );
    Ok(Some(pool))
}

/// Pub/sub needs a dedicated connection, so it gets its own client.
pub fn create_redis_client(config: &Config) -> anyhow::Result<Option<redis::Client>> {
    config
        .redis_url
        .as_deref()
        .map(redis::Client::open)
        .transpose()
        .map_err(Into::into)
}

pub async fn ping(pool: &RedisPool) -> anyhow::Result<()> {
    let mut conn = pool.get().await?;
    let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
    Ok(())
}
