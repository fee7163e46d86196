//! Invite sessions: short-lived blobs in a key-value store that gate who may
//! sign up. Each redemption spends one use; a session with zero uses left is
//! deleted the next time it is touched.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use bb8_redis::redis::{self, AsyncCommands};
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    db::redis::RedisPool,
    models::invite::{CreateInviteRequest, Session},
};

pub const DEFAULT_PREFIX: &str = "invite";
pub const DEFAULT_TTL: i32 = 5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
/// Latest expiry, in unix millis, that survives a round trip through the
/// Lua redeem script. Redis cjson prints numbers with 14 significant digits.
pub const MAX_EXPIRES_AT: i64 = 99_999_999_999_999;

#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    #[error("invite has no uses left")]
    TtlReached,
    #[error("invite belongs to another user")]
    Ownership,
    #[error("invite not found")]
    NotFound,
    #[error("invalid invite timeout")]
    InvalidTimeout,
    #[error("invalid invite session: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InviteStore: Send + Sync {
    async fn create(
        &self,
        creator: Uuid,
        req: &CreateInviteRequest,
    ) -> Result<Session, InviteError>;
    /// Reads the session and spends one use.
    async fn get(&self, id: &str) -> Result<Session, InviteError>;
    /// Reads the session without spending a use.
    async fn view(&self, id: &str) -> Result<Session, InviteError>;
    async fn owner_del(&self, id: &str, uid: Uuid) -> Result<(), InviteError>;
    async fn del(&self, id: &str) -> Result<(), InviteError>;
    async fn list(&self) -> Result<Vec<Session>, InviteError>;
}

/// Result of an atomic read-and-spend against the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Redeemed {
    Missing,
    /// Stored use counter was already zero. Carries the stored blob.
    Spent(String),
    /// Use spent (or unlimited). Carries the blob as now stored.
    Active(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn set(&self, key: &str, value: &str, expires_in: Duration) -> anyhow::Result<()>;
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    /// Decrements a positive use counter in place, keeping the entry's expiry.
    async fn redeem(&self, key: &str) -> anyhow::Result<Redeemed>;
    async fn del(&self, key: &str) -> anyhow::Result<()>;
    /// Every `(key, value)` stored under `prefix:`.
    async fn scan(&self, prefix: &str) -> anyhow::Result<Vec<(String, String)>>;
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;
type KeyGen = Box<dyn Fn() -> String + Send + Sync>;

pub struct SessionStore<B> {
    backend: B,
    prefix: String,
    default_ttl: i32,
    default_timeout: Duration,
    clock: Clock,
    key_gen: KeyGen,
}

pub fn generate_invite_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl<B: SessionBackend> SessionStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            prefix: DEFAULT_PREFIX.to_string(),
            default_ttl: DEFAULT_TTL,
            default_timeout: DEFAULT_TIMEOUT,
            clock: Box::new(Utc::now),
            key_gen: Box::new(generate_invite_key),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_defaults(mut self, ttl: i32, timeout: Duration) -> Self {
        self.default_ttl = ttl;
        self.default_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_key_gen(mut self, key_gen: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.key_gen = Box::new(key_gen);
        self
    }

    fn key(&self, id: &str) -> String {
        format!("{}:{}", self.prefix, id)
    }

    fn decode(raw: &str, id: &str) -> Result<Session, InviteError> {
        let mut session: Session = serde_json::from_str(raw)?;
        session.id = id.to_string();
        Ok(session)
    }

    /// Cleanup of a spent invite. Failure leaves the entry to expire on its own.
    async fn discard(&self, id: &str) {
        if let Err(err) = self.backend.del(&self.key(id)).await {
            tracing::warn!(invite = id, error = %err, "failed to delete spent invite");
        }
    }
}

#[async_trait]
impl<B: SessionBackend> InviteStore for SessionStore<B> {
    async fn create(
        &self,
        creator: Uuid,
        req: &CreateInviteRequest,
    ) -> Result<Session, InviteError> {
        if req.timeout < 0 {
            return Err(InviteError::InvalidTimeout);
        }
        let timeout = if req.timeout == 0 {
            self.default_timeout
        } else {
            Duration::from_secs(req.timeout as u64)
        };
        let ttl = if req.ttl == 0 { self.default_ttl } else { req.ttl };
        let timeout_ms =
            i64::try_from(timeout.as_millis()).map_err(|_| InviteError::InvalidTimeout)?;
        let expires_at = (self.clock)()
            .timestamp_millis()
            .checked_add(timeout_ms)
            .filter(|at| *at <= MAX_EXPIRES_AT)
            .ok_or(InviteError::InvalidTimeout)?;

        let session = Session {
            created_by: creator,
            ttl,
            expires_at,
            email: req.email.clone(),
            roles: req.roles.clone(),
            id: (self.key_gen)(),
        };
        let raw = serde_json::to_string(&session)?;
        self.backend
            .set(&self.key(&session.id), &raw, timeout)
            .await?;
        tracing::debug!(invite = %session.id, created_by = %creator, ttl, "invite created");
        Ok(session)
    }

    async fn get(&self, id: &str) -> Result<Session, InviteError> {
        match self.backend.redeem(&self.key(id)).await? {
            Redeemed::Missing => Err(InviteError::NotFound),
            Redeemed::Spent(_) => {
                self.discard(id).await;
                Err(InviteError::TtlReached)
            }
            Redeemed::Active(raw) => Self::decode(&raw, id),
        }
    }

    async fn view(&self, id: &str) -> Result<Session, InviteError> {
        let raw = self
            .backend
            .get(&self.key(id))
            .await?
            .ok_or(InviteError::NotFound)?;
        let session = Self::decode(&raw, id)?;
        if session.ttl == 0 {
            self.discard(id).await;
            return Err(InviteError::TtlReached);
        }
        Ok(session)
    }

    async fn owner_del(&self, id: &str, uid: Uuid) -> Result<(), InviteError> {
        let raw = self
            .backend
            .get(&self.key(id))
            .await?
            .ok_or(InviteError::NotFound)?;
        let session = Self::decode(&raw, id)?;
        if session.created_by != uid {
            return Err(InviteError::Ownership);
        }
        self.backend.del(&self.key(id)).await?;
        Ok(())
    }

    async fn del(&self, id: &str) -> Result<(), InviteError> {
        self.backend.del(&self.key(id)).await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Session>, InviteError> {
        self.backend
            .scan(&self.prefix)
            .await?
            .iter()
            .map(|(key, raw)| {
                let id = key.rsplit(':').next().unwrap_or(key);
                Self::decode(raw, id)
            })
            .collect()
    }
}

// Spends one use atomically. Returns {0, ''} when missing, {1, raw} when the
// counter is already zero, {2, raw} otherwise.
const REDEEM_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then
  return {0, ''}
end
local session = cjson.decode(raw)
local ttl = tonumber(session['tl']) or 0
if ttl == 0 then
  return {1, raw}
end
if ttl > 0 then
  session['tl'] = ttl - 1
  raw = cjson.encode(session)
  redis.call('SET', KEYS[1], raw, 'KEEPTTL')
end
return {2, raw}
"#;

pub struct RedisBackend {
    pool: RedisPool,
    redeem: redis::Script,
}

impl RedisBackend {
    pub fn new(pool: RedisPool) -> Self {
        Self {
            pool,
            redeem: redis::Script::new(REDEEM_SCRIPT),
        }
    }
}

#[async_trait]
impl SessionBackend for RedisBackend {
    async fn set(&self, key: &str, value: &str, expires_in: Duration) -> anyhow::Result<()> {
        let mut conn = self.pool.get().await?;
        conn.set_ex::<_, _, ()>(key, value, expires_in.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.pool.get().await?;
        let raw: Option<String> = conn.get(key).await?;
        Ok(raw)
    }

    async fn redeem(&self, key: &str) -> anyhow::Result<Redeemed> {
        let span = tracing::debug_span!("redis_redeem_invite", key);
        async {
            let mut conn = self.pool.get().await?;
            let (status, raw): (i64, String) =
                self.redeem.key(key).invoke_async(&mut *conn).await?;
            Ok::<_, anyhow::Error>(match status {
                0 => Redeemed::Missing,
                1 => Redeemed::Spent(raw),
                _ => Redeemed::Active(raw),
            })
        }
        .instrument(span)
        .await
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.pool.get().await?;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> anyhow::Result<Vec<(String, String)>> {
        let span = tracing::debug_span!("redis_scan_invites", prefix);
        async {
            let mut conn = self.pool.get().await?;
            let keys: Vec<String> = conn.keys(format!("{}:*", prefix)).await?;
            if keys.is_empty() {
                return Ok(Vec::new());
            }
            let values: Vec<Option<String>> = redis::cmd("MGET")
                .arg(&keys)
                .query_async(&mut *conn)
                .await?;
            Ok::<_, anyhow::Error>(
                keys.into_iter()
                    .zip(values)
                    .filter_map(|(key, value)| value.map(|v| (key, v)))
                    .collect(),
            )
        }
        .instrument(span)
        .await
    }
}

/// Process-local backend. Redemption happens under the map lock.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<String, (String, Instant)>>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("invite store lock poisoned"))?;
        let now = Instant::now();
        entries.retain(|_, (_, expires)| *expires > now);
        Ok(entries)
    }
}

#[async_trait]
impl SessionBackend for MemoryBackend {
    async fn set(&self, key: &str, value: &str, expires_in: Duration) -> anyhow::Result<()> {
        self.lock()?
            .insert(key.to_string(), (value.to_string(), Instant::now() + expires_in));
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.lock()?.get(key).map(|(raw, _)| raw.clone()))
    }

    async fn redeem(&self, key: &str) -> anyhow::Result<Redeemed> {
        let mut entries = self.lock()?;
        let Some((raw, _)) = entries.get_mut(key) else {
            return Ok(Redeemed::Missing);
        };
        let mut session: Session = serde_json::from_str(raw)?;
        if session.ttl == 0 {
            return Ok(Redeemed::Spent(raw.clone()));
        }
        if session.ttl > 0 {
            session.ttl -= 1;
            *raw = serde_json::to_string(&session)?;
        }
        Ok(Redeemed::Active(raw.clone()))
    }

    async fn del(&self, key: &str) -> anyhow::Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> anyhow::Result<Vec<(String, String)>> {
        let needle = format!("{}:", prefix);
        let mut found: Vec<(String, String)> = self
            .lock()?
            .iter()
            .filter(|(key, _)| key.starts_with(&needle))
            .map(|(key, (raw, _))| (key.clone(), raw.clone()))
            .collect();
        found.sort();
        Ok(found)
    }
}
