use std::{sync::Arc, time::Duration};

use crate::{
    config::Config,
    db::{connection::DbPool, redis::RedisPool},
    repositories::{
        chat::{ChatRepository, PgChatRepository},
        request_log::{PgRequestLogRepository, RequestLogRepository},
        user::{PgUserRepository, UserRepository},
    },
    services::{
        chat::{Broker, LocalBroker, RedisBroker},
        hits::{HitsCache, RedisHitsCache},
        invite::{InviteStore, MemoryBackend, RedisBackend, SessionStore},
        mailer::InviteMailer,
        token_store::{MemoryTokenStore, RedisTokenStore, TokenStore},
    },
    utils::jwt::TokenConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DbPool,
    pub redis: Option<RedisPool>,
    pub tokens: Arc<TokenConfig>,
    pub token_store: Arc<dyn TokenStore>,
    pub invites: Arc<dyn InviteStore>,
    pub users: Arc<dyn UserRepository>,
    pub chat: Arc<dyn ChatRepository>,
    pub broker: Arc<dyn Broker>,
    pub hits: Option<Arc<dyn HitsCache>>,
    pub request_logs: Arc<dyn RequestLogRepository>,
    pub mailer: Option<Arc<dyn InviteMailer>>,
}

impl AppState {
    /// Wires the Postgres-backed repositories and picks Redis or in-memory
    /// stores depending on whether a pool is available.
    pub fn new(
        config: Config,
        db: DbPool,
        redis: Option<RedisPool>,
        redis_client: Option<bb8_redis::redis::Client>,
        tokens: TokenConfig,
    ) -> Self {
        let refresh_ttl = tokens
            .refresh_ttl
            .to_std()
            .unwrap_or(Duration::from_secs(5 * 24 * 60 * 60));
        let invite_timeout = Duration::from_secs(config.invite_default_timeout_minutes * 60);

        let (token_store, invites, hits): (
            Arc<dyn TokenStore>,
            Arc<dyn InviteStore>,
            Option<Arc<dyn HitsCache>>,
        ) = match &redis {
            Some(pool) => (
                Arc::new(RedisTokenStore::new(pool.clone(), refresh_ttl)),
                Arc::new(
                    SessionStore::new(RedisBackend::new(pool.clone()))
                        .with_defaults(config.invite_default_ttl, invite_timeout),
                ),
                Some(Arc::new(RedisHitsCache::new(pool.clone()))),
            ),
            None => (
                Arc::new(MemoryTokenStore::new(refresh_ttl)),
                Arc::new(
                    SessionStore::new(MemoryBackend::new())
                        .with_defaults(config.invite_default_ttl, invite_timeout),
                ),
                None,
            ),
        };

        let broker: Arc<dyn Broker> = match (&redis, redis_client) {
            (Some(pool), Some(client)) => Arc::new(RedisBroker::new(pool.clone(), client)),
            _ => Arc::new(LocalBroker::default()),
        };

        Self {
            config: Arc::new(config),
            users: Arc::new(PgUserRepository::new(db.clone())),
            chat: Arc::new(PgChatRepository::new(db.clone())),
            request_logs: Arc::new(PgRequestLogRepository::new(db.clone())),
            db,
            redis,
            tokens: Arc::new(tokens),
            token_store,
            invites,
            broker,
            hits,
            mailer: None,
        }
    }

    pub fn with_users(mut self, users: Arc<dyn UserRepository>) -> Self {
        self.users = users;
        self
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatRepository>) -> Self {
        self.chat = chat;
        self
    }

    pub fn with_request_logs(mut self, request_logs: Arc<dyn RequestLogRepository>) -> Self {
        self.request_logs = request_logs;
        self
    }

    pub fn with_invites(mut self, invites: Arc<dyn InviteStore>) -> Self {
        self.invites = invites;
        self
    }

    pub fn with_hits(mut self, hits: Option<Arc<dyn HitsCache>>) -> Self {
        self.hits = hits;
        self
    }

    pub fn with_mailer(mut self, mailer: Option<Arc<dyn InviteMailer>>) -> Self {
        self.mailer = mailer;
        self
    }
}
