use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use homelab_backend::{
    config::Config,
    db::{
        connection::create_pool,
        redis::{create_redis_client, create_redis_pool},
    },
    routes::router,
    services::mailer::{InviteMailer, SmtpInviteMailer},
    state::AppState,
    utils::jwt::TokenConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load first so a RUST_LOG or DEBUG from .env reaches the subscriber.
    let config = Config::load()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        listen_addr = %config.listen_addr,
        redis = config.redis_url.is_some(),
        smtp = config.smtp.is_some(),
        jwt_issuer = %config.jwt_issuer,
        "Loaded configuration from environment/.env"
    );

    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis = create_redis_pool(&config).await?;
    let redis_client = create_redis_client(&config)?;
    if redis.is_none() {
        tracing::warn!("REDIS_URL not set, using in-memory stores");
    }

    let tokens = TokenConfig::from_config(&config)?;
    let mailer: Option<Arc<dyn InviteMailer>> = match config.smtp.as_ref() {
        Some(smtp) => Some(Arc::new(SmtpInviteMailer::new(smtp)?)),
        None => None,
    };

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config, pool, redis, redis_client, tokens).with_mailer(mailer);
    let app = router(state);

    tracing::info!("Server listening on {}", listen_addr);
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
