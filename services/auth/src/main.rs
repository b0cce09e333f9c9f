use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use auth::{
    AppState,
    config::{CookieSettings, ServerSettings},
    events::RedisStreamPublisher,
    jwt::{TokenCodec, TokenConfig},
    password::Hasher,
    reaper::SessionReaper,
    repositories::PgCredentialStore,
    routes,
    session::RedisSessionStore,
};
use common::{cache, database, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();

    info!("Starting authentication service");

    let settings = ServerSettings::from_env()?;
    let token_config = TokenConfig::from_env()?;

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let credentials = PgCredentialStore::new(pool, Hasher::default());
    credentials.migrate().await?;

    // Initialize Redis connection
    let redis_config = cache::RedisConfig::from_env()?;
    let redis_pool = cache::RedisPool::new(&redis_config).await?;

    if redis_pool.health_check().await? {
        info!("Redis connection successful");
    } else {
        anyhow::bail!("Failed to connect to Redis");
    }

    let sessions = Arc::new(RedisSessionStore::new(redis_pool.clone()));
    let events = Arc::new(RedisStreamPublisher::new(
        redis_pool,
        settings.event_stream_maxlen,
    ));
    let tokens = TokenCodec::new(&token_config);
    let cookie = CookieSettings::new(settings.cookie_secure, tokens.ttl());

    let reaper = SessionReaper::new(sessions.clone(), settings.sweep_interval()).spawn();

    let app_state = AppState {
        credentials: Arc::new(credentials),
        sessions,
        tokens,
        events,
        cookie,
    };

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    info!("Authentication service listening on {}", settings.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reaper.stop().await;
    info!("Authentication service stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
