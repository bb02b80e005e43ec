use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use live_stream_service::config::{Config, StorageBackend};
use live_stream_service::configure_service;
use live_stream_service::metrics::MetricsMiddleware;
use live_stream_service::middleware::JwtValidator;
use live_stream_service::repository::{LiveStore, MemoryStore, PgStore};
use live_stream_service::services::{
    HttpProductCatalog, InMemoryRateLimiter, LoggingEventPublisher, NoRecipients, ProductCatalog,
    RateLimiter, RedisRateLimiter, StaticProductCatalog,
};
use live_stream_service::state::{AppState, Collaborators, EngineSettings};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,live_stream_service=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn build_store(config: &Config) -> Result<Arc<dyn LiveStore>> {
    match (config.storage.backend, &config.storage.database) {
        (StorageBackend::Postgres, Some(db)) => {
            let pool = PgPoolOptions::new()
                .max_connections(db.max_connections)
                .connect(&db.url)
                .await
                .context("Failed to create PostgreSQL pool")?;
            info!("PostgreSQL connection pool created");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run live-stream-service migrations")?;
            info!("Database migrations applied");

            Ok(Arc::new(PgStore::new(pool)))
        }
        (StorageBackend::Postgres, None) => {
            anyhow::bail!("STORAGE_BACKEND=postgres requires DATABASE_URL")
        }
        (StorageBackend::Memory, _) => {
            warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn build_rate_limiter(config: &Config) -> Result<Arc<dyn RateLimiter>> {
    let Some(redis) = &config.redis else {
        info!("REDIS_URL not set; rate limits are per-process");
        return Ok(Arc::new(InMemoryRateLimiter::new()));
    };

    let client = redis::Client::open(redis.url.as_str()).context("Invalid REDIS_URL")?;
    let manager = redis::aio::ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;
    info!("Redis rate limiter initialized");

    Ok(Arc::new(RedisRateLimiter::new(
        manager,
        Duration::from_millis(redis.timeout_ms),
    )))
}

fn build_catalog(config: &Config) -> Result<Arc<dyn ProductCatalog>> {
    match &config.catalog.url {
        Some(url) => {
            let catalog =
                HttpProductCatalog::new(url, Duration::from_millis(config.catalog.timeout_ms))
                    .context("Failed to build product catalog client")?;
            info!(%url, "Product catalog client initialized");
            Ok(Arc::new(catalog))
        }
        None => {
            warn!("PRODUCT_CATALOG_URL not set; every product id is accepted");
            Ok(Arc::new(StaticProductCatalog::allow_all()))
        }
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    info!("Starting live-stream-service");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        env = %config.app.env,
        storage = ?config.storage.backend,
        "Configuration loaded and validated"
    );

    let store = build_store(&config).await?;
    let limiter = build_rate_limiter(&config).await?;
    let catalog = build_catalog(&config)?;

    let state = web::Data::new(AppState::new(
        Collaborators {
            store,
            limiter: limiter.clone(),
            catalog,
            events: Arc::new(LoggingEventPublisher),
            recipients: Arc::new(NoRecipients),
        },
        EngineSettings::from_config(&config),
    ));
    let jwt = web::Data::new(JwtValidator::new(&config.auth.jwt_secret));

    // sweep closed rate-limit windows so idle keys do not accumulate
    let purge_every = Duration::from_secs(config.limits.purge_interval_secs.max(1));
    actix_rt::spawn(async move {
        let mut ticker = tokio::time::interval(purge_every);
        loop {
            ticker.tick().await;
            let purged = limiter.purge_expired();
            if purged > 0 {
                debug!(purged, "Purged expired rate-limit windows");
            }
        }
    });

    let bind_addr = (config.app.host.clone(), config.app.http_port);
    info!("HTTP server listening on {}:{}", bind_addr.0, bind_addr.1);

    HttpServer::new(move || {
        App::new()
            .wrap(MetricsMiddleware)
            .wrap(TracingLogger::default())
            .configure(configure_service(state.clone(), jwt.clone()))
    })
    .bind(bind_addr)
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server error")?;

    info!("live-stream-service shut down");
    Ok(())
}
