use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledger_core::cache;
use ledger_core::config::Config;
use ledger_core::services::{TransferService, sweeper};
use ledger_core::{AppState, create_app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Database pool
    let pool = db::create_pool(&config).await?;

    // Run migrations
    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    // Cache invalidator (no-op when REDIS_URL is absent)
    let invalidator = cache::build_invalidator(config.redis_url.as_deref())?;
    if config.redis_url.is_some() {
        tracing::info!("Redis cache invalidation enabled");
    }

    let transfers = TransferService::new(pool.clone(), invalidator, config.transfer.clone());

    // Background recovery for transfers orphaned in pending
    tokio::spawn(sweeper::run_sweeper(
        transfers.clone(),
        Duration::from_secs(config.transfer.sweep_interval_secs),
        Duration::from_secs(config.transfer.stale_pending_timeout_secs),
    ));

    let app_state = AppState {
        db: pool,
        transfers,
    };
    let app = create_app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
