use std::sync::Arc;

use anyhow::Context;

use points_engine::config::AppConfig;
use points_engine::gateway::{self, AppState};
use points_engine::lock::PgLeaseLocker;
use points_engine::logging;
use points_engine::repository::{Database, PgUnitOfWork, schema};
use points_engine::service::TradeUsecase;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = std::env::var("APP_ENV").unwrap_or_else(|_| "default".to_string());
    let config = AppConfig::load(&env);
    let _guard = logging::init_logging(&config);

    tracing::info!(git = env!("GIT_HASH"), env = %env, "points-engine starting");

    let database_url = config
        .database_url()
        .context("no database configured: set DATABASE_URL or postgres_url")?;
    let db = Database::connect(&database_url).await?;
    schema::init_schema(db.pool()).await?;

    let uow = Arc::new(PgUnitOfWork::new(db.pool().clone()));
    let locker = Arc::new(PgLeaseLocker::new(db.pool().clone()));
    let trade = TradeUsecase::new(uow, locker, &config.lock);

    let state = Arc::new(AppState { trade, db });
    gateway::serve(state, &config.server.host, config.server.port).await
}
