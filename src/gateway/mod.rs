//! HTTP gateway
//!
//! Axum binding for the trade facade: three trade endpoints plus a
//! liveness probe. Everything below this module is transport-agnostic.

pub mod handlers;
pub mod response;

use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;

use crate::repository::Database;
use crate::service::TradeUsecase;

pub use response::ApiResponse;

/// Shared application state.
pub struct AppState {
    pub trade: TradeUsecase,
    pub db: Database,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/trade/transfer", post(handlers::transfer))
        .route("/api/v1/trade/confirm", post(handlers::confirm))
        .route("/api/v1/trade/cancel", post(handlers::cancel))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}
