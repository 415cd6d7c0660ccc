//! HTTP handlers
//!
//! Thin request parsing over the trade facade. Amounts arrive as JSON
//! strings (floats silently lose precision and are rejected by the
//! deserializer); every error maps to its kind's status code and stable
//! numeric code.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;

use super::AppState;
use super::response::ApiResponse;
use crate::error::{AppError, ErrorKind};
use crate::money::Money;
use crate::service::{CancelCommand, ConfirmCommand, TransferCommand};

#[derive(Debug, Deserialize)]
pub struct TransferReq {
    pub from: i64,
    pub to: i64,
    pub nonce: i64,
    pub amount: String,
    #[serde(default = "default_auto_confirm")]
    pub auto_confirm: bool,
}

fn default_auto_confirm() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct TradeReq {
    pub from: i64,
    pub to: i64,
    pub nonce: i64,
}

/// POST /api/v1/trade/transfer
pub async fn transfer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TransferReq>,
) -> Response {
    let amount = match Money::from_str(&req.amount) {
        Ok(amount) => amount,
        Err(_) => {
            return error_response(&AppError::new(
                ErrorKind::InvalidRequest,
                "invalid amount format",
            ));
        }
    };

    let result = state
        .trade
        .transfer(TransferCommand {
            from: req.from,
            to: req.to,
            nonce: req.nonce,
            amount,
            auto_confirm: req.auto_confirm,
        })
        .await;

    match result {
        Ok(()) => ok_response(),
        Err(err) => error_response(&err),
    }
}

/// POST /api/v1/trade/confirm
pub async fn confirm(State(state): State<Arc<AppState>>, Json(req): Json<TradeReq>) -> Response {
    let result = state
        .trade
        .manual_confirm(ConfirmCommand {
            from: req.from,
            to: req.to,
            nonce: req.nonce,
        })
        .await;

    match result {
        Ok(()) => ok_response(),
        Err(err) => error_response(&err),
    }
}

/// POST /api/v1/trade/cancel
pub async fn cancel(State(state): State<Arc<AppState>>, Json(req): Json<TradeReq>) -> Response {
    let result = state
        .trade
        .cancel(CancelCommand {
            from: req.from,
            to: req.to,
            nonce: req.nonce,
        })
        .await;

    match result {
        Ok(()) => ok_response(),
        Err(err) => error_response(&err),
    }
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    match state.db.health_check().await {
        Ok(()) => ok_response(),
        Err(err) => {
            tracing::error!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::<()>::error(
                    ErrorKind::Internal.code(),
                    "database unavailable",
                )),
            )
                .into_response()
        }
    }
}

fn ok_response() -> Response {
    Json(ApiResponse::<()>::ok()).into_response()
}

fn error_response(err: &AppError) -> Response {
    let kind = err.kind();
    let status =
        StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        tracing::error!(code = kind.code(), error = %err, "request failed");
    } else {
        tracing::warn!(code = kind.code(), error = %err, "request rejected");
    }

    (
        status,
        Json(ApiResponse::<()>::error(kind.code(), kind.message())),
    )
        .into_response()
}
