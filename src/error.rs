//! Application error type
//!
//! Every failure carries an [`ErrorKind`] (a stable machine-readable code
//! plus HTTP status suggestion) and a phase label such as
//! `"transfer phase - reserve balance"` for log correlation. Adapter
//! errors (sqlx, lock, serde) are attached as the source and surface
//! through the standard error chain.

use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/// Stable error classification.
///
/// Codes are grouped in bands: generic 1xxx, account/trade 2xxx,
/// distributed lock 3xxx. They are part of the API contract and must not
/// be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Internal,
    InvalidRequest,
    NotFound,
    Conflict,

    GetAccount,
    CreateAccount,
    InsufficientBalance,
    ReserveBalance,
    UnreserveBalance,
    CreateTrade,
    GetTrade,
    UpdateTrade,
    PayloadMarshal,
    CreateEvent,

    LockAcquire,
    LockRelease,
    LockRenew,
}

impl ErrorKind {
    /// Numeric code for API responses.
    pub fn code(&self) -> i32 {
        match self {
            ErrorKind::Internal => 1000,
            ErrorKind::InvalidRequest => 1001,
            ErrorKind::NotFound => 1002,
            ErrorKind::Conflict => 1004,

            ErrorKind::GetAccount => 2001,
            ErrorKind::CreateAccount => 2002,
            ErrorKind::InsufficientBalance => 2004,
            ErrorKind::ReserveBalance => 2005,
            ErrorKind::UnreserveBalance => 2006,
            ErrorKind::CreateTrade => 2007,
            ErrorKind::GetTrade => 2008,
            ErrorKind::UpdateTrade => 2009,
            ErrorKind::PayloadMarshal => 2010,
            ErrorKind::CreateEvent => 2011,

            ErrorKind::LockAcquire => 3002,
            ErrorKind::LockRelease => 3003,
            ErrorKind::LockRenew => 3004,
        }
    }

    /// Short, stable message for API responses.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::Internal => "internal error",
            ErrorKind::InvalidRequest => "invalid request",
            ErrorKind::NotFound => "not found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::GetAccount => "get account failed",
            ErrorKind::CreateAccount => "create account failed",
            ErrorKind::InsufficientBalance => "insufficient balance",
            ErrorKind::ReserveBalance => "reserve balance failed",
            ErrorKind::UnreserveBalance => "unreserve balance failed",
            ErrorKind::CreateTrade => "create transaction failed",
            ErrorKind::GetTrade => "get transaction failed",
            ErrorKind::UpdateTrade => "update transaction failed",
            ErrorKind::PayloadMarshal => "payload marshal failed",
            ErrorKind::CreateEvent => "create event failed",
            ErrorKind::LockAcquire => "distributed lock acquire failed",
            ErrorKind::LockRelease => "distributed lock release failed",
            ErrorKind::LockRenew => "distributed lock renew failed",
        }
    }

    /// HTTP status code suggestion.
    ///
    /// Client-fault kinds map to 4xx, persistence and lock failures to 5xx.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::InvalidRequest
            | ErrorKind::GetAccount
            | ErrorKind::GetTrade
            | ErrorKind::InsufficientBalance => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Internal
            | ErrorKind::CreateAccount
            | ErrorKind::ReserveBalance
            | ErrorKind::UnreserveBalance
            | ErrorKind::CreateTrade
            | ErrorKind::UpdateTrade
            | ErrorKind::PayloadMarshal
            | ErrorKind::CreateEvent
            | ErrorKind::LockAcquire
            | ErrorKind::LockRelease
            | ErrorKind::LockRenew => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Error returned by every saga, lock and facade operation.
#[derive(Debug, Error)]
#[error("{code:04}: {context}", code = .kind.code())]
pub struct AppError {
    kind: ErrorKind,
    context: String,
    #[source]
    source: Option<BoxedSource>,
}

impl AppError {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self {
            kind,
            context: context.into(),
            source: None,
        }
    }

    pub fn wrap(
        kind: ErrorKind,
        context: impl Into<String>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self {
            kind,
            context: context.into(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn context(&self) -> &str {
        &self.context
    }
}
