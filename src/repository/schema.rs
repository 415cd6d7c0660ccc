//! Schema bootstrap
//!
//! Idempotent `CREATE TABLE IF NOT EXISTS` statements executed at startup.
//! The CHECK constraints are the database-side backstop for the balance
//! non-negativity invariant.

use anyhow::Result;
use sqlx::PgPool;

const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    user_id           BIGINT PRIMARY KEY,
    available_balance NUMERIC(30, 10) NOT NULL DEFAULT 0 CHECK (available_balance >= 0),
    reserved_balance  NUMERIC(30, 10) NOT NULL DEFAULT 0 CHECK (reserved_balance >= 0),
    updated_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_TRADE_RECORDS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS trade_records (
    from_account_id BIGINT NOT NULL,
    nonce           BIGINT NOT NULL,
    transaction_id  UUID NOT NULL,
    to_account_id   BIGINT NOT NULL,
    amount          NUMERIC(30, 10) NOT NULL,
    status          SMALLINT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (from_account_id, nonce)
)
"#;

const CREATE_TRANSACTION_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transaction_events (
    id             BIGSERIAL PRIMARY KEY,
    transaction_id UUID NOT NULL,
    event_type     TEXT NOT NULL,
    payload        TEXT NOT NULL,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const CREATE_TRANSFER_LOCKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transfer_locks (
    lock_key   TEXT PRIMARY KEY,
    token      UUID NOT NULL,
    expires_at TIMESTAMPTZ NOT NULL
)
"#;

/// Create all tables the service needs.
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    tracing::info!("Initializing PostgreSQL schema...");

    for (name, ddl) in [
        ("accounts", CREATE_ACCOUNTS_TABLE),
        ("trade_records", CREATE_TRADE_RECORDS_TABLE),
        ("transaction_events", CREATE_TRANSACTION_EVENTS_TABLE),
        ("transfer_locks", CREATE_TRANSFER_LOCKS_TABLE),
    ] {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create {} table: {}", name, e))?;
    }

    tracing::info!("PostgreSQL schema initialized");
    Ok(())
}
