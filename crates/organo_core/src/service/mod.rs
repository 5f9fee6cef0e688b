//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own transaction boundaries: one `IMMEDIATE` transaction per mutation,
//!   one deferred transaction per report.
//! - Emit one structured outcome event per operation.
//!
//! # Invariants
//! - State is re-read and validated inside the transaction that writes it.
//! - Outcome events carry ids and error codes only, never names or contact
//!   data.

pub mod allocation_service;
pub mod hierarchy_service;
pub mod overload_service;
pub mod project_service;
pub mod version_service;

use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

/// Classification every service error exposes to the outcome logger.
pub(crate) trait ServiceFailure {
    /// Stable snake_case code for logs.
    fn error_code(&self) -> &'static str;
    /// `true` for storage failures, `false` for rejected input.
    fn is_storage(&self) -> bool;
}

/// Opens a write transaction that takes the database lock up front.
pub(crate) fn begin_write(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

/// Opens a read transaction for a consistent multi-query view.
pub(crate) fn begin_read(conn: &Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Deferred)
}

pub(crate) fn log_outcome<T, E: ServiceFailure>(
    event: &'static str,
    module: &'static str,
    target_id: Option<i64>,
    started_at: Instant,
    result: &Result<T, E>,
) {
    let duration_ms = started_at.elapsed().as_millis();
    let target = target_id.map_or_else(|| "none".to_string(), |id| id.to_string());
    match result {
        Ok(_) => info!(
            "event={event} module={module} status=ok id={target} duration_ms={duration_ms}"
        ),
        Err(err) if err.is_storage() => error!(
            "event={event} module={module} status=error id={target} duration_ms={duration_ms} error_code={}",
            err.error_code()
        ),
        Err(err) => warn!(
            "event={event} module={module} status=rejected id={target} duration_ms={duration_ms} error_code={}",
            err.error_code()
        ),
    }
}
