//! Persistence layer modules.

pub mod db;
pub mod poll_repo;
pub mod retention;
pub mod schema;
pub mod task_repo;
pub mod vote_repo;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{AppError, Result};

/// Fixed-width UTC timestamp so lexical order matches temporal order.
pub(crate) fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a timestamp column written by [`ts`].
pub(crate) fn parse_ts(column: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {column}: {e}")))
}

/// Parse a nullable timestamp column.
pub(crate) fn parse_opt_ts(column: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(column, s)).transpose()
}
