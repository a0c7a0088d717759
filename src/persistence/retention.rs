//! Retention service for time-based data purge.
//!
//! Runs as a background task deleting children first (votes, result
//! audit rows, finalize tasks), then processed polls whose `ends_at` is
//! older than `retention_days`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::db::Database;
use super::ts;
use crate::models::task::FINALIZE_POLL;
use crate::Result;

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Spawn the retention purge background task.
///
/// The task runs hourly until `cancel` fires.
#[must_use]
pub fn spawn_retention_task(
    db: Arc<Database>,
    retention_days: u32,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("retention task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention_days));
                    if let Err(err) = purge(&db, cutoff).await {
                        error!(?err, "retention purge failed");
                    }
                }
            }
        }
    })
}

/// Delete processed polls that ended before `cutoff`, with their children.
///
/// Returns the number of polls removed.
///
/// # Errors
///
/// Returns `AppError::Db` if any delete fails.
pub async fn purge(db: &Database, cutoff: DateTime<Utc>) -> Result<u64> {
    let cutoff = ts(cutoff);
    let mut tx = db.begin().await?;

    let expired = "SELECT poll_id FROM poll WHERE status = 'processed' AND ends_at < ?1";

    sqlx::query(&format!("DELETE FROM poll_vote WHERE poll_id IN ({expired})"))
        .bind(&cutoff)
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!("DELETE FROM poll_result WHERE poll_id IN ({expired})"))
        .bind(&cutoff)
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!(
        "DELETE FROM scheduled_task WHERE kind = ?2 AND dedupe_key IN ({expired})"
    ))
    .bind(&cutoff)
    .bind(FINALIZE_POLL)
    .execute(&mut *tx)
    .await?;

    let removed = sqlx::query("DELETE FROM poll WHERE status = 'processed' AND ends_at < ?1")
        .bind(&cutoff)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;
    info!(removed, "retention purge completed");
    Ok(removed)
}
