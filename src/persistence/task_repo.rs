//! Durable delayed task queue backed by `SQLite`.
//!
//! Delivery is at-least-once: a claimed task whose lease expires without
//! being marked done becomes claimable again.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::task::{ScheduledTask, TaskStatus};
use crate::{AppError, Result};

use super::db::Database;
use super::{parse_opt_ts, parse_ts, ts};

/// Repository wrapper around `SQLite` for scheduled tasks.
#[derive(Clone)]
pub struct TaskRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    kind: String,
    dedupe_key: String,
    payload: String,
    run_at: String,
    status: String,
    attempts: i64,
    locked_until: Option<String>,
    last_error: Option<String>,
    created_at: String,
}

impl TaskRow {
    fn into_task(self) -> Result<ScheduledTask> {
        Ok(ScheduledTask {
            status: parse_task_status(&self.status)?,
            attempts: u32::try_from(self.attempts)
                .map_err(|_| AppError::Db(format!("invalid attempts: {}", self.attempts)))?,
            run_at: parse_ts("run_at", &self.run_at)?,
            locked_until: parse_opt_ts("locked_until", self.locked_until.as_deref())?,
            created_at: parse_ts("created_at", &self.created_at)?,
            id: self.id,
            kind: self.kind,
            dedupe_key: self.dedupe_key,
            payload: self.payload,
            last_error: self.last_error,
        })
    }
}

fn parse_task_status(s: &str) -> Result<TaskStatus> {
    match s {
        "pending" => Ok(TaskStatus::Pending),
        "running" => Ok(TaskStatus::Running),
        "done" => Ok(TaskStatus::Done),
        "failed" => Ok(TaskStatus::Failed),
        other => Err(AppError::Db(format!("invalid task status: {other}"))),
    }
}

impl TaskRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Schedule `kind` work for `when`. At most one task exists per
    /// `(kind, dedupe_key)`; repeated calls leave the first one in place.
    ///
    /// Returns `true` when a new task was stored.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn schedule_at(
        &self,
        kind: &str,
        dedupe_key: &str,
        payload: &str,
        when: DateTime<Utc>,
    ) -> Result<bool> {
        let task = ScheduledTask::new(kind, dedupe_key, payload.to_owned(), when);
        let now = ts(task.created_at);

        let result = sqlx::query(
            "INSERT INTO scheduled_task (id, kind, dedupe_key, payload, run_at, status,
             attempts, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0, ?6, ?6)
             ON CONFLICT(kind, dedupe_key) DO NOTHING",
        )
        .bind(&task.id)
        .bind(&task.kind)
        .bind(&task.dedupe_key)
        .bind(&task.payload)
        .bind(ts(when))
        .bind(&now)
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Insert the task if missing, or reset a `done`/`failed` one to
    /// `pending` at `when` with `payload` and a fresh attempt budget. Pending and running
    /// tasks are left alone.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the upsert fails.
    pub async fn rearm(
        &self,
        kind: &str,
        dedupe_key: &str,
        payload: &str,
        when: DateTime<Utc>,
    ) -> Result<bool> {
        let task = ScheduledTask::new(kind, dedupe_key, payload.to_owned(), when);
        let now = ts(task.created_at);

        let result = sqlx::query(
            "INSERT INTO scheduled_task (id, kind, dedupe_key, payload, run_at, status,
             attempts, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0, ?6, ?6)
             ON CONFLICT(kind, dedupe_key) DO UPDATE SET
                status = 'pending',
                payload = excluded.payload,
                run_at = excluded.run_at,
                attempts = 0,
                locked_until = NULL,
                updated_at = excluded.updated_at
             WHERE scheduled_task.status IN ('done', 'failed')",
        )
        .bind(&task.id)
        .bind(&task.kind)
        .bind(&task.dedupe_key)
        .bind(&task.payload)
        .bind(ts(when))
        .bind(&now)
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Claim up to `limit` due tasks, leasing each until `now + lease`.
    ///
    /// Due means `pending` with `run_at <= now`, or `running` with an
    /// expired lease. Each claim is a conditional update, so two runners
    /// never hold the same task at once.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if a query fails.
    pub async fn claim_due(
        &self,
        now: DateTime<Utc>,
        lease: Duration,
        limit: u32,
    ) -> Result<Vec<ScheduledTask>> {
        let now_s = ts(now);
        let lease = chrono::Duration::from_std(lease)
            .map_err(|e| AppError::Db(format!("invalid lease: {e}")))?;
        let locked_until = now + lease;

        let candidates: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM scheduled_task
             WHERE (status = 'pending' AND run_at <= ?1)
                OR (status = 'running' AND locked_until <= ?1)
             ORDER BY run_at
             LIMIT ?2",
        )
        .bind(&now_s)
        .bind(i64::from(limit))
        .fetch_all(self.db.as_ref())
        .await?;

        let mut claimed = Vec::with_capacity(candidates.len());
        for row in candidates {
            let result = sqlx::query(
                "UPDATE scheduled_task
                 SET status = 'running', attempts = attempts + 1,
                     locked_until = ?1, updated_at = ?2
                 WHERE id = ?3
                   AND ((status = 'pending' AND run_at <= ?2)
                     OR (status = 'running' AND locked_until <= ?2))",
            )
            .bind(ts(locked_until))
            .bind(&now_s)
            .bind(&row.id)
            .execute(self.db.as_ref())
            .await?;

            if result.rows_affected() == 1 {
                let mut task = row.into_task()?;
                task.status = TaskStatus::Running;
                task.attempts += 1;
                task.locked_until = Some(locked_until);
                claimed.push(task);
            }
        }
        Ok(claimed)
    }

    /// Mark a claimed task as completed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn mark_done(&self, id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE scheduled_task SET status = 'done', locked_until = NULL, updated_at = ?1
             WHERE id = ?2",
        )
        .bind(ts(Utc::now()))
        .bind(id)
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Put a failed task back to `pending` at `run_at`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn reschedule(&self, id: &str, run_at: DateTime<Utc>, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE scheduled_task
             SET status = 'pending', run_at = ?1, locked_until = NULL,
                 last_error = ?2, updated_at = ?3
             WHERE id = ?4",
        )
        .bind(ts(run_at))
        .bind(error)
        .bind(ts(Utc::now()))
        .bind(id)
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Park a task as `failed`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE scheduled_task
             SET status = 'failed', locked_until = NULL, last_error = ?1, updated_at = ?2
             WHERE id = ?3",
        )
        .bind(error)
        .bind(ts(Utc::now()))
        .bind(id)
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Look a task up by its uniqueness key.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_by_key(&self, kind: &str, dedupe_key: &str) -> Result<Option<ScheduledTask>> {
        let row: Option<TaskRow> =
            sqlx::query_as("SELECT * FROM scheduled_task WHERE kind = ?1 AND dedupe_key = ?2")
                .bind(kind)
                .bind(dedupe_key)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(TaskRow::into_task).transpose()
    }
}
