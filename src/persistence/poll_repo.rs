//! Poll store backed by `SQLite`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::poll::{Creator, Poll, PollStatus, QueueContext};
use crate::{AppError, Result};

use super::db::Database;
use super::{parse_ts, ts};

/// Repository wrapper around `SQLite` for poll records.
#[derive(Clone)]
pub struct PollRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct PollRow {
    poll_id: String,
    chat_id: String,
    message_id: String,
    topic: String,
    creator_user_id: String,
    creator_username: Option<String>,
    creator_name: Option<String>,
    started_at: String,
    duration_seconds: i64,
    ends_at: String,
    answers: String,
    coming_answer_index: i64,
    status: String,
    results_message_id: Option<String>,
    queue_user_ids: Option<String>,
}

impl PollRow {
    /// Convert a database row into the domain model.
    fn into_poll(self) -> Result<Poll> {
        let status = parse_status(&self.status)?;
        let duration_seconds = u64::try_from(self.duration_seconds)
            .map_err(|_| AppError::Db(format!("negative duration: {}", self.duration_seconds)))?;
        let coming_answer_index = usize::try_from(self.coming_answer_index).map_err(|_| {
            AppError::Db(format!(
                "invalid coming_answer_index: {}",
                self.coming_answer_index
            ))
        })?;
        let queue_user_ids = self
            .queue_user_ids
            .as_deref()
            .map(serde_json::from_str::<Vec<String>>)
            .transpose()?;

        Ok(Poll {
            poll_id: self.poll_id,
            chat_id: self.chat_id,
            message_id: self.message_id,
            topic: self.topic,
            creator: Creator {
                user_id: self.creator_user_id,
                username: self.creator_username,
                name: self.creator_name,
            },
            started_at: parse_ts("started_at", &self.started_at)?,
            duration: Duration::from_secs(duration_seconds),
            ends_at: parse_ts("ends_at", &self.ends_at)?,
            answers: serde_json::from_str(&self.answers)?,
            coming_answer_index,
            status,
            results_message_id: self.results_message_id,
            queue_user_ids,
        })
    }
}

fn parse_status(s: &str) -> Result<PollStatus> {
    match s {
        "active" => Ok(PollStatus::Active),
        "processed" => Ok(PollStatus::Processed),
        other => Err(AppError::Db(format!("invalid poll status: {other}"))),
    }
}

pub(crate) fn to_db_index(index: usize) -> Result<i64> {
    i64::try_from(index).map_err(|_| AppError::Db(format!("index out of range: {index}")))
}

fn lease_deadline(now: DateTime<Utc>, lease: Duration) -> Result<DateTime<Utc>> {
    let lease = chrono::Duration::from_std(lease)
        .map_err(|e| AppError::Db(format!("invalid lease: {e}")))?;
    Ok(now + lease)
}

impl PollRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a poll. A second insert with the same `poll_id` is a no-op.
    ///
    /// Returns `true` when a row was written.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert_poll(&self, poll: &Poll) -> Result<bool> {
        let duration_seconds = i64::try_from(poll.duration.as_secs())
            .map_err(|_| AppError::Db("duration out of range".into()))?;
        let answers = serde_json::to_string(&poll.answers)?;
        let queue = poll
            .queue_user_ids
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            "INSERT INTO poll (poll_id, chat_id, message_id, topic, creator_user_id,
             creator_username, creator_name, started_at, duration_seconds, ends_at,
             answers, coming_answer_index, status, results_message_id, queue_user_ids)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
             ON CONFLICT(poll_id) DO NOTHING",
        )
        .bind(&poll.poll_id)
        .bind(&poll.chat_id)
        .bind(&poll.message_id)
        .bind(&poll.topic)
        .bind(&poll.creator.user_id)
        .bind(&poll.creator.username)
        .bind(&poll.creator.name)
        .bind(ts(poll.started_at))
        .bind(duration_seconds)
        .bind(ts(poll.ends_at))
        .bind(&answers)
        .bind(to_db_index(poll.coming_answer_index)?)
        .bind(poll.status.as_str())
        .bind(&poll.results_message_id)
        .bind(&queue)
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Retrieve a poll by identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, poll_id: &str) -> Result<Option<Poll>> {
        let row: Option<PollRow> = sqlx::query_as("SELECT * FROM poll WHERE poll_id = ?1")
            .bind(poll_id)
            .fetch_optional(self.db.as_ref())
            .await?;

        row.map(PollRow::into_poll).transpose()
    }

    /// Active polls whose `ends_at` is at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_expired_active_polls(&self, now: DateTime<Utc>) -> Result<Vec<Poll>> {
        let rows: Vec<PollRow> = sqlx::query_as(
            "SELECT * FROM poll WHERE status = 'active' AND ends_at <= ?1 ORDER BY ends_at",
        )
        .bind(ts(now))
        .fetch_all(self.db.as_ref())
        .await?;

        rows.into_iter().map(PollRow::into_poll).collect()
    }

    /// Active polls overdue by more than `grace`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_due_active(&self, now: DateTime<Utc>, grace: Duration) -> Result<Vec<Poll>> {
        let grace = chrono::Duration::from_std(grace)
            .map_err(|e| AppError::Db(format!("invalid grace: {e}")))?;
        self.find_expired_active_polls(now - grace).await
    }

    /// Transition `active → processed`, storing the results message and the
    /// queue, and write the results audit row in the same transaction.
    ///
    /// Returns `false` when the poll was not active (already processed or
    /// missing); nothing is written in that case.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the transaction fails.
    pub async fn mark_processed(
        &self,
        poll_id: &str,
        results_message_id: &str,
        queue_user_ids: &[String],
        results_text: &str,
    ) -> Result<bool> {
        let queue = serde_json::to_string(queue_user_ids)?;
        let now = ts(Utc::now());

        let mut tx = self.db.begin().await?;
        let updated = sqlx::query(
            "UPDATE poll SET status = 'processed', results_message_id = ?1,
             queue_user_ids = ?2, finalize_lease_until = NULL, processed_at = ?3
             WHERE poll_id = ?4 AND status = 'active'",
        )
        .bind(results_message_id)
        .bind(&queue)
        .bind(&now)
        .bind(poll_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO poll_result (poll_id, queue_user_ids, results_text, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(poll_id) DO NOTHING",
        )
        .bind(poll_id)
        .bind(&queue)
        .bind(results_text)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Find the poll whose results message is `message_id` in `chat_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn find_by_results_message_id(
        &self,
        chat_id: &str,
        message_id: &str,
    ) -> Result<Option<Poll>> {
        let row: Option<PollRow> = sqlx::query_as(
            "SELECT * FROM poll WHERE chat_id = ?1 AND results_message_id = ?2 LIMIT 1",
        )
        .bind(chat_id)
        .bind(message_id)
        .fetch_optional(self.db.as_ref())
        .await?;

        row.map(PollRow::into_poll).transpose()
    }

    /// Index of the "attending" answer.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown poll, `AppError::Db` on
    /// query failure.
    pub async fn get_coming_answer_index(&self, poll_id: &str) -> Result<usize> {
        let index: Option<i64> =
            sqlx::query_scalar("SELECT coming_answer_index FROM poll WHERE poll_id = ?1")
                .bind(poll_id)
                .fetch_optional(self.db.as_ref())
                .await?;

        let index = index.ok_or_else(|| AppError::NotFound(format!("poll {poll_id}")))?;
        usize::try_from(index)
            .map_err(|_| AppError::Db(format!("invalid coming_answer_index: {index}")))
    }

    /// Chat, results message, and topic needed to re-render a queue.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown poll, `AppError::Db` on
    /// query failure.
    pub async fn get_queue_context(&self, poll_id: &str) -> Result<QueueContext> {
        let row: Option<(String, Option<String>, String)> = sqlx::query_as(
            "SELECT chat_id, results_message_id, topic FROM poll WHERE poll_id = ?1",
        )
        .bind(poll_id)
        .fetch_optional(self.db.as_ref())
        .await?;

        let (chat_id, results_message_id, topic) =
            row.ok_or_else(|| AppError::NotFound(format!("poll {poll_id}")))?;
        Ok(QueueContext {
            chat_id,
            results_message_id,
            topic,
        })
    }

    /// Current queue order; `None` before finalization.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown poll, `AppError::Db` on
    /// query failure.
    pub async fn get_queue_user_ids(&self, poll_id: &str) -> Result<Option<Vec<String>>> {
        let raw: Option<Option<String>> =
            sqlx::query_scalar("SELECT queue_user_ids FROM poll WHERE poll_id = ?1")
                .bind(poll_id)
                .fetch_optional(self.db.as_ref())
                .await?;

        let raw = raw.ok_or_else(|| AppError::NotFound(format!("poll {poll_id}")))?;
        Ok(raw.as_deref().map(serde_json::from_str).transpose()?)
    }

    /// Overwrite the queue order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown poll, `AppError::Db` on
    /// update failure.
    pub async fn set_queue_user_ids(&self, poll_id: &str, user_ids: &[String]) -> Result<()> {
        let queue = serde_json::to_string(user_ids)?;
        let result = sqlx::query("UPDATE poll SET queue_user_ids = ?1 WHERE poll_id = ?2")
            .bind(&queue)
            .bind(poll_id)
            .execute(self.db.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("poll {poll_id}")));
        }
        Ok(())
    }

    /// Read-modify-write the queue inside one transaction.
    ///
    /// `mutate` sees the current order and may reject the change; on
    /// rejection nothing is written. Returns the new order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown poll,
    /// `AppError::QueueNotReady` before finalization, whatever `mutate`
    /// returns, or `AppError::Db` on failure.
    pub async fn mutate_queue<F>(&self, poll_id: &str, mutate: F) -> Result<Vec<String>>
    where
        F: FnOnce(&mut Vec<String>) -> Result<()>,
    {
        let mut tx = self.db.begin().await?;

        let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT results_message_id, queue_user_ids FROM poll WHERE poll_id = ?1",
        )
        .bind(poll_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (results_message_id, raw_queue) =
            row.ok_or_else(|| AppError::NotFound(format!("poll {poll_id}")))?;
        if results_message_id.is_none() {
            return Err(AppError::QueueNotReady(format!("poll {poll_id} is still open")));
        }

        let mut queue: Vec<String> = raw_queue
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?
            .unwrap_or_default();
        mutate(&mut queue)?;

        sqlx::query("UPDATE poll SET queue_user_ids = ?1 WHERE poll_id = ?2")
            .bind(serde_json::to_string(&queue)?)
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(queue)
    }

    /// Claim the finalization lease until `now + lease`.
    ///
    /// Succeeds only for an active poll whose lease is absent or expired.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn try_claim_finalization(
        &self,
        poll_id: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<bool> {
        let until = lease_deadline(now, lease)?;
        let result = sqlx::query(
            "UPDATE poll SET finalize_lease_until = ?1
             WHERE poll_id = ?2 AND status = 'active'
               AND (finalize_lease_until IS NULL OR finalize_lease_until <= ?3)",
        )
        .bind(ts(until))
        .bind(poll_id)
        .bind(ts(now))
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Drop the finalization lease after a failed attempt.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn release_finalization(&self, poll_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE poll SET finalize_lease_until = NULL WHERE poll_id = ?1 AND status = 'active'",
        )
        .bind(poll_id)
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }
}
