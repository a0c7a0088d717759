//! Vote store backed by `SQLite`.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;

use crate::models::vote::{ChatUser, Vote, VoterInfo};
use crate::Result;

use super::db::Database;
use super::{parse_ts, ts};

/// Repository wrapper around `SQLite` for per-user poll selections.
#[derive(Clone)]
pub struct VoteRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct VoteRow {
    poll_id: String,
    user_id: String,
    username: Option<String>,
    name: Option<String>,
    option_ids: String,
    updated_at: String,
}

impl VoteRow {
    fn into_vote(self) -> Result<Vote> {
        Ok(Vote {
            poll_id: self.poll_id,
            user: ChatUser {
                user_id: self.user_id,
                username: self.username,
                name: self.name,
            },
            option_ids: serde_json::from_str(&self.option_ids)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
        })
    }

    fn contains(&self, option: usize) -> Result<bool> {
        let ids: BTreeSet<usize> = serde_json::from_str(&self.option_ids)?;
        Ok(ids.contains(&option))
    }
}

impl VoteRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record `user`'s latest selection, replacing any previous one and
    /// refreshing the name snapshot.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the upsert fails.
    pub async fn upsert_vote(
        &self,
        poll_id: &str,
        user: &ChatUser,
        selected_option_ids: &BTreeSet<usize>,
    ) -> Result<()> {
        let option_ids = serde_json::to_string(selected_option_ids)?;

        sqlx::query(
            "INSERT INTO poll_vote (poll_id, user_id, username, name, option_ids, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(poll_id, user_id) DO UPDATE SET
                username = excluded.username,
                name = excluded.name,
                option_ids = excluded.option_ids,
                updated_at = excluded.updated_at",
        )
        .bind(poll_id)
        .bind(&user.user_id)
        .bind(&user.username)
        .bind(&user.name)
        .bind(&option_ids)
        .bind(ts(Utc::now()))
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Refresh `user`'s name snapshot without touching their selection.
    ///
    /// Users that never voted get a row with an empty selection.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the upsert fails.
    pub async fn record_user(&self, poll_id: &str, user: &ChatUser) -> Result<()> {
        sqlx::query(
            "INSERT INTO poll_vote (poll_id, user_id, username, name, option_ids, updated_at)
             VALUES (?1, ?2, ?3, ?4, '[]', ?5)
             ON CONFLICT(poll_id, user_id) DO UPDATE SET
                username = COALESCE(excluded.username, poll_vote.username),
                name = COALESCE(excluded.name, poll_vote.name)",
        )
        .bind(poll_id)
        .bind(&user.user_id)
        .bind(&user.username)
        .bind(&user.name)
        .bind(ts(Utc::now()))
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }

    /// Latest selection of one user, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_vote(&self, poll_id: &str, user_id: &str) -> Result<Option<Vote>> {
        let row: Option<VoteRow> =
            sqlx::query_as("SELECT * FROM poll_vote WHERE poll_id = ?1 AND user_id = ?2")
                .bind(poll_id)
                .bind(user_id)
                .fetch_optional(self.db.as_ref())
                .await?;

        row.map(VoteRow::into_vote).transpose()
    }

    /// Users whose selection contains `option_index`, in vote order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or a row is malformed.
    pub async fn get_voters_by_selected_option(
        &self,
        poll_id: &str,
        option_index: usize,
    ) -> Result<Vec<VoterInfo>> {
        let rows: Vec<VoteRow> = sqlx::query_as(
            "SELECT * FROM poll_vote WHERE poll_id = ?1 ORDER BY updated_at, user_id",
        )
        .bind(poll_id)
        .fetch_all(self.db.as_ref())
        .await?;

        let mut voters = Vec::new();
        for row in rows {
            if row.contains(option_index)? {
                voters.push(VoterInfo {
                    user_id: row.user_id,
                    username: row.username.unwrap_or_default(),
                    name: row.name.unwrap_or_default(),
                });
            }
        }
        Ok(voters)
    }

    /// Name snapshots for `user_ids`. Unknown users are absent from the map.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get_user_info(
        &self,
        poll_id: &str,
        user_ids: &[String],
    ) -> Result<HashMap<String, VoterInfo>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(String, Option<String>, Option<String>)> =
            sqlx::query_as("SELECT user_id, username, name FROM poll_vote WHERE poll_id = ?1")
                .bind(poll_id)
                .fetch_all(self.db.as_ref())
                .await?;

        Ok(rows
            .into_iter()
            .filter(|(user_id, _, _)| user_ids.contains(user_id))
            .map(|(user_id, username, name)| {
                let info = VoterInfo {
                    user_id: user_id.clone(),
                    username: username.unwrap_or_default(),
                    name: name.unwrap_or_default(),
                };
                (user_id, info)
            })
            .collect())
    }

    /// Write the results audit row. Existing rows are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert_results_audit(
        &self,
        poll_id: &str,
        queue_user_ids: &[String],
        results_text: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO poll_result (poll_id, queue_user_ids, results_text, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(poll_id) DO NOTHING",
        )
        .bind(poll_id)
        .bind(serde_json::to_string(queue_user_ids)?)
        .bind(results_text)
        .bind(ts(Utc::now()))
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Number of audit rows for `poll_id` (zero or one).
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn count_results_audit(&self, poll_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM poll_result WHERE poll_id = ?1")
            .bind(poll_id)
            .fetch_one(self.db.as_ref())
            .await?;
        Ok(count)
    }
}
