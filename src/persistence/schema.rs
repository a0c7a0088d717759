//! `SQLite` schema bootstrap logic.
//!
//! All definitions use `IF NOT EXISTS` and are re-run on every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table and index definitions.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS poll (
    poll_id              TEXT PRIMARY KEY NOT NULL,
    chat_id              TEXT NOT NULL,
    message_id           TEXT NOT NULL,
    topic                TEXT NOT NULL,
    creator_user_id      TEXT NOT NULL,
    creator_username     TEXT,
    creator_name         TEXT,
    started_at           TEXT NOT NULL,
    duration_seconds     INTEGER NOT NULL,
    ends_at              TEXT NOT NULL,
    answers              TEXT NOT NULL,
    coming_answer_index  INTEGER NOT NULL,
    status               TEXT NOT NULL CHECK(status IN ('active','processed')),
    results_message_id   TEXT,
    queue_user_ids       TEXT,
    finalize_lease_until TEXT,
    processed_at         TEXT
);

CREATE TABLE IF NOT EXISTS poll_vote (
    poll_id     TEXT NOT NULL,
    user_id     TEXT NOT NULL,
    username    TEXT,
    name        TEXT,
    option_ids  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (poll_id, user_id)
);

CREATE TABLE IF NOT EXISTS poll_result (
    poll_id         TEXT PRIMARY KEY NOT NULL,
    queue_user_ids  TEXT NOT NULL,
    results_text    TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS scheduled_task (
    id          TEXT PRIMARY KEY NOT NULL,
    kind        TEXT NOT NULL,
    dedupe_key  TEXT NOT NULL,
    payload     TEXT NOT NULL,
    run_at      TEXT NOT NULL,
    status      TEXT NOT NULL CHECK(status IN ('pending','running','done','failed')),
    attempts    INTEGER NOT NULL DEFAULT 0,
    locked_until TEXT,
    last_error  TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (kind, dedupe_key)
);

CREATE INDEX IF NOT EXISTS idx_poll_status_ends ON poll(status, ends_at);
CREATE INDEX IF NOT EXISTS idx_poll_results_msg ON poll(chat_id, results_message_id);
CREATE INDEX IF NOT EXISTS idx_vote_poll ON poll_vote(poll_id);
CREATE INDEX IF NOT EXISTS idx_task_due ON scheduled_task(status, run_at);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
