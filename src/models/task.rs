//! Durable delayed task model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task kind consumed by the finalization worker.
pub const FINALIZE_POLL: &str = "finalize_poll";

/// Lifecycle status of a scheduled task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for `run_at`.
    Pending,
    /// Claimed by a runner until `locked_until`.
    Running,
    /// Handler succeeded.
    Done,
    /// Attempts exhausted.
    Failed,
}

impl TaskStatus {
    /// Column representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// A delayed unit of work stored in the task queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    /// Unique record identifier.
    pub id: String,
    /// Routing key for the handler.
    pub kind: String,
    /// Uniqueness key within `kind` (the poll id for finalize tasks).
    pub dedupe_key: String,
    /// Opaque JSON payload.
    pub payload: String,
    /// Earliest execution instant.
    pub run_at: DateTime<Utc>,
    /// Current status.
    pub status: TaskStatus,
    /// Number of claims so far.
    pub attempts: u32,
    /// Lease expiry while `Running`.
    pub locked_until: Option<DateTime<Utc>>,
    /// Last handler error, if any.
    pub last_error: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

impl ScheduledTask {
    /// Construct a pending task.
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        dedupe_key: impl Into<String>,
        payload: String,
        run_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: kind.into(),
            dedupe_key: dedupe_key.into(),
            payload,
            run_at,
            status: TaskStatus::Pending,
            attempts: 0,
            locked_until: None,
            last_error: None,
            created_at: Utc::now(),
        }
    }
}

/// Payload of a [`FINALIZE_POLL`] task. `v` versions the schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinalizePollPayload {
    /// Payload schema version.
    pub v: u32,
    /// Poll to finalize.
    pub poll_id: String,
    /// Chat holding the poll.
    pub chat_id: String,
    /// Poll message.
    pub message_id: String,
    /// Poll question.
    pub topic: String,
}

impl FinalizePollPayload {
    /// Current payload schema version.
    pub const VERSION: u32 = 1;
}
