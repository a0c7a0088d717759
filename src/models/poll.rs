//! Poll model, creation spec, and lifecycle status.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Answers used when a request does not specify its own.
pub const DEFAULT_ANSWERS: [&str; 2] = ["Иду", "Не иду"];

/// Index into [`DEFAULT_ANSWERS`] meaning "attending".
pub const DEFAULT_COMING_ANSWER_INDEX: usize = 0;

/// Lifecycle status for a poll. `Processed` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    /// Accepting votes until `ends_at`.
    Active,
    /// Closed; the queue has been computed.
    Processed,
}

impl PollStatus {
    /// Column representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Processed => "processed",
        }
    }
}

/// Identity of the user who created a poll.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Creator {
    /// Transport user identifier.
    pub user_id: String,
    /// Handle, when the transport exposes one.
    pub username: Option<String>,
    /// Display name, when known.
    pub name: Option<String>,
}

/// When a poll should close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Close after this long.
    After(Duration),
    /// Close at this absolute instant.
    At(DateTime<Utc>),
}

/// Validated-later request to create a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSpec {
    /// Poll question.
    pub topic: String,
    /// Closing time.
    pub schedule: Schedule,
    /// Custom answers; `None` selects [`DEFAULT_ANSWERS`].
    pub answers: Option<Vec<String>>,
    /// Which answer means "attending". Required with custom answers.
    pub coming_answer_index: Option<usize>,
}

impl PollSpec {
    /// Spec with default answers closing after `duration`.
    #[must_use]
    pub fn with_duration(topic: impl Into<String>, duration: Duration) -> Self {
        Self {
            topic: topic.into(),
            schedule: Schedule::After(duration),
            answers: None,
            coming_answer_index: None,
        }
    }
}

/// A poll persisted in the poll store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Poll {
    /// Transport-assigned identifier; immutable.
    pub poll_id: String,
    /// Chat (channel) the poll lives in.
    pub chat_id: String,
    /// Message that renders the poll.
    pub message_id: String,
    /// Poll question.
    pub topic: String,
    /// Who asked for the poll.
    pub creator: Creator,
    /// Creation instant.
    pub started_at: DateTime<Utc>,
    /// Requested lifetime.
    pub duration: Duration,
    /// `started_at + duration`.
    pub ends_at: DateTime<Utc>,
    /// Ordered answer options.
    pub answers: Vec<String>,
    /// Index of the "attending" answer.
    pub coming_answer_index: usize,
    /// Lifecycle status.
    pub status: PollStatus,
    /// Results message; set at finalization.
    pub results_message_id: Option<String>,
    /// Queue order; set at finalization, mutated by join/leave.
    pub queue_user_ids: Option<Vec<String>>,
}

impl Poll {
    /// Whether the poll has been finalized.
    #[must_use]
    pub fn is_processed(&self) -> bool {
        self.status == PollStatus::Processed
    }
}

/// What the queue renderer needs to rebuild a results message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueContext {
    /// Chat holding the results message.
    pub chat_id: String,
    /// Results message; `None` until finalization.
    pub results_message_id: Option<String>,
    /// Poll question used as the header.
    pub topic: String,
}
