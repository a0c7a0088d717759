//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Usage hint appended to validation and intent failures.
pub const USAGE_EXAMPLE: &str = "Examples:\n\
    • `/poll Math | 45m`\n\
    • `/poll Standup | 1h30m`\n\
    • `/poll` with no text starts the step-by-step wizard";

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Slack API or Socket Mode failure.
    Slack(String),
    /// The intent resolver declined or failed to understand a request.
    Intent(String),
    /// Poll specification rejected (empty topic, unparsable duration, ...).
    Validation(String),
    /// Requested end time or duration does not resolve to a future instant.
    InvalidSchedule(String),
    /// `coming_answer_index` does not point into the answer list.
    InvalidAnswerMapping(String),
    /// User asked to join a queue they are already in.
    AlreadyInQueue(String),
    /// User asked to leave a queue they are not in.
    NotInQueue(String),
    /// Poll has not been finalized yet, so it has no queue.
    QueueNotReady(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Another worker currently holds the finalization lease for a poll.
    Conflict(String),
    /// Delayed task could not be scheduled.
    Scheduling(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Slack(msg) => write!(f, "slack: {msg}"),
            Self::Intent(msg) => write!(f, "intent: {msg}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::InvalidSchedule(msg) => write!(f, "invalid schedule: {msg}"),
            Self::InvalidAnswerMapping(msg) => write!(f, "invalid answer mapping: {msg}"),
            Self::AlreadyInQueue(msg) => write!(f, "already in queue: {msg}"),
            Self::NotInQueue(msg) => write!(f, "not in queue: {msg}"),
            Self::QueueNotReady(msg) => write!(f, "queue not ready: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::Scheduling(msg) => write!(f, "scheduling: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Whether the error describes something the chat user can act on.
    ///
    /// Internal failures (store, transport, scheduling) are never shown
    /// verbatim to end users.
    #[must_use]
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::Intent(_)
                | Self::Validation(_)
                | Self::InvalidSchedule(_)
                | Self::InvalidAnswerMapping(_)
                | Self::AlreadyInQueue(_)
                | Self::NotInQueue(_)
                | Self::QueueNotReady(_)
        )
    }

    /// Text suitable for replying to the user who triggered the failure.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Intent(reason)
            | Self::Validation(reason)
            | Self::InvalidSchedule(reason)
            | Self::InvalidAnswerMapping(reason) => {
                format!("\u{274c} {reason}\n\n{USAGE_EXAMPLE}")
            }
            Self::AlreadyInQueue(_) => "You are already in the queue.".to_owned(),
            Self::NotInQueue(_) => "You are not in the queue.".to_owned(),
            Self::QueueNotReady(_) => {
                "The poll is still open; the queue appears once it closes.".to_owned()
            }
            _ => "\u{26a0}\u{fe0f} Something went wrong on our side. Please try again later."
                .to_owned(),
        }
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Db(format!("invalid json column: {err}"))
    }
}
