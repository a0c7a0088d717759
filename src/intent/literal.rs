//! Resolver for the compact `Topic | 45m` syntax and keyword queue intents.

use tracing::debug;

use super::duration::parse_duration;
use super::{IntentFuture, IntentResolver};
use crate::models::intent::{PollIntent, QueueAction};
use crate::{AppError, Result};

const LEAVE_PHRASES: &[&str] = &[
    "leave",
    "remove me",
    "drop me",
    "выхожу",
    "выйти",
    "убери меня",
    "удали меня",
    "я не иду",
    "не иду",
    "скип",
];

const JOIN_PHRASES: &[&str] = &[
    "join",
    "add me",
    "count me in",
    "хочу в очередь",
    "добавь меня",
    "запиши меня",
    "я иду",
    "иду",
];

/// Offline resolver that needs no external service.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralResolver;

impl LiteralResolver {
    /// Parse `Topic | <duration or end time>` or `Topic <duration>`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when no topic or schedule is found.
    pub fn parse_poll(text: &str) -> Result<PollIntent> {
        let text = text.trim();
        let (topic, schedule) = if let Some((topic, rest)) = text.split_once('|') {
            (topic.trim(), rest.trim())
        } else if let Some((topic, last)) = text.rsplit_once(char::is_whitespace) {
            (topic.trim(), last.trim())
        } else {
            return Err(AppError::Validation(format!(
                "cannot find a topic and duration in `{text}`"
            )));
        };

        if topic.is_empty() {
            return Err(AppError::Validation("poll topic is empty".into()));
        }
        if schedule.is_empty() {
            return Err(AppError::Validation("poll duration is missing".into()));
        }

        let mut intent = PollIntent {
            topic: topic.to_owned(),
            ..PollIntent::default()
        };
        if parse_duration(schedule).is_ok() {
            intent.duration = Some(schedule.to_owned());
        } else if text.contains('|') {
            intent.end_time = Some(schedule.to_owned());
        } else {
            return Err(AppError::Validation(format!(
                "`{schedule}` is not a duration"
            )));
        }
        Ok(intent)
    }

    /// Classify `text` by keyword.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Intent` when no known phrase matches.
    pub fn parse_queue(text: &str) -> Result<QueueAction> {
        let text = text.trim().to_lowercase();
        if text == "-" || LEAVE_PHRASES.iter().any(|p| text.contains(p)) {
            return Ok(QueueAction::Leave);
        }
        if text == "+" || JOIN_PHRASES.iter().any(|p| text.contains(p)) {
            return Ok(QueueAction::Join);
        }
        debug!(text, "no queue keyword matched");
        Err(AppError::Intent(
            "cannot tell whether you want to join or leave; reply `join` or `leave`".into(),
        ))
    }
}

impl IntentResolver for LiteralResolver {
    fn resolve_poll_intent(&self, text: &str) -> IntentFuture<'_, PollIntent> {
        let result = Self::parse_poll(text);
        Box::pin(async move { result })
    }

    fn resolve_queue_intent(&self, text: &str) -> IntentFuture<'_, QueueAction> {
        let result = Self::parse_queue(text);
        Box::pin(async move { result })
    }
}
