//! Structured results produced by intent resolvers.

use serde::{Deserialize, Serialize};

use crate::display::DisplayZone;
use crate::intent::duration::parse_duration;
use crate::models::poll::{PollSpec, Schedule};
use crate::{AppError, Result};

/// Poll request as extracted from free text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollIntent {
    /// Poll question.
    #[serde(default)]
    pub topic: String,
    /// Duration literal such as `30m` or `1h30m`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Absolute end time (RFC 3339, or naive in the display zone).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Custom answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<Vec<String>>,
    /// Which custom answer means "attending".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coming_answer_index: Option<usize>,
}

impl PollIntent {
    /// Convert into a [`PollSpec`]. `end_time` wins when both are given.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when neither schedule field is usable.
    pub fn into_spec(self, zone: &DisplayZone) -> Result<PollSpec> {
        let schedule = match (self.end_time.as_deref(), self.duration.as_deref()) {
            (Some(end), _) if !end.trim().is_empty() => Schedule::At(zone.parse_end_time(end)?),
            (_, Some(duration)) if !duration.trim().is_empty() => {
                Schedule::After(parse_duration(duration)?)
            }
            _ => {
                return Err(AppError::Validation(
                    "no duration or end time given; add e.g. `30m` or `until 13:48`".into(),
                ))
            }
        };

        let answers = self.answers.filter(|answers| !answers.is_empty());
        Ok(PollSpec {
            topic: self.topic,
            schedule,
            answers,
            coming_answer_index: self.coming_answer_index,
        })
    }
}

/// Queue operation requested by a reply to a results message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueAction {
    /// Append the user to the queue.
    Join,
    /// Remove the user from the queue.
    Leave,
}
