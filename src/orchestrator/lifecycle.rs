//! Poll creation: validation, native poll rendering, persistence, and
//! scheduling of the finalize task.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{error, info, info_span, Instrument};

use crate::display::DisplayZone;
use crate::models::poll::{
    Creator, Poll, PollSpec, PollStatus, Schedule, DEFAULT_ANSWERS, DEFAULT_COMING_ANSWER_INDEX,
};
use crate::models::task::{FinalizePollPayload, FINALIZE_POLL};
use crate::persistence::poll_repo::PollRepo;
use crate::persistence::task_repo::TaskRepo;
use crate::transport::{ChatTransport, NativePollRequest};
use crate::{AppError, Result};

/// A [`PollSpec`] that passed validation against a fixed `now`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSpec {
    /// Trimmed, non-empty topic.
    pub topic: String,
    /// `ends_at - started_at`.
    pub duration: Duration,
    /// Start instant used for validation.
    pub started_at: DateTime<Utc>,
    /// Closing instant, strictly after `started_at`.
    pub ends_at: DateTime<Utc>,
    /// Non-empty answer list.
    pub answers: Vec<String>,
    /// In-bounds index into `answers`.
    pub coming_answer_index: usize,
}

/// Check a spec and resolve its schedule relative to `now`.
///
/// # Errors
///
/// - `AppError::Validation` for an empty topic or a blank answer.
/// - `AppError::InvalidSchedule` when the schedule is not in the future.
/// - `AppError::InvalidAnswerMapping` when the coming index is missing for
///   custom answers or out of bounds.
pub fn validate_spec(spec: PollSpec, now: DateTime<Utc>) -> Result<ValidatedSpec> {
    let topic = spec.topic.trim().to_owned();
    if topic.is_empty() {
        return Err(AppError::Validation("poll topic is empty".into()));
    }

    let (duration, ends_at) = match spec.schedule {
        Schedule::After(duration) => {
            if duration.is_zero() {
                return Err(AppError::InvalidSchedule(
                    "poll duration must be longer than zero".into(),
                ));
            }
            let delta = chrono::Duration::from_std(duration)
                .map_err(|_| AppError::InvalidSchedule("poll duration is too long".into()))?;
            let ends_at = now
                .checked_add_signed(delta)
                .ok_or_else(|| AppError::InvalidSchedule("poll duration is too long".into()))?;
            (duration, ends_at)
        }
        Schedule::At(ends_at) => {
            let duration = (ends_at - now).to_std().ok().filter(|d| !d.is_zero()).ok_or_else(
                || AppError::InvalidSchedule("the end time is already in the past".into()),
            )?;
            (duration, ends_at)
        }
    };

    let (answers, coming_answer_index) = match spec.answers {
        Some(answers) if !answers.is_empty() => {
            if answers.iter().any(|answer| answer.trim().is_empty()) {
                return Err(AppError::Validation("poll answers must not be blank".into()));
            }
            let index = spec.coming_answer_index.ok_or_else(|| {
                AppError::InvalidAnswerMapping(
                    "say which answer means attending for custom answers".into(),
                )
            })?;
            (answers, index)
        }
        _ => (
            DEFAULT_ANSWERS.iter().map(|a| (*a).to_owned()).collect(),
            spec.coming_answer_index.unwrap_or(DEFAULT_COMING_ANSWER_INDEX),
        ),
    };

    if coming_answer_index >= answers.len() {
        return Err(AppError::InvalidAnswerMapping(format!(
            "answer #{} does not exist; there are {} answers",
            coming_answer_index + 1,
            answers.len()
        )));
    }

    Ok(ValidatedSpec {
        topic,
        duration,
        started_at: now,
        ends_at,
        answers,
        coming_answer_index,
    })
}

/// Creates polls and arms their finalization.
pub struct PollLifecycle {
    polls: PollRepo,
    tasks: TaskRepo,
    transport: Arc<dyn ChatTransport>,
    zone: DisplayZone,
}

impl PollLifecycle {
    /// Wire the engine to its stores and transport.
    #[must_use]
    pub fn new(
        polls: PollRepo,
        tasks: TaskRepo,
        transport: Arc<dyn ChatTransport>,
        zone: DisplayZone,
    ) -> Self {
        Self {
            polls,
            tasks,
            transport,
            zone,
        }
    }

    /// Validate `spec`, render the native poll in `chat_id`, persist it,
    /// and schedule its finalization at `ends_at`.
    ///
    /// A transport failure aborts before anything is stored. A failure to
    /// schedule is logged only; the reconciliation sweep re-arms the task.
    ///
    /// # Errors
    ///
    /// Returns validation errors from [`validate_spec`], `AppError::Slack`
    /// if the poll cannot be rendered, or `AppError::Db` if it cannot be
    /// stored.
    pub async fn create_poll(&self, chat_id: &str, mut spec: PollSpec, creator: Creator) -> Result<Poll> {
        let span = info_span!("create_poll", chat_id, creator = %creator.user_id);
        async move {
            // Instants are stored with millisecond precision.
            if let Schedule::At(ends_at) = &mut spec.schedule {
                *ends_at = ends_at.trunc_subsecs(3);
            }
            let spec = validate_spec(spec, Utc::now().trunc_subsecs(3))?;
            let question = format!(
                "{} (until {})",
                spec.topic,
                self.zone.format_instant(spec.ends_at)
            );

            let native = self
                .transport
                .create_native_poll(NativePollRequest {
                    chat_id: chat_id.to_owned(),
                    question,
                    options: spec.answers.clone(),
                    single_answer: true,
                    anonymous: false,
                })
                .await
                .inspect_err(|err| error!(%err, "failed to render native poll"))?;

            let poll = Poll {
                poll_id: native.poll_id,
                chat_id: chat_id.to_owned(),
                message_id: native.message_id,
                topic: spec.topic,
                creator,
                started_at: spec.started_at,
                duration: spec.duration,
                ends_at: spec.ends_at,
                answers: spec.answers,
                coming_answer_index: spec.coming_answer_index,
                status: PollStatus::Active,
                results_message_id: None,
                queue_user_ids: None,
            };

            if let Err(err) = self.polls.insert_poll(&poll).await {
                error!(
                    poll_id = %poll.poll_id,
                    %err,
                    "native poll rendered but could not be stored"
                );
                return Err(err);
            }

            if let Err(err) = self.schedule_finalize(&poll).await {
                error!(
                    poll_id = %poll.poll_id,
                    %err,
                    "failed to schedule finalization; reconciliation will re-arm it"
                );
            }

            info!(poll_id = %poll.poll_id, ends_at = %poll.ends_at, "poll created");
            Ok(poll)
        }
        .instrument(span)
        .await
    }

    async fn schedule_finalize(&self, poll: &Poll) -> Result<()> {
        let payload = finalize_payload(poll)?;
        self.tasks
            .schedule_at(FINALIZE_POLL, &poll.poll_id, &payload, poll.ends_at)
            .await
            .map_err(|err| AppError::Scheduling(err.to_string()))?;
        Ok(())
    }
}

/// Serialized [`FinalizePollPayload`] for `poll`.
///
/// # Errors
///
/// Returns `AppError::Scheduling` if serialization fails.
pub fn finalize_payload(poll: &Poll) -> Result<String> {
    serde_json::to_string(&FinalizePollPayload {
        v: FinalizePollPayload::VERSION,
        poll_id: poll.poll_id.clone(),
        chat_id: poll.chat_id.clone(),
        message_id: poll.message_id.clone(),
        topic: poll.topic.clone(),
    })
    .map_err(|err| AppError::Scheduling(format!("failed to encode payload: {err}")))
}
