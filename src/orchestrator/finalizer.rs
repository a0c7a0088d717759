//! Finalization worker: closes a poll and computes its queue.
//!
//! Runs under the per-poll lock plus a database lease, so concurrent or
//! repeated deliveries of the same finalize task produce one results
//! message and one queue.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, info_span, warn, Instrument};

use super::locks::PollLocks;
use super::render::{format_results_text, queue_buttons, shuffle};
use super::scheduler::{TaskFuture, TaskHandler};
use crate::models::poll::Poll;
use crate::models::task::{FinalizePollPayload, ScheduledTask};
use crate::persistence::poll_repo::PollRepo;
use crate::persistence::vote_repo::VoteRepo;
use crate::transport::{ChatTransport, OutgoingMessage};
use crate::{AppError, Result};

/// What a finalize call ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Results were posted and the poll is now processed.
    Finalized {
        /// Results message identifier.
        results_message_id: String,
        /// Queue order.
        queue_user_ids: Vec<String>,
    },
    /// The poll had already been processed; nothing happened.
    AlreadyProcessed,
    /// No such poll; nothing happened.
    Missing,
}

/// Consumer of `finalize_poll` tasks.
pub struct Finalizer {
    polls: PollRepo,
    votes: VoteRepo,
    transport: Arc<dyn ChatTransport>,
    locks: Arc<PollLocks>,
    lease: Duration,
    rng: Mutex<StdRng>,
}

impl Finalizer {
    /// Build a finalizer with an entropy-seeded shuffle.
    #[must_use]
    pub fn new(
        polls: PollRepo,
        votes: VoteRepo,
        transport: Arc<dyn ChatTransport>,
        locks: Arc<PollLocks>,
        lease: Duration,
    ) -> Self {
        Self {
            polls,
            votes,
            transport,
            locks,
            lease,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the shuffle source with a seeded one.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Close `poll_id` and publish its queue, at most once.
    ///
    /// # Errors
    ///
    /// - `AppError::Conflict` if another worker holds the lease.
    /// - `AppError::Slack` if the results message cannot be sent.
    /// - `AppError::Db` on store failures.
    ///
    /// Every error releases the lease so a redelivery can retry.
    pub async fn finalize(&self, poll_id: &str) -> Result<FinalizeOutcome> {
        let span = info_span!("finalize", poll_id);
        async move {
            let _guard = self.locks.acquire(poll_id).await;

            let Some(poll) = self.polls.get(poll_id).await? else {
                warn!("finalize requested for unknown poll");
                return Ok(FinalizeOutcome::Missing);
            };
            if poll.is_processed() {
                info!("poll already processed; skipping");
                return Ok(FinalizeOutcome::AlreadyProcessed);
            }

            if !self
                .polls
                .try_claim_finalization(poll_id, Utc::now(), self.lease)
                .await?
            {
                return Err(AppError::Conflict(format!(
                    "finalization of poll {poll_id} is already in progress"
                )));
            }

            match self.run_claimed(&poll).await {
                Ok(outcome) => Ok(outcome),
                Err(err) => {
                    if let Err(release_err) = self.polls.release_finalization(poll_id).await {
                        warn!(%release_err, "failed to release finalization lease");
                    }
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_claimed(&self, poll: &Poll) -> Result<FinalizeOutcome> {
        if let Err(err) = self
            .transport
            .stop_native_poll(&poll.chat_id, &poll.message_id)
            .await
        {
            warn!(%err, "stopping native poll failed; assuming already stopped");
        }

        // From here on the poll is closed for voting; any failure leaves it
        // without results and must be visible to operators.
        let coming = self
            .polls
            .get_coming_answer_index(&poll.poll_id)
            .await
            .inspect_err(|err| error!(%err, "poll stopped but coming answer unreadable"))?;

        let mut voters = self
            .votes
            .get_voters_by_selected_option(&poll.poll_id, coming)
            .await
            .inspect_err(|err| error!(%err, "poll stopped but voters unreadable"))?;

        {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            shuffle(&mut voters, &mut *rng);
        }

        let text = format_results_text(&poll.topic, &voters);
        let queue_user_ids: Vec<String> = voters.into_iter().map(|v| v.user_id).collect();

        let message = OutgoingMessage::text(&poll.chat_id, &text)
            .with_buttons(queue_buttons(&poll.poll_id));
        let results_message_id = self
            .transport
            .send_message(message)
            .await
            .inspect_err(|err| error!(%err, "poll stopped but results could not be sent"))?;

        let transitioned = self
            .polls
            .mark_processed(&poll.poll_id, &results_message_id, &queue_user_ids, &text)
            .await
            .inspect_err(|err| {
                error!(
                    %err,
                    results_message_id,
                    "results sent but poll could not be marked processed"
                );
            })?;
        if !transitioned {
            warn!("poll left active state while finalization held the lease");
            return Ok(FinalizeOutcome::AlreadyProcessed);
        }

        info!(queue_len = queue_user_ids.len(), "poll finalized");
        Ok(FinalizeOutcome::Finalized {
            results_message_id,
            queue_user_ids,
        })
    }
}

impl TaskHandler for Finalizer {
    fn handle<'a>(&'a self, task: &'a ScheduledTask) -> TaskFuture<'a> {
        Box::pin(async move {
            let payload: FinalizePollPayload = serde_json::from_str(&task.payload)
                .map_err(|err| AppError::Scheduling(format!("bad finalize payload: {err}")))?;
            if payload.v != FinalizePollPayload::VERSION {
                return Err(AppError::Scheduling(format!(
                    "unsupported finalize payload version {}",
                    payload.v
                )));
            }
            self.finalize(&payload.poll_id).await.map(|_| ())
        })
    }
}
