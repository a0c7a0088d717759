//! Durable task runner and the overdue-poll reconciliation sweep.
//!
//! The runner claims due rows from `scheduled_task`, dispatches each to
//! the handler registered for its kind, and records the outcome. Failed
//! tasks are retried with exponential backoff until the attempt budget is
//! spent. A task whose runner dies mid-flight is redelivered once its
//! lease expires.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::lifecycle::finalize_payload;
use crate::config::SchedulerConfig;
use crate::models::task::{ScheduledTask, FINALIZE_POLL};
use crate::persistence::poll_repo::PollRepo;
use crate::persistence::task_repo::TaskRepo;
use crate::Result;

/// Longest delay between two attempts of the same task.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(3600);

const CLAIM_BATCH: u32 = 16;

/// Boxed future returned by task handlers.
pub type TaskFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Consumer of one task kind.
pub trait TaskHandler: Send + Sync {
    /// Execute `task`. Must tolerate repeated delivery of the same task.
    ///
    /// # Errors
    ///
    /// Any error schedules a retry.
    fn handle<'a>(&'a self, task: &'a ScheduledTask) -> TaskFuture<'a>;
}

/// `base * 2^(attempt - 1)`, capped at [`MAX_RETRY_DELAY`].
#[must_use]
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.checked_mul(1_u32 << exponent)
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

/// Claims and executes due tasks.
pub struct TaskRunner {
    tasks: TaskRepo,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    poll_interval: Duration,
    lease: Duration,
    max_attempts: u32,
    retry_base: Duration,
}

impl TaskRunner {
    /// Runner with no handlers, tuned by `[scheduler]`.
    #[must_use]
    pub fn new(tasks: TaskRepo, config: &SchedulerConfig) -> Self {
        Self {
            tasks,
            handlers: HashMap::new(),
            poll_interval: config.poll_interval(),
            lease: config.lease(),
            max_attempts: config.max_attempts,
            retry_base: Duration::from_secs(config.retry_base_seconds),
        }
    }

    /// Route tasks of `kind` to `handler`.
    #[must_use]
    pub fn register(mut self, kind: &str, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(kind.to_owned(), handler);
        self
    }

    /// Claim everything due at `now` and run it to completion.
    ///
    /// Returns the number of tasks executed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if claiming fails.
    pub async fn run_due_once(self: &Arc<Self>, now: DateTime<Utc>) -> Result<usize> {
        let claimed = self.tasks.claim_due(now, self.lease, CLAIM_BATCH).await?;
        let count = claimed.len();

        let mut running = JoinSet::new();
        for task in claimed {
            let runner = Arc::clone(self);
            running.spawn(async move { runner.execute(task).await });
        }
        while let Some(joined) = running.join_next().await {
            if let Err(err) = joined {
                error!(?err, "task execution panicked");
            }
        }
        Ok(count)
    }

    /// Run the claim loop until `cancel` fires, then give in-flight tasks
    /// up to `grace` to finish.
    #[must_use]
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken, grace: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            let mut running = JoinSet::new();

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        while let Some(joined) = running.try_join_next() {
                            if let Err(err) = joined {
                                error!(?err, "task execution panicked");
                            }
                        }
                        match self.tasks.claim_due(Utc::now(), self.lease, CLAIM_BATCH).await {
                            Ok(claimed) => {
                                for task in claimed {
                                    let runner = Arc::clone(&self);
                                    running.spawn(async move { runner.execute(task).await });
                                }
                            }
                            Err(err) => error!(%err, "failed to claim due tasks"),
                        }
                    }
                }
            }

            let in_flight = running.len();
            info!(in_flight, "task runner stopping");
            let drained = tokio::time::timeout(grace, async {
                while running.join_next().await.is_some() {}
            })
            .await;
            if drained.is_err() {
                warn!("grace period elapsed; aborting unfinished tasks");
                running.abort_all();
            }
            info!("task runner stopped");
        })
    }

    async fn execute(&self, task: ScheduledTask) {
        let span = info_span!(
            "task",
            task_id = %task.id,
            kind = %task.kind,
            key = %task.dedupe_key,
            attempt = task.attempts
        );
        async {
            let Some(handler) = self.handlers.get(&task.kind) else {
                error!("no handler registered for task kind");
                if let Err(err) = self.tasks.mark_failed(&task.id, "no handler").await {
                    error!(%err, "failed to park task");
                }
                return;
            };

            match handler.handle(&task).await {
                Ok(()) => {
                    debug!("task completed");
                    if let Err(err) = self.tasks.mark_done(&task.id).await {
                        // The lease expires and the task is redelivered;
                        // handlers are idempotent.
                        error!(%err, "failed to mark task done");
                    }
                }
                Err(err) => self.record_failure(&task, &err.to_string()).await,
            }
        }
        .instrument(span)
        .await;
    }

    async fn record_failure(&self, task: &ScheduledTask, reason: &str) {
        let outcome = if task.attempts >= self.max_attempts {
            error!(reason, "task failed; attempts exhausted");
            self.tasks.mark_failed(&task.id, reason).await
        } else {
            let delay = retry_delay(self.retry_base, task.attempts);
            warn!(reason, delay_secs = delay.as_secs(), "task failed; retrying");
            let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::hours(1));
            self.tasks
                .reschedule(&task.id, Utc::now() + delay, reason)
                .await
        };
        if let Err(err) = outcome {
            error!(%err, "failed to record task failure");
        }
    }
}

/// Re-arms finalization for polls that stayed active past their end.
pub struct Reconciler {
    polls: PollRepo,
    tasks: TaskRepo,
    grace: Duration,
}

impl Reconciler {
    /// Sweep polls overdue by more than `grace`.
    #[must_use]
    pub fn new(polls: PollRepo, tasks: TaskRepo, grace: Duration) -> Self {
        Self {
            polls,
            tasks,
            grace,
        }
    }

    /// One pass: (re)arm an immediate finalize task for each overdue poll.
    ///
    /// Returns how many tasks were inserted or reset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if listing overdue polls fails.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize> {
        let overdue = self.polls.list_due_active(now, self.grace).await?;
        let mut rearmed = 0;
        for poll in overdue {
            let payload = match finalize_payload(&poll) {
                Ok(payload) => payload,
                Err(err) => {
                    error!(poll_id = %poll.poll_id, %err, "cannot encode finalize payload");
                    continue;
                }
            };
            match self
                .tasks
                .rearm(FINALIZE_POLL, &poll.poll_id, &payload, now)
                .await
            {
                Ok(true) => {
                    warn!(poll_id = %poll.poll_id, ends_at = %poll.ends_at, "re-armed overdue poll");
                    rearmed += 1;
                }
                Ok(false) => {}
                Err(err) => error!(poll_id = %poll.poll_id, %err, "failed to re-arm poll"),
            }
        }
        Ok(rearmed)
    }

    /// Run [`Self::sweep`] every `interval` until `cancel` fires.
    #[must_use]
    pub fn spawn(self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        info!("reconciler shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = self.sweep(Utc::now()).await {
                            error!(%err, "reconciliation sweep failed");
                        }
                    }
                }
            }
        })
    }
}
