//! Join/leave mutations of a finalized poll's queue.

use std::sync::Arc;

use tracing::{error, info, info_span, Instrument};

use super::locks::PollLocks;
use super::render::{format_queue_text, queue_buttons};
use crate::models::intent::QueueAction;
use crate::models::poll::QueueContext;
use crate::models::vote::ChatUser;
use crate::persistence::poll_repo::PollRepo;
use crate::persistence::vote_repo::VoteRepo;
use crate::transport::{ChatTransport, OutgoingMessage};
use crate::{AppError, Result};

/// Serialized read-modify-write of queue order plus in-place re-render.
pub struct QueueService {
    polls: PollRepo,
    votes: VoteRepo,
    transport: Arc<dyn ChatTransport>,
    locks: Arc<PollLocks>,
}

impl QueueService {
    /// Wire the service to its stores and transport.
    #[must_use]
    pub fn new(
        polls: PollRepo,
        votes: VoteRepo,
        transport: Arc<dyn ChatTransport>,
        locks: Arc<PollLocks>,
    ) -> Self {
        Self {
            polls,
            votes,
            transport,
            locks,
        }
    }

    /// Append `user` to the tail of the queue.
    ///
    /// # Errors
    ///
    /// - `AppError::QueueNotReady` before finalization.
    /// - `AppError::AlreadyInQueue` if the user is queued; nothing changes.
    /// - `AppError::NotFound` for an unknown poll.
    pub async fn join_queue(&self, poll_id: &str, user: &ChatUser) -> Result<Vec<String>> {
        let span = info_span!("join_queue", poll_id, user_id = %user.user_id);
        async move {
            let _guard = self.locks.acquire(poll_id).await;
            let context = self.ready_context(poll_id).await?;

            // Non-voters joining later still need a name in the listing.
            self.votes.record_user(poll_id, user).await?;

            let queue = self
                .polls
                .mutate_queue(poll_id, |queue| {
                    if queue.contains(&user.user_id) {
                        return Err(AppError::AlreadyInQueue(user.user_id.clone()));
                    }
                    queue.push(user.user_id.clone());
                    Ok(())
                })
                .await?;

            info!(position = queue.len(), "user joined queue");
            self.rerender(poll_id, &context, &queue).await;
            Ok(queue)
        }
        .instrument(span)
        .await
    }

    /// Remove `user_id`, keeping everyone else's relative order.
    ///
    /// # Errors
    ///
    /// - `AppError::QueueNotReady` before finalization.
    /// - `AppError::NotInQueue` if the user is not queued; nothing changes.
    /// - `AppError::NotFound` for an unknown poll.
    pub async fn leave_queue(&self, poll_id: &str, user_id: &str) -> Result<Vec<String>> {
        let span = info_span!("leave_queue", poll_id, user_id);
        async move {
            let _guard = self.locks.acquire(poll_id).await;
            let context = self.ready_context(poll_id).await?;

            let queue = self
                .polls
                .mutate_queue(poll_id, |queue| {
                    let position = queue
                        .iter()
                        .position(|id| id == user_id)
                        .ok_or_else(|| AppError::NotInQueue(user_id.to_owned()))?;
                    queue.remove(position);
                    Ok(())
                })
                .await?;

            info!(remaining = queue.len(), "user left queue");
            self.rerender(poll_id, &context, &queue).await;
            Ok(queue)
        }
        .instrument(span)
        .await
    }

    /// Dispatch a resolved [`QueueAction`].
    ///
    /// # Errors
    ///
    /// See [`Self::join_queue`] and [`Self::leave_queue`].
    pub async fn apply(&self, poll_id: &str, user: &ChatUser, action: QueueAction) -> Result<Vec<String>> {
        match action {
            QueueAction::Join => self.join_queue(poll_id, user).await,
            QueueAction::Leave => self.leave_queue(poll_id, &user.user_id).await,
        }
    }

    async fn ready_context(&self, poll_id: &str) -> Result<QueueContext> {
        let context = self.polls.get_queue_context(poll_id).await?;
        if context.results_message_id.is_none() {
            return Err(AppError::QueueNotReady(format!("poll {poll_id} is still open")));
        }
        Ok(context)
    }

    /// Rebuild the results message from the persisted queue and edit it in
    /// place. The mutation is already committed, so failures are logged.
    async fn rerender(&self, poll_id: &str, context: &QueueContext, queue: &[String]) {
        let Some(results_message_id) = context.results_message_id.as_deref() else {
            return;
        };

        let users = match self.votes.get_user_info(poll_id, queue).await {
            Ok(users) => users,
            Err(err) => {
                error!(%err, "queue changed but user names unreadable; results not re-rendered");
                return;
            }
        };

        let text = format_queue_text(&context.topic, queue, &users);
        let message =
            OutgoingMessage::text(&context.chat_id, text).with_buttons(queue_buttons(poll_id));
        if let Err(err) = self.transport.edit_message(results_message_id, message).await {
            error!(%err, results_message_id, "queue changed but results message not updated");
        }
    }
}
