//! Queue join/leave from buttons and from replies in a results thread.

use crate::models::intent::QueueAction;
use crate::models::vote::ChatUser;
use crate::orchestrator::render::{QUEUE_JOIN_ACTION, QUEUE_LEAVE_ACTION};
use crate::state::AppState;
use crate::{AppError, Result};

/// Map a queue button's action id to its action.
///
/// # Errors
///
/// Returns `AppError::Validation` for an unknown action id.
pub fn parse_queue_action(action_id: &str) -> Result<QueueAction> {
    match action_id {
        QUEUE_JOIN_ACTION => Ok(QueueAction::Join),
        QUEUE_LEAVE_ACTION => Ok(QueueAction::Leave),
        other => Err(AppError::Validation(format!("unknown queue action `{other}`"))),
    }
}

/// Apply a join/leave button click on `poll_id`'s results message.
///
/// # Errors
///
/// See [`crate::orchestrator::queue::QueueService::apply`].
pub async fn handle_queue_button(
    state: &AppState,
    poll_id: &str,
    action_id: &str,
    user: &ChatUser,
) -> Result<String> {
    let action = parse_queue_action(action_id)?;
    let queue = state.queue.apply(poll_id, user, action).await?;
    Ok(acknowledgement(action, &queue, &user.user_id))
}

/// Interpret a reply to a results message as a join or leave.
///
/// Returns `Ok(None)` when `thread_id` is not a results message, so the
/// caller can route the text elsewhere.
///
/// # Errors
///
/// - `AppError::Intent` when the text is neither a join nor a leave.
/// - Queue errors from [`crate::orchestrator::queue::QueueService::apply`].
pub async fn handle_thread_reply(
    state: &AppState,
    chat_id: &str,
    thread_id: &str,
    user: &ChatUser,
    text: &str,
) -> Result<Option<String>> {
    let Some(poll) = state
        .polls
        .find_by_results_message_id(chat_id, thread_id)
        .await?
    else {
        return Ok(None);
    };

    let action = state.resolver.resolve_queue_intent(text).await?;
    let queue = state.queue.apply(&poll.poll_id, user, action).await?;
    Ok(Some(acknowledgement(action, &queue, &user.user_id)))
}

fn acknowledgement(action: QueueAction, queue: &[String], user_id: &str) -> String {
    match action {
        QueueAction::Join => {
            let position = queue.iter().position(|id| id == user_id).map_or(queue.len(), |p| p + 1);
            format!("You joined the queue at position {position}.")
        }
        QueueAction::Leave => "You left the queue.".to_owned(),
    }
}
