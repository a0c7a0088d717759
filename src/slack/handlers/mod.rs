//! Handlers for inbound chat updates.
//!
//! Handlers take plain identifiers and a [`ChatUser`] rather than Slack
//! payloads, so the dispatch layer in [`crate::slack::events`] and
//! [`crate::slack::commands`] stays thin.

pub mod poll_command;
pub mod queue;
pub mod vote;
pub mod wizard;

use tracing::{error, info, warn};

use crate::models::vote::ChatUser;
use crate::state::AppState;
use crate::transport::CallbackRef;
use crate::AppError;

/// Privately tell `user_id` something.
pub async fn notify(state: &AppState, chat_id: &str, user_id: &str, text: &str) {
    let callback = CallbackRef {
        chat_id: chat_id.to_owned(),
        user_id: user_id.to_owned(),
    };
    if let Err(err) = state.transport.answer_callback(callback, text).await {
        warn!(%err, chat_id, user_id, "failed to answer user");
    }
}

/// Report a failed request to the user who made it.
///
/// User-facing errors are explained; anything else is logged and answered
/// with a generic apology.
pub async fn report_error(state: &AppState, chat_id: &str, user: &ChatUser, err: &AppError) {
    if err.is_user_facing() {
        info!(%err, user_id = %user.user_id, "request rejected");
    } else {
        error!(%err, user_id = %user.user_id, "request failed");
    }
    notify(state, chat_id, &user.user_id, &err.user_message()).await;
}
