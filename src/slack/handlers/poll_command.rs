//! One-shot poll creation from free text.

use tracing::{info_span, Instrument};

use crate::models::poll::{Creator, Poll};
use crate::models::vote::ChatUser;
use crate::state::AppState;
use crate::Result;

/// Resolve `text` into a poll spec and create the poll in `chat_id`.
///
/// # Errors
///
/// Returns the resolver's user-facing error when `text` is not
/// understood, validation errors from the lifecycle, or internal
/// transport/store failures.
pub async fn create_from_text(
    state: &AppState,
    chat_id: &str,
    user: &ChatUser,
    text: &str,
) -> Result<Poll> {
    let span = info_span!("poll_command", chat_id, user_id = %user.user_id);
    async move {
        let intent = state.resolver.resolve_poll_intent(text).await?;
        let spec = intent.into_spec(&state.zone)?;
        state
            .lifecycle
            .create_poll(chat_id, spec, creator(user))
            .await
    }
    .instrument(span)
    .await
}

/// Creator snapshot for `user`.
#[must_use]
pub fn creator(user: &ChatUser) -> Creator {
    Creator {
        user_id: user.user_id.clone(),
        username: user.username.clone(),
        name: user.name.clone(),
    }
}
