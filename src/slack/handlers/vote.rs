//! Native poll answer clicks.

use std::collections::BTreeSet;

use tracing::{info, info_span, Instrument};

use crate::models::vote::ChatUser;
use crate::state::AppState;
use crate::{AppError, Result};

/// Record `user`'s answer `option_index` in `poll_id`, replacing any
/// earlier answer. Returns the acknowledgement text.
///
/// A click that arrives before the poll row is stored is still recorded;
/// the finalizer reads votes by poll id only. The poll lock is held from
/// the status check through the write, so a click racing finalization
/// either lands before the tally or is refused as closed.
///
/// # Errors
///
/// - `AppError::Validation` when the poll is closed or the index is out
///   of range.
/// - `AppError::Db` on store failures.
pub async fn handle_vote(
    state: &AppState,
    poll_id: &str,
    option_index: usize,
    user: &ChatUser,
) -> Result<String> {
    let span = info_span!("vote", poll_id, user_id = %user.user_id, option_index);
    async move {
        let _guard = state.locks.acquire(poll_id).await;
        let poll = state.polls.get(poll_id).await?;
        let answer = match &poll {
            Some(poll) if poll.is_processed() => {
                return Err(AppError::Validation("voting for this poll is closed".into()));
            }
            Some(poll) => Some(poll.answers.get(option_index).cloned().ok_or_else(|| {
                AppError::Validation(format!("answer #{} does not exist", option_index + 1))
            })?),
            None => None,
        };

        state
            .votes
            .upsert_vote(poll_id, user, &BTreeSet::from([option_index]))
            .await?;
        info!("vote recorded");

        Ok(match answer {
            Some(answer) => format!("Your answer: *{answer}*"),
            None => "Your answer is recorded.".to_owned(),
        })
    }
    .instrument(span)
    .await
}
