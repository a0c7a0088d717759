//! Slack slash command router.
//!
//! `/poll` with text creates a poll right away; without text it opens the
//! step-by-step wizard.

use std::sync::Arc;

use slack_morphism::prelude::{
    SlackClient, SlackClientEventsUserState, SlackClientHyperHttpsConnector, SlackCommandEvent,
    SlackCommandEventResponse, SlackMessageContent, SlackMessageResponseType,
};
use tracing::{info, warn};

use crate::slack::client::SlackService;
use crate::slack::handlers::{self, report_error};
use crate::state::AppState;

/// Handle incoming slash commands routed via Socket Mode.
///
/// The response only acknowledges the command; the poll or wizard shows
/// up as a separate message once the background work finishes.
///
/// # Errors
///
/// Returns an error if the command response cannot be constructed.
pub async fn handle_command(
    event: SlackCommandEvent,
    _client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    state: SlackClientEventsUserState,
) -> slack_morphism::AnyStdResult<SlackCommandEventResponse> {
    info!(command = ?event.command, user = ?event.user_id, "received slash command");

    let services = {
        let guard = state.read().await;
        guard
            .get_user_state::<Arc<AppState>>()
            .cloned()
            .zip(guard.get_user_state::<Arc<SlackService>>().cloned())
    };
    let Some((app, slack)) = services else {
        warn!("app state not available; cannot process command");
        return Ok(ephemeral("The bot is not ready yet. Try again in a minute."));
    };

    let chat_id = event.channel_id.to_string();
    let user_id = event.user_id.to_string();
    let text = event.text.unwrap_or_default().trim().to_owned();
    let starts_wizard = text.is_empty();

    let app_for_task = Arc::clone(&app);
    let accepted = app.dispatch(async move {
        let app = app_for_task;
        let user = slack.resolve_user(&user_id).await;
        let outcome = if starts_wizard {
            handlers::wizard::start(&app, &chat_id, &user).await
        } else {
            handlers::poll_command::create_from_text(&app, &chat_id, &user, &text)
                .await
                .map(|_| ())
        };
        if let Err(err) = outcome {
            report_error(&app, &chat_id, &user, &err).await;
        }
    });

    let reply = match (accepted, starts_wizard) {
        (false, _) => "The bot is restarting. Try again in a minute.",
        (true, true) => "Starting the poll wizard…",
        (true, false) => "Creating your poll…",
    };
    Ok(ephemeral(reply))
}

fn ephemeral(text: &str) -> SlackCommandEventResponse {
    SlackCommandEventResponse {
        content: SlackMessageContent {
            text: Some(text.to_owned()),
            blocks: None,
            attachments: None,
            upload: None,
            files: None,
            reactions: None,
            metadata: None,
        },
        response_type: Some(SlackMessageResponseType::Ephemeral),
    }
}
