//! Slack interaction and push event dispatch.
//!
//! Block actions are routed by `action_id` prefix. Channel messages feed
//! either the queue (replies in a results thread) or a creation wizard
//! waiting for text. Mentions of the bot behave like `/poll`.
//!
//! Work is handed to [`AppState::dispatch`] so the Socket Mode
//! acknowledgement is never held up by store or API calls.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use slack_morphism::prelude::{
    SlackAppMentionEvent, SlackBasicUserInfo, SlackClient, SlackClientEventsUserState,
    SlackClientHyperHttpsConnector, SlackEventCallbackBody, SlackInteractionActionInfo,
    SlackInteractionEvent, SlackMessageEvent, SlackPushEventCallback,
};
use tracing::{debug, info, warn};

use crate::models::vote::ChatUser;
use crate::models::wizard::WizardKey;
use crate::slack::blocks::{parse_vote_action, VOTE_PREFIX};
use crate::slack::client::SlackService;
use crate::slack::handlers::{self, notify, report_error};
use crate::state::AppState;

const QUEUE_PREFIX: &str = "queue_";

static MENTION_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// Remove `<@U…>` mentions and surrounding whitespace.
#[must_use]
pub fn strip_mentions(text: &str) -> String {
    let mention = MENTION_RE.get_or_init(|| Regex::new(r"<@[A-Z0-9]+(?:\|[^>]*)?>").ok());
    match mention {
        Some(mention) => mention.replace_all(text, " ").trim().to_owned(),
        None => text.trim().to_owned(),
    }
}

fn contains_mention(text: &str) -> bool {
    text.contains("<@")
}

async fn user_state(
    state: &SlackClientEventsUserState,
) -> Option<(Arc<AppState>, Arc<SlackService>)> {
    let guard = state.read().await;
    let app = guard.get_user_state::<Arc<AppState>>().cloned()?;
    let slack = guard.get_user_state::<Arc<SlackService>>().cloned()?;
    Some((app, slack))
}

fn chat_user(info: &SlackBasicUserInfo) -> ChatUser {
    ChatUser {
        user_id: info.id.to_string(),
        username: info.username.clone(),
        name: info.name.clone(),
    }
}

/// Handle interactive payloads (button presses) delivered via Socket Mode.
///
/// # Errors
///
/// Never fails; per-action failures are reported to the acting user.
pub async fn handle_interaction(
    event: SlackInteractionEvent,
    _client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    state: SlackClientEventsUserState,
) -> slack_morphism::UserCallbackResult<()> {
    let Some((app, _slack)) = user_state(&state).await else {
        warn!("app state not available; cannot process interaction");
        return Ok(());
    };

    let SlackInteractionEvent::BlockActions(block_event) = event else {
        debug!("unhandled interaction event type");
        return Ok(());
    };

    let Some(user) = block_event.user.as_ref().map(chat_user) else {
        warn!("block action without user; ignoring");
        return Ok(());
    };
    let Some(chat_id) = block_event.channel.as_ref().map(|c| c.id.to_string()) else {
        warn!("block action outside a channel; ignoring");
        return Ok(());
    };

    for action in block_event.actions.unwrap_or_default() {
        let action_id = action.action_id.to_string();
        info!(action_id, user_id = %user.user_id, "dispatching block action");

        let app_for_task = Arc::clone(&app);
        let chat_id = chat_id.clone();
        let user = user.clone();
        app.dispatch(async move {
            dispatch_action(&app_for_task, &chat_id, &user, &action).await;
        });
    }
    Ok(())
}

async fn dispatch_action(
    app: &AppState,
    chat_id: &str,
    user: &ChatUser,
    action: &SlackInteractionActionInfo,
) {
    let action_id = action.action_id.to_string();
    let value = action.value.clone().unwrap_or_default();

    if action_id.starts_with(VOTE_PREFIX) {
        let Some(index) = parse_vote_action(&action_id) else {
            warn!(action_id, "malformed vote action");
            return;
        };
        match handlers::vote::handle_vote(app, &value, index, user).await {
            Ok(ack) => notify(app, chat_id, &user.user_id, &ack).await,
            Err(err) => report_error(app, chat_id, user, &err).await,
        }
    } else if action_id.starts_with(QUEUE_PREFIX) {
        match handlers::queue::handle_queue_button(app, &value, &action_id, user).await {
            Ok(ack) => notify(app, chat_id, &user.user_id, &ack).await,
            Err(err) => report_error(app, chat_id, user, &err).await,
        }
    } else if action_id.starts_with(handlers::wizard::WIZARD_PREFIX) {
        if let Err(err) =
            handlers::wizard::handle_action(app, chat_id, &action_id, &value, user).await
        {
            report_error(app, chat_id, user, &err).await;
        }
    } else {
        warn!(action_id, "unknown action_id prefix");
    }
}

/// Handle Events API payloads delivered via Socket Mode.
///
/// # Errors
///
/// Never fails; handler failures are reported to the sender.
pub async fn handle_push_event(
    event: SlackPushEventCallback,
    _client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    state: SlackClientEventsUserState,
) -> slack_morphism::UserCallbackResult<()> {
    let Some((app, slack)) = user_state(&state).await else {
        warn!("app state not available; cannot process push event");
        return Ok(());
    };

    match event.event {
        SlackEventCallbackBody::AppMention(mention) => {
            let app_for_task = Arc::clone(&app);
            app.dispatch(async move { on_mention(&app_for_task, &slack, mention).await });
        }
        SlackEventCallbackBody::Message(message) => {
            let app_for_task = Arc::clone(&app);
            app.dispatch(async move { on_message(&app_for_task, &slack, message).await });
        }
        _ => debug!("push event ignored"),
    }
    Ok(())
}

async fn on_mention(app: &AppState, slack: &SlackService, mention: SlackAppMentionEvent) {
    let chat_id = mention.channel.to_string();
    let text = strip_mentions(mention.content.text.as_deref().unwrap_or_default());
    let user = slack.resolve_user(&mention.user.to_string()).await;
    let thread_id = mention
        .origin
        .thread_ts
        .as_ref()
        .filter(|thread| **thread != mention.origin.ts)
        .map(ToString::to_string);

    if let Some(thread_id) = thread_id {
        match handlers::queue::handle_thread_reply(app, &chat_id, &thread_id, &user, &text).await {
            Ok(Some(ack)) => {
                notify(app, &chat_id, &user.user_id, &ack).await;
                return;
            }
            Ok(None) => {}
            Err(err) => {
                report_error(app, &chat_id, &user, &err).await;
                return;
            }
        }
    }

    let outcome = if text.is_empty() {
        handlers::wizard::start(app, &chat_id, &user).await
    } else {
        handlers::poll_command::create_from_text(app, &chat_id, &user, &text)
            .await
            .map(|_| ())
    };
    if let Err(err) = outcome {
        report_error(app, &chat_id, &user, &err).await;
    }
}

async fn on_message(app: &AppState, slack: &SlackService, message: SlackMessageEvent) {
    if message.sender.bot_id.is_some() || message.subtype.is_some() {
        return;
    }
    let (Some(user_id), Some(chat_id)) = (
        message.sender.user.as_ref().map(ToString::to_string),
        message.origin.channel.as_ref().map(ToString::to_string),
    ) else {
        return;
    };
    let text = message
        .content
        .as_ref()
        .and_then(|content| content.text.clone())
        .unwrap_or_default();
    // Mentions arrive again as `app_mention`.
    if text.trim().is_empty() || contains_mention(&text) {
        return;
    }

    let thread_id = message
        .origin
        .thread_ts
        .as_ref()
        .filter(|thread| **thread != message.origin.ts)
        .map(ToString::to_string);
    let awaits_wizard_text = app
        .wizard
        .awaits_text(&WizardKey::new(&chat_id, &user_id));
    if thread_id.is_none() && !awaits_wizard_text {
        return;
    }

    let user = slack.resolve_user(&user_id).await;
    if let Some(thread_id) = thread_id {
        match handlers::queue::handle_thread_reply(app, &chat_id, &thread_id, &user, &text).await {
            Ok(Some(ack)) => {
                notify(app, &chat_id, &user.user_id, &ack).await;
                return;
            }
            Ok(None) => {}
            Err(err) => {
                report_error(app, &chat_id, &user, &err).await;
                return;
            }
        }
    }

    if let Err(err) = handlers::wizard::handle_text(app, &chat_id, &user, &text).await {
        report_error(app, &chat_id, &user, &err).await;
    }
}
