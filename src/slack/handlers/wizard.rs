//! Chat side of the creation wizard: rendering each step into the origin
//! message and turning button clicks and text into wizard inputs.
//!
//! Wizard buttons carry the owner's user id as their value. Clicks by
//! anyone else are answered privately and never reach the state machine.

use tracing::{info, warn};

use super::notify;
use super::poll_command::creator;
use crate::display::format_duration;
use crate::intent::duration::{format_duration_literal, parse_duration};
use crate::models::vote::ChatUser;
use crate::models::wizard::WizardKey;
use crate::orchestrator::wizard::{WizardInput, WizardReply, WizardResponse, PRESET_DURATIONS};
use crate::state::AppState;
use crate::transport::{Button, OutgoingMessage};
use crate::{AppError, Result};

/// Action id prefix of every wizard button.
pub const WIZARD_PREFIX: &str = "wizard_";

const PRESET_PREFIX: &str = "wizard_preset_";
const CUSTOM_ACTION: &str = "wizard_custom";
const CONFIRM_ACTION: &str = "wizard_confirm";
const BACK_ACTION: &str = "wizard_back";
const CANCEL_ACTION: &str = "wizard_cancel";

/// Text and buttons for a wizard reply. `None` for replies that leave the
/// message untouched.
#[must_use]
pub fn render(reply: &WizardReply, owner: &str) -> Option<(String, Vec<Button>)> {
    let cancel = Button::new(CANCEL_ACTION, "Cancel", owner);
    let back = Button::new(BACK_ACTION, "Back", owner);
    let rendered = match reply {
        WizardReply::AskTopic => (
            "*New poll* (step 1 of 3)\nSend the poll topic as a message in this channel."
                .to_owned(),
            vec![cancel],
        ),
        WizardReply::ChooseDuration { topic } => {
            let mut buttons: Vec<Button> = PRESET_DURATIONS
                .iter()
                .map(|duration| {
                    let literal = format_duration_literal(*duration);
                    Button::new(format!("{PRESET_PREFIX}{literal}"), literal, owner)
                })
                .collect();
            buttons.push(Button::new(CUSTOM_ACTION, "Other…", owner));
            buttons.push(cancel);
            (
                format!("*{topic}* (step 2 of 3)\nHow long should voting stay open?"),
                buttons,
            )
        }
        WizardReply::AskCustomDuration => (
            "Send a duration such as `90m`, `2h30m` or `3d` (1 minute to 7 days).".to_owned(),
            vec![back, cancel],
        ),
        WizardReply::InvalidDuration { reason } => (
            format!("\u{274c} {reason}\nSend another duration."),
            vec![back, cancel],
        ),
        WizardReply::ConfirmPrompt { topic, duration } => (
            format!(
                "*{topic}* (step 3 of 3)\nVoting stays open for {}. Create the poll?",
                format_duration(*duration)
            ),
            vec![Button::new(CONFIRM_ACTION, "Create", owner), back, cancel],
        ),
        WizardReply::Cancelled => ("Poll creation cancelled.".to_owned(), Vec::new()),
        WizardReply::Ready(_) | WizardReply::Ignored => return None,
    };
    Some(rendered)
}

/// Map a wizard button to its input.
#[must_use]
pub fn parse_wizard_action(action_id: &str) -> Option<WizardInput> {
    if let Some(literal) = action_id.strip_prefix(PRESET_PREFIX) {
        return parse_duration(literal)
            .ok()
            .filter(|duration| PRESET_DURATIONS.contains(duration))
            .map(WizardInput::Preset);
    }
    match action_id {
        CUSTOM_ACTION => Some(WizardInput::Custom),
        CONFIRM_ACTION => Some(WizardInput::Confirm),
        BACK_ACTION => Some(WizardInput::Back),
        CANCEL_ACTION => Some(WizardInput::Cancel),
        _ => None,
    }
}

/// Open a wizard for `user` in `chat_id`, replacing any session they had.
///
/// # Errors
///
/// Returns `AppError::Slack` if the wizard message cannot be posted.
pub async fn start(state: &AppState, chat_id: &str, user: &ChatUser) -> Result<()> {
    let (text, buttons) = render(&WizardReply::AskTopic, &user.user_id)
        .ok_or_else(|| AppError::Validation("wizard has nothing to show".into()))?;
    let origin = state
        .transport
        .send_message(OutgoingMessage::text(chat_id, text).with_buttons(buttons))
        .await?;

    let key = WizardKey::new(chat_id, &user.user_id);
    state.wizard.handle(
        &key,
        WizardInput::Start {
            origin_message_id: Some(origin),
        },
    );
    info!(chat_id, user_id = %user.user_id, "wizard started");
    Ok(())
}

/// Feed a wizard button click to the clicking user's session.
///
/// # Errors
///
/// Returns errors from poll creation when the click confirms the wizard.
pub async fn handle_action(
    state: &AppState,
    chat_id: &str,
    action_id: &str,
    owner: &str,
    user: &ChatUser,
) -> Result<()> {
    if owner != user.user_id {
        notify(state, chat_id, &user.user_id, "This poll draft belongs to someone else. Start your own with `/poll`.").await;
        return Ok(());
    }
    let Some(input) = parse_wizard_action(action_id) else {
        warn!(action_id, "unknown wizard action");
        return Ok(());
    };

    let key = WizardKey::new(chat_id, &user.user_id);
    let response = state.wizard.handle(&key, input);
    apply(state, chat_id, user, response).await
}

/// Feed free text to `user`'s session if it is waiting for text.
///
/// Returns `Ok(false)` when no session wanted the text.
///
/// # Errors
///
/// Returns `AppError::Slack` if the wizard message cannot be updated.
pub async fn handle_text(
    state: &AppState,
    chat_id: &str,
    user: &ChatUser,
    text: &str,
) -> Result<bool> {
    let key = WizardKey::new(chat_id, &user.user_id);
    if !state.wizard.awaits_text(&key) {
        return Ok(false);
    }
    let response = state.wizard.handle(&key, WizardInput::Text(text.to_owned()));
    apply(state, chat_id, user, response).await?;
    Ok(true)
}

async fn apply(
    state: &AppState,
    chat_id: &str,
    user: &ChatUser,
    response: WizardResponse,
) -> Result<()> {
    let WizardResponse {
        reply,
        origin_message_id,
    } = response;

    if let WizardReply::Ready(spec) = reply {
        let created = state
            .lifecycle
            .create_poll(chat_id, spec, creator(user))
            .await;
        let text = match &created {
            Ok(poll) => format!(
                "\u{2705} Poll *{}* created. Voting closes {}.",
                poll.topic,
                state.zone.format_instant(poll.ends_at)
            ),
            Err(_) => "Poll was not created.".to_owned(),
        };
        show(state, chat_id, origin_message_id.as_deref(), text, Vec::new()).await?;
        return created.map(|_| ());
    }

    let Some((text, buttons)) = render(&reply, &user.user_id) else {
        return Ok(());
    };
    show(state, chat_id, origin_message_id.as_deref(), text, buttons).await
}

/// Edit the wizard's message, or post a fresh one when it has none.
async fn show(
    state: &AppState,
    chat_id: &str,
    origin_message_id: Option<&str>,
    text: String,
    buttons: Vec<Button>,
) -> Result<()> {
    let message = OutgoingMessage::text(chat_id, text).with_buttons(buttons);
    match origin_message_id {
        Some(message_id) => state.transport.edit_message(message_id, message).await,
        None => state.transport.send_message(message).await.map(|_| ()),
    }
}
