//! Slack Block Kit message builders.

use slack_morphism::prelude::{
    SlackActionBlockElement, SlackActionsBlock, SlackBlock, SlackBlockButtonElement,
    SlackBlockId, SlackBlockPlainTextOnly, SlackBlockText, SlackSectionBlock,
};

use crate::transport::Button;

/// Action id prefix of native poll answer buttons.
pub const VOTE_PREFIX: &str = "vote_";

/// Build an actions block with the given buttons.
#[must_use]
pub fn action_buttons(block_id: &str, buttons: &[Button]) -> SlackBlock {
    let elements: Vec<SlackActionBlockElement> = buttons
        .iter()
        .map(|button| {
            SlackActionBlockElement::Button(
                SlackBlockButtonElement::new(
                    button.action_id.as_str().into(),
                    SlackBlockPlainTextOnly::from(button.label.as_str()),
                )
                .with_value(button.value.clone()),
            )
        })
        .collect();
    SlackBlock::Actions(
        SlackActionsBlock::new(elements).with_block_id(SlackBlockId(block_id.into())),
    )
}

/// Build a plain text section block.
#[must_use]
pub fn text_section(text: &str) -> SlackBlock {
    SlackBlock::Section(SlackSectionBlock::new().with_text(SlackBlockText::MarkDown(text.into())))
}

/// Text section followed by an optional row of buttons.
#[must_use]
pub fn message_blocks(block_id: &str, text: &str, buttons: &[Button]) -> Vec<SlackBlock> {
    let mut blocks = vec![text_section(text)];
    if !buttons.is_empty() {
        blocks.push(action_buttons(block_id, buttons));
    }
    blocks
}

/// One button per answer; clicks carry the answer index in the action id
/// and the poll id in the value.
#[must_use]
pub fn poll_answer_buttons(poll_id: &str, options: &[String]) -> Vec<Button> {
    options
        .iter()
        .enumerate()
        .map(|(index, option)| Button::new(format!("{VOTE_PREFIX}{index}"), option, poll_id))
        .collect()
}

/// Native poll rendering: question, answer list, and answer buttons.
#[must_use]
pub fn open_poll_blocks(poll_id: &str, question: &str, options: &[String]) -> Vec<SlackBlock> {
    let text = format!("\u{1f4ca} *{question}*");
    message_blocks(
        &format!("poll_{poll_id}"),
        &text,
        &poll_answer_buttons(poll_id, options),
    )
}

/// Replacement for a stopped poll: same question, no buttons.
#[must_use]
pub fn closed_poll_blocks(question: Option<&str>) -> Vec<SlackBlock> {
    let text = match question {
        Some(question) => format!("\u{1f512} *{question}*\nVoting is closed."),
        None => "\u{1f512} Voting is closed.".to_owned(),
    };
    vec![text_section(&text)]
}

/// Parse the answer index out of a `vote_<index>` action id.
#[must_use]
pub fn parse_vote_action(action_id: &str) -> Option<usize> {
    action_id.strip_prefix(VOTE_PREFIX)?.parse().ok()
}
