//! Results and queue message text.

use std::collections::HashMap;

use rand::Rng;

use crate::models::vote::VoterInfo;
use crate::transport::Button;

/// Action id of the "join queue" button.
pub const QUEUE_JOIN_ACTION: &str = "queue_join";
/// Action id of the "leave queue" button.
pub const QUEUE_LEAVE_ACTION: &str = "queue_leave";

/// Uniform in-place permutation (Fisher–Yates).
///
/// For `i` from `len - 1` down to `1`, swap element `i` with one chosen
/// uniformly from `0..=i`.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// How a queued user is shown: `@handle (Name)`, `@handle`, `Name`, or a
/// placeholder.
#[must_use]
pub fn display_name(info: &VoterInfo) -> String {
    match (info.username.is_empty(), info.name.is_empty()) {
        (false, false) => format!("@{} ({})", info.username, info.name),
        (false, true) => format!("@{}", info.username),
        (true, false) => info.name.clone(),
        (true, true) => "Anonymous".to_owned(),
    }
}

/// Numbered queue listing under a header naming the topic.
///
/// Ids missing from `users` are shown as `Unknown`.
#[must_use]
pub fn format_queue_text(topic: &str, user_ids: &[String], users: &HashMap<String, VoterInfo>) -> String {
    let mut text = format!("*Results for: {topic}*\n\n");
    if user_ids.is_empty() {
        text.push_str("No one is in the queue.");
        return text;
    }

    for (position, user_id) in user_ids.iter().enumerate() {
        let line = users
            .get(user_id)
            .map_or_else(|| "Unknown".to_owned(), display_name);
        text.push_str(&format!("{}. {line}\n", position + 1));
    }
    text.trim_end().to_owned()
}

/// Text of the first results message, before anyone joins or leaves.
#[must_use]
pub fn format_results_text(topic: &str, voters: &[VoterInfo]) -> String {
    if voters.is_empty() {
        return format!("*Results for: {topic}*\n\nNo one is coming.");
    }
    let ids: Vec<String> = voters.iter().map(|v| v.user_id.clone()).collect();
    let users: HashMap<String, VoterInfo> = voters
        .iter()
        .map(|v| (v.user_id.clone(), v.clone()))
        .collect();
    format_queue_text(topic, &ids, &users)
}

/// Join/leave buttons carried by every results message.
#[must_use]
pub fn queue_buttons(poll_id: &str) -> Vec<Button> {
    vec![
        Button::new(QUEUE_JOIN_ACTION, "Join queue", poll_id),
        Button::new(QUEUE_LEAVE_ACTION, "Leave queue", poll_id),
    ]
}
