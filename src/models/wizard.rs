//! Creation wizard session state.

use std::time::{Duration, Instant};

/// Step the wizard is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    /// Waiting for the topic as free text.
    Topic,
    /// Waiting for a preset duration button (or "custom").
    Duration,
    /// Waiting for a free-form duration.
    DurationCustom,
    /// Waiting for confirm / back.
    Confirm,
}

/// Sessions are keyed by `(chat_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WizardKey {
    /// Chat the wizard runs in.
    pub chat_id: String,
    /// Owner of the session.
    pub user_id: String,
}

impl WizardKey {
    /// Build a key.
    #[must_use]
    pub fn new(chat_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            user_id: user_id.into(),
        }
    }
}

/// Process-local, ephemeral wizard state.
#[derive(Debug, Clone)]
pub struct WizardSession {
    /// Current step.
    pub step: WizardStep,
    /// Topic, once entered.
    pub topic: Option<String>,
    /// Duration, once chosen.
    pub duration: Option<Duration>,
    /// Message the wizard renders into.
    pub origin_message_id: Option<String>,
    /// Last time the session advanced.
    pub touched_at: Instant,
}

impl WizardSession {
    /// Fresh session waiting for a topic.
    #[must_use]
    pub fn new(origin_message_id: Option<String>) -> Self {
        Self {
            step: WizardStep::Topic,
            topic: None,
            duration: None,
            origin_message_id,
            touched_at: Instant::now(),
        }
    }
}
