//! Step-by-step poll creation, one session per `(chat, user)`.
//!
//! Sessions live in process memory only. Running more than one replica
//! would split sessions between processes, so the bot is deployed as a
//! single instance.
//!
//! Inbound updates are handled as independent tasks, so two inputs from
//! the same user sent in quick succession may reach [`Wizard::handle`] in
//! either order. Each input is checked against the session's current
//! step; one that no longer fits is answered with [`WizardReply::Ignored`]
//! and the user simply repeats it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::intent::duration::parse_duration;
use crate::models::poll::PollSpec;
use crate::models::wizard::{WizardKey, WizardSession, WizardStep};

/// Durations offered as buttons. A preset input outside this list is
/// ignored.
pub const PRESET_DURATIONS: [Duration; 7] = [
    Duration::from_secs(15 * 60),
    Duration::from_secs(30 * 60),
    Duration::from_secs(3600),
    Duration::from_secs(2 * 3600),
    Duration::from_secs(4 * 3600),
    Duration::from_secs(12 * 3600),
    Duration::from_secs(24 * 3600),
];

/// Shortest accepted custom duration.
pub const MIN_CUSTOM_DURATION: Duration = Duration::from_secs(60);
/// Longest accepted custom duration.
pub const MAX_CUSTOM_DURATION: Duration = Duration::from_secs(7 * 24 * 3600);

/// User input that can advance a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardInput {
    /// Begin (or restart) a session rendered in `origin_message_id`.
    Start {
        /// Message the wizard edits as it advances.
        origin_message_id: Option<String>,
    },
    /// Free text.
    Text(String),
    /// A preset duration button.
    Preset(Duration),
    /// The "custom duration" button.
    Custom,
    /// The confirm button.
    Confirm,
    /// The back button.
    Back,
    /// The cancel button.
    Cancel,
}

/// What to show the user after an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardReply {
    /// Ask for the topic.
    AskTopic,
    /// Offer preset durations for `topic`.
    ChooseDuration {
        /// Topic entered so far.
        topic: String,
    },
    /// Ask for a free-form duration.
    AskCustomDuration,
    /// The custom duration was rejected; ask again.
    InvalidDuration {
        /// Why it was rejected.
        reason: String,
    },
    /// Show the summary with confirm/back.
    ConfirmPrompt {
        /// Chosen topic.
        topic: String,
        /// Chosen duration.
        duration: Duration,
    },
    /// Session destroyed on request.
    Cancelled,
    /// Session completed; create this poll.
    Ready(PollSpec),
    /// Input did not apply to any session step.
    Ignored,
}

/// Reply plus the message the session renders into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardResponse {
    /// What to show.
    pub reply: WizardReply,
    /// Message to edit, when known.
    pub origin_message_id: Option<String>,
}

impl WizardResponse {
    fn ignored() -> Self {
        Self {
            reply: WizardReply::Ignored,
            origin_message_id: None,
        }
    }
}

/// Creation wizard state machine and session table.
pub struct Wizard {
    sessions: Mutex<HashMap<WizardKey, WizardSession>>,
    ttl: Duration,
}

impl Wizard {
    /// Empty wizard whose sessions expire after `ttl` of inactivity.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Whether `key` has a live session waiting for free text.
    #[must_use]
    pub fn awaits_text(&self, key: &WizardKey) -> bool {
        let mut sessions = self.lock();
        self.purge_expired(&mut sessions);
        sessions
            .get(key)
            .is_some_and(|s| matches!(s.step, WizardStep::Topic | WizardStep::DurationCustom))
    }

    /// Current step of `key`'s session.
    #[must_use]
    pub fn step(&self, key: &WizardKey) -> Option<WizardStep> {
        let mut sessions = self.lock();
        self.purge_expired(&mut sessions);
        sessions.get(key).map(|s| s.step)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        let mut sessions = self.lock();
        self.purge_expired(&mut sessions);
        sessions.len()
    }

    /// Advance `key`'s session with `input`.
    ///
    /// Only the session keyed by the acting user's `(chat, user)` is ever
    /// touched, so concurrent wizards in one chat cannot interfere.
    pub fn handle(&self, key: &WizardKey, input: WizardInput) -> WizardResponse {
        let mut sessions = self.lock();
        self.purge_expired(&mut sessions);

        if let WizardInput::Start { origin_message_id } = input {
            sessions.insert(key.clone(), WizardSession::new(origin_message_id.clone()));
            return WizardResponse {
                reply: WizardReply::AskTopic,
                origin_message_id,
            };
        }

        let Some(session) = sessions.get_mut(key) else {
            return WizardResponse::ignored();
        };
        let origin_message_id = session.origin_message_id.clone();

        if input == WizardInput::Cancel {
            sessions.remove(key);
            return WizardResponse {
                reply: WizardReply::Cancelled,
                origin_message_id,
            };
        }

        let reply = advance(session, input);
        match &reply {
            WizardReply::Ignored => return WizardResponse::ignored(),
            WizardReply::Ready(_) => {
                sessions.remove(key);
            }
            _ => session.touched_at = Instant::now(),
        }

        WizardResponse {
            reply,
            origin_message_id,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WizardKey, WizardSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn purge_expired(&self, sessions: &mut HashMap<WizardKey, WizardSession>) {
        let before = sessions.len();
        sessions.retain(|_, s| s.touched_at.elapsed() < self.ttl);
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, "expired wizard sessions dropped");
        }
    }
}

fn advance(session: &mut WizardSession, input: WizardInput) -> WizardReply {
    match (session.step, input) {
        (WizardStep::Topic, WizardInput::Text(text)) => {
            let topic = text.trim();
            if topic.is_empty() {
                return WizardReply::AskTopic;
            }
            session.topic = Some(topic.to_owned());
            session.step = WizardStep::Duration;
            WizardReply::ChooseDuration {
                topic: topic.to_owned(),
            }
        }
        (WizardStep::Duration, WizardInput::Preset(duration))
            if PRESET_DURATIONS.contains(&duration) =>
        {
            confirm(session, duration)
        }
        (WizardStep::Duration, WizardInput::Custom) => {
            session.step = WizardStep::DurationCustom;
            WizardReply::AskCustomDuration
        }
        (WizardStep::DurationCustom, WizardInput::Text(text)) => match parse_custom(&text) {
            Ok(duration) => confirm(session, duration),
            Err(reason) => WizardReply::InvalidDuration { reason },
        },
        (WizardStep::DurationCustom | WizardStep::Confirm, WizardInput::Back) => {
            session.step = WizardStep::Duration;
            session.duration = None;
            WizardReply::ChooseDuration {
                topic: session.topic.clone().unwrap_or_default(),
            }
        }
        (WizardStep::Confirm, WizardInput::Confirm) => {
            match (session.topic.clone(), session.duration) {
                (Some(topic), Some(duration)) => {
                    WizardReply::Ready(PollSpec::with_duration(topic, duration))
                }
                _ => WizardReply::Ignored,
            }
        }
        _ => WizardReply::Ignored,
    }
}

fn confirm(session: &mut WizardSession, duration: Duration) -> WizardReply {
    session.duration = Some(duration);
    session.step = WizardStep::Confirm;
    WizardReply::ConfirmPrompt {
        topic: session.topic.clone().unwrap_or_default(),
        duration,
    }
}

/// Parse a custom duration and check it against the allowed range.
///
/// # Errors
///
/// Returns a user-facing reason when the text is unparsable or out of range.
pub fn parse_custom(text: &str) -> std::result::Result<Duration, String> {
    let duration = parse_duration(text).map_err(|_| {
        format!("`{}` is not a duration; try 90m, 2h30m or 3d", text.trim())
    })?;
    if duration < MIN_CUSTOM_DURATION {
        return Err("the poll must last at least 1 minute".to_owned());
    }
    if duration > MAX_CUSTOM_DURATION {
        return Err("the poll can last at most 7 days".to_owned());
    }
    Ok(duration)
}
