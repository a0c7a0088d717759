//! Chat transport abstraction.
//!
//! The [`ChatTransport`] trait decouples the poll engine (lifecycle,
//! finalization, queue mutation, wizard) from the chat platform. The Slack
//! implementation lives in [`crate::slack::client`]; tests use an in-memory
//! recorder.

use std::future::Future;
use std::pin::Pin;

use crate::Result;

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Request to render a native poll object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativePollRequest {
    /// Chat to post into.
    pub chat_id: String,
    /// Question shown above the options.
    pub question: String,
    /// Ordered answer options.
    pub options: Vec<String>,
    /// Each user holds at most one selection.
    pub single_answer: bool,
    /// Voter identities are hidden.
    pub anonymous: bool,
}

/// Identifiers of a created native poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativePoll {
    /// Transport-assigned, globally unique poll identifier.
    pub poll_id: String,
    /// Message that renders the poll.
    pub message_id: String,
}

/// An interactive button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    /// Routing identifier delivered back on click.
    pub action_id: String,
    /// Visible label.
    pub label: String,
    /// Opaque value delivered back on click.
    pub value: String,
}

impl Button {
    /// Build a button.
    #[must_use]
    pub fn new(
        action_id: impl Into<String>,
        label: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            action_id: action_id.into(),
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Message body plus optional buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Chat to post into.
    pub chat_id: String,
    /// Message text (mrkdwn).
    pub text: String,
    /// Buttons rendered under the text, in order.
    pub buttons: Vec<Button>,
    /// Thread to reply in, if any.
    pub thread_id: Option<String>,
}

impl OutgoingMessage {
    /// Plain text message with no buttons.
    #[must_use]
    pub fn text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
            buttons: Vec::new(),
            thread_id: None,
        }
    }

    /// Attach buttons.
    #[must_use]
    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons = buttons;
        self
    }

    /// Post as a reply in `thread_id`.
    #[must_use]
    pub fn in_thread(mut self, thread_id: Option<String>) -> Self {
        self.thread_id = thread_id;
        self
    }
}

/// Who to answer when acknowledging an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRef {
    /// Chat the interaction happened in.
    pub chat_id: String,
    /// User who triggered it.
    pub user_id: String,
}

/// Operations the poll engine needs from a chat platform.
pub trait ChatTransport: Send + Sync {
    /// Render a native poll and return its identifiers.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the platform rejects the request.
    fn create_native_poll(&self, request: NativePollRequest) -> TransportFuture<'_, NativePoll>;

    /// Close a native poll so it accepts no further votes.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` on failure, including "already stopped".
    fn stop_native_poll(&self, chat_id: &str, message_id: &str) -> TransportFuture<'_, ()>;

    /// Send a message and return its identifier.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if delivery fails.
    fn send_message(&self, message: OutgoingMessage) -> TransportFuture<'_, String>;

    /// Replace the content of an existing message.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the edit fails.
    fn edit_message(&self, message_id: &str, message: OutgoingMessage)
        -> TransportFuture<'_, ()>;

    /// Acknowledge an interaction privately to the user who triggered it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the acknowledgement fails.
    fn answer_callback(&self, callback: CallbackRef, text: &str) -> TransportFuture<'_, ()>;
}
