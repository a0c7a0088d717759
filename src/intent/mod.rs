//! Intent resolution: free text to poll specs and queue actions.
//!
//! [`IntentResolver`] is the seam between chat handlers and whatever
//! understands the text. [`openai::OpenAiResolver`] asks an LLM;
//! [`literal::LiteralResolver`] understands the compact `Topic | 45m`
//! syntax and a handful of join/leave phrases. [`FallbackResolver`] chains
//! the two.

pub mod duration;
pub mod literal;
pub mod openai;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::debug;

use crate::models::intent::{PollIntent, QueueAction};
use crate::Result;

/// Boxed future returned by resolvers.
pub type IntentFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Turns user text into structured requests.
///
/// Failures are `AppError::Intent` or `AppError::Validation` carrying a
/// reason the user can act on.
pub trait IntentResolver: Send + Sync {
    /// Extract a poll request from `text`.
    ///
    /// # Errors
    ///
    /// Returns a user-facing error describing what is missing.
    fn resolve_poll_intent(&self, text: &str) -> IntentFuture<'_, PollIntent>;

    /// Classify `text` as a queue join or leave.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Intent` when the text is neither.
    fn resolve_queue_intent(&self, text: &str) -> IntentFuture<'_, QueueAction>;
}

/// Tries `primary` first and falls back to `fallback` when it fails.
///
/// When both fail, the primary's error is reported since it is usually the
/// more descriptive one.
pub struct FallbackResolver {
    primary: Option<Arc<dyn IntentResolver>>,
    fallback: Arc<dyn IntentResolver>,
}

impl FallbackResolver {
    /// Chain `primary` (if any) in front of `fallback`.
    #[must_use]
    pub fn new(primary: Option<Arc<dyn IntentResolver>>, fallback: Arc<dyn IntentResolver>) -> Self {
        Self { primary, fallback }
    }
}

impl IntentResolver for FallbackResolver {
    fn resolve_poll_intent(&self, text: &str) -> IntentFuture<'_, PollIntent> {
        let text = text.to_owned();
        Box::pin(async move {
            let Some(primary) = &self.primary else {
                return self.fallback.resolve_poll_intent(&text).await;
            };
            match primary.resolve_poll_intent(&text).await {
                Ok(intent) => Ok(intent),
                Err(primary_err) => match self.fallback.resolve_poll_intent(&text).await {
                    Ok(intent) => {
                        debug!(%primary_err, "primary resolver failed; literal parse succeeded");
                        Ok(intent)
                    }
                    Err(_) => Err(primary_err),
                },
            }
        })
    }

    fn resolve_queue_intent(&self, text: &str) -> IntentFuture<'_, QueueAction> {
        let text = text.to_owned();
        Box::pin(async move {
            // Keyword matching is cheap and unambiguous; only ask the
            // primary resolver when it finds nothing.
            match self.fallback.resolve_queue_intent(&text).await {
                Ok(action) => Ok(action),
                Err(fallback_err) => match &self.primary {
                    Some(primary) => primary.resolve_queue_intent(&text).await,
                    None => Err(fallback_err),
                },
            }
        })
    }
}
