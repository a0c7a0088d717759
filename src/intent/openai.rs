//! LLM-backed resolver speaking the chat-completions HTTP API.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use super::{IntentFuture, IntentResolver};
use crate::config::IntentConfig;
use crate::display::DisplayZone;
use crate::models::intent::{PollIntent, QueueAction};
use crate::models::poll::DEFAULT_ANSWERS;
use crate::{AppError, Result};

/// Resolver that delegates understanding to a hosted language model.
pub struct OpenAiResolver {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    zone: DisplayZone,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct QueueReply {
    action: String,
}

impl OpenAiResolver {
    /// Build a resolver from the `[intent]` config section.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the HTTP client cannot be built.
    pub fn new(config: &IntentConfig, zone: DisplayZone) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            zone,
        })
    }

    fn poll_prompt(&self) -> String {
        let now = self.zone.now_local();
        let today = now.format("%Y-%m-%d");
        let clock = now.format("%Y-%m-%d %H:%M");
        let offset = now.format("%:z");
        let defaults = DEFAULT_ANSWERS.join("\", \"");

        format!(
            "You parse requests for creating attendance polls, written in Russian or English.\n\
             \n\
             Current date: {today}. Current local time: {clock} (UTC{offset}).\n\
             A bare time such as \"15:08\" or \"до 15:08\" means today at that time, or \
             tomorrow if it has already passed.\n\
             \n\
             Extract:\n\
             1. topic (required).\n\
             2. end_time OR duration (one required). end_time must be absolute ISO 8601 \
             with offset, e.g. {today}T15:04:05{offset}. duration uses forms like 30m, 1h, \
             2h30m. Prefer end_time when both are given.\n\
             3. answers (optional). Omit to use the defaults [\"{defaults}\"].\n\
             4. coming_answer_index (0-based), required with custom answers: which answer \
             means the person is attending.\n\
             \n\
             Reply with ONLY a JSON object: \
             {{\"topic\": string, \"duration\": string?, \"end_time\": string?, \
             \"answers\": [string]?, \"coming_answer_index\": int?}}\n\
             \n\
             If the request cannot be parsed, reply with plain text (not JSON) that says \
             which field is missing and shows an example of a correct request."
        )
    }

    async fn complete(&self, system: String, user_text: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user_text },
            ],
        });

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                error!(?err, "intent request failed");
                unavailable()
            })?;

        if !response.status().is_success() {
            error!(status = %response.status(), "intent endpoint returned an error");
            return Err(unavailable());
        }

        let completion: CompletionResponse = response.json().await.map_err(|err| {
            error!(?err, "intent response was not a completion");
            unavailable()
        })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| strip_code_fence(&content).to_owned())
            .ok_or_else(|| {
                warn!("intent completion had no content");
                unavailable()
            })
    }
}

fn unavailable() -> AppError {
    AppError::Intent("the text assistant is unavailable right now".into())
}

/// Remove a surrounding Markdown code fence, if the model added one.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Validate a model reply into a [`PollIntent`].
///
/// A reply that is not a JSON object is the model explaining what is
/// missing, and becomes the user-facing reason.
///
/// # Errors
///
/// Returns `AppError::Intent` with a reason for the user.
pub fn interpret_poll_reply(reply: &str) -> Result<PollIntent> {
    if !reply.starts_with('{') {
        return Err(AppError::Intent(reply.to_owned()));
    }

    let mut intent: PollIntent = serde_json::from_str(reply).map_err(|err| {
        warn!(?err, reply, "intent reply was malformed json");
        AppError::Intent("could not understand the request; try `Topic | 30m`".into())
    })?;

    intent.topic = intent.topic.trim().to_owned();
    if intent.topic.is_empty() {
        return Err(AppError::Intent(
            "the poll topic is missing; add what the poll is about".into(),
        ));
    }

    let has_duration = intent.duration.as_deref().is_some_and(|d| !d.trim().is_empty());
    let has_end_time = intent.end_time.as_deref().is_some_and(|e| !e.trim().is_empty());
    if !has_duration && !has_end_time {
        return Err(AppError::Intent(
            "no duration or end time given; add e.g. `30m` or `until 13:48`".into(),
        ));
    }

    match intent.answers.as_deref() {
        Some(answers) if !answers.is_empty() => {
            let valid = intent
                .coming_answer_index
                .is_some_and(|index| index < answers.len());
            if !valid {
                return Err(AppError::Intent(
                    "say which answer means attending, e.g. `Yes, No (first means attending)`"
                        .into(),
                ));
            }
        }
        _ => {
            intent.answers = None;
            intent.coming_answer_index = None;
        }
    }
    Ok(intent)
}

/// Validate a model reply into a [`QueueAction`].
///
/// # Errors
///
/// Returns `AppError::Intent` when the reply names no known action.
pub fn interpret_queue_reply(reply: &str) -> Result<QueueAction> {
    let parsed: Option<QueueReply> = serde_json::from_str(reply).ok();
    match parsed.as_ref().map(|r| r.action.trim().to_lowercase()).as_deref() {
        Some("join") => Ok(QueueAction::Join),
        Some("leave") => Ok(QueueAction::Leave),
        _ => Err(AppError::Intent(
            "cannot tell whether you want to join or leave; reply `join` or `leave`".into(),
        )),
    }
}

const QUEUE_PROMPT: &str = "You classify replies to a queue announcement, written in Russian \
    or English, as joining or leaving the queue.\n\
    Join examples: \"хочу в очередь\", \"добавь меня\", \"запиши меня\", \"join\", \"add me\".\n\
    Leave examples: \"выхожу из очереди\", \"убери меня\", \"скип\", \"remove me\", \"leave\".\n\
    Reply with ONLY a JSON object: {\"action\": \"join\"} or {\"action\": \"leave\"}.";

impl IntentResolver for OpenAiResolver {
    fn resolve_poll_intent(&self, text: &str) -> IntentFuture<'_, PollIntent> {
        let text = text.to_owned();
        Box::pin(async move {
            let reply = self.complete(self.poll_prompt(), &text).await?;
            interpret_poll_reply(&reply)
        })
    }

    fn resolve_queue_intent(&self, text: &str) -> IntentFuture<'_, QueueAction> {
        let text = text.to_owned();
        Box::pin(async move {
            let reply = self.complete(QUEUE_PROMPT.to_owned(), &text).await?;
            interpret_queue_reply(&reply)
        })
    }
}
