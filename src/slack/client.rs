//! Slack Web API client implementing [`ChatTransport`], plus the Socket
//! Mode listener that feeds inbound events to the handlers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use slack_morphism::errors::SlackClientError;
use slack_morphism::prelude::{
    SlackApiChatPostEphemeralRequest, SlackApiChatPostMessageRequest, SlackApiChatUpdateRequest,
    SlackApiToken, SlackApiTokenType, SlackApiTokenValue, SlackApiUsersInfoRequest, SlackBlock,
    SlackChannelId, SlackClient, SlackClientEventsListenerEnvironment,
    SlackClientHyperHttpsConnector, SlackClientSession, SlackClientSocketModeConfig,
    SlackClientSocketModeListener, SlackMessageContent, SlackSocketModeListenerCallbacks,
    SlackTs, SlackUserId,
};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::blocks::{closed_poll_blocks, message_blocks, open_poll_blocks};
use crate::config::SlackConfig;
use crate::models::vote::ChatUser;
use crate::slack::{commands, events};
use crate::state::AppState;
use crate::transport::{
    CallbackRef, ChatTransport, NativePoll, NativePollRequest, OutgoingMessage, TransportFuture,
};
use crate::{AppError, Result};

const MAX_SEND_ATTEMPTS: u32 = 3;
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Slack connection owning the bot and app tokens.
pub struct SlackService {
    client: Arc<SlackClient<SlackClientHyperHttpsConnector>>,
    bot_token: SlackApiToken,
    app_token: SlackApiToken,
    /// Question text of open polls by message ts, for the closed rendering.
    questions: Mutex<HashMap<String, String>>,
}

impl SlackService {
    /// Build the HTTPS client. No connection is opened until the socket
    /// listener is spawned or an API call is made.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Slack` if the HTTPS connector cannot be created.
    pub fn new(config: &SlackConfig) -> Result<Self> {
        let connector = SlackClientHyperHttpsConnector::new()
            .map_err(|err| AppError::Slack(format!("failed to init slack connector: {err}")))?;
        let client = Arc::new(SlackClient::new(connector));
        let bot_token = SlackApiToken {
            token_value: SlackApiTokenValue(config.bot_token.clone()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::Bot),
        };
        let app_token = SlackApiToken {
            token_value: SlackApiTokenValue(config.app_token.clone()),
            cookie: None,
            team_id: None,
            scope: None,
            token_type: Some(SlackApiTokenType::App),
        };

        Ok(Self {
            client,
            bot_token,
            app_token,
            questions: Mutex::new(HashMap::new()),
        })
    }

    /// Create an HTTP session for direct API calls using the bot token.
    #[must_use]
    pub fn http_session(&self) -> SlackClientSession<'_, SlackClientHyperHttpsConnector> {
        self.client.open_session(&self.bot_token)
    }

    /// Start the Socket Mode listener. Inbound events reach the handlers
    /// with `state` and this service as user state. The listener stops
    /// when `cancel` fires.
    #[must_use]
    pub fn spawn_socket_mode(
        self: &Arc<Self>,
        state: Arc<AppState>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let listener_env = Arc::new(
            SlackClientEventsListenerEnvironment::new(Arc::clone(&self.client))
                .with_error_handler(|err, _client, _state| {
                    error!(?err, "socket mode error");
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR
                })
                .with_user_state(state)
                .with_user_state(Arc::clone(self)),
        );
        let callbacks = SlackSocketModeListenerCallbacks::new()
            .with_hello_events(|event, _client, _state| async move {
                debug!(?event, "socket hello");
            })
            .with_command_events(commands::handle_command)
            .with_interaction_events(events::handle_interaction)
            .with_push_events(events::handle_push_event);
        let config = SlackClientSocketModeConfig {
            max_connections_count: SlackClientSocketModeConfig::DEFAULT_CONNECTIONS_COUNT,
            debug_connections: SlackClientSocketModeConfig::DEFAULT_DEBUG_CONNECTIONS,
            initial_backoff_in_seconds:
                SlackClientSocketModeConfig::DEFAULT_INITIAL_BACKOFF_IN_SECONDS,
            reconnect_timeout_in_seconds:
                SlackClientSocketModeConfig::DEFAULT_RECONNECT_TIMEOUT_IN_SECONDS,
            ping_interval_in_seconds: SlackClientSocketModeConfig::DEFAULT_PING_INTERVAL_IN_SECONDS,
            ping_failure_threshold_times:
                SlackClientSocketModeConfig::DEFAULT_PING_FAILURE_THRESHOLD_TIMES,
        };

        let listener = SlackClientSocketModeListener::new(&config, listener_env, callbacks);
        let app_token = self.app_token.clone();
        tokio::spawn(async move {
            if let Err(error) = listener.listen_for(&app_token).await {
                error!(?error, "socket mode listen failed");
                return;
            }
            info!("socket mode listener connected");

            cancel.cancelled().await;
            listener.shutdown().await;
            info!("socket mode listener exited");
        })
    }

    /// Look up display names for `user_id`. Falls back to the bare id when
    /// the directory is unreachable.
    pub async fn resolve_user(&self, user_id: &str) -> ChatUser {
        let request = SlackApiUsersInfoRequest::new(SlackUserId(user_id.to_owned()));
        match self.http_session().users_info(&request).await {
            Ok(response) => ChatUser {
                user_id: user_id.to_owned(),
                username: response.user.name,
                name: response.user.real_name,
            },
            Err(err) => {
                warn!(%err, user_id, "user lookup failed; using id only");
                ChatUser::id_only(user_id)
            }
        }
    }

    fn remember_question(&self, ts: &str, question: &str) {
        self.questions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ts.to_owned(), question.to_owned());
    }

    fn forget_question(&self, ts: &str) -> Option<String> {
        self.questions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(ts)
    }

    async fn post(
        &self,
        chat_id: &str,
        text: &str,
        blocks: Vec<SlackBlock>,
        thread_id: Option<String>,
    ) -> Result<String> {
        let request = SlackApiChatPostMessageRequest {
            channel: SlackChannelId(chat_id.to_owned()),
            content: content(text, blocks),
            as_user: None,
            icon_emoji: None,
            icon_url: None,
            link_names: Some(true),
            parse: None,
            thread_ts: thread_id.map(SlackTs),
            username: None,
            reply_broadcast: None,
            unfurl_links: None,
            unfurl_media: None,
        };
        let session = self.http_session();
        let (session, request) = (&session, &request);
        let response =
            with_rate_limit_retry("post message", move || session.chat_post_message(request))
                .await?;
        Ok(response.ts.0)
    }

    async fn update(&self, chat_id: &str, ts: &str, text: &str, blocks: Vec<SlackBlock>) -> Result<()> {
        let request = SlackApiChatUpdateRequest::new(
            SlackChannelId(chat_id.to_owned()),
            content(text, blocks),
            SlackTs(ts.to_owned()),
        );
        let session = self.http_session();
        let (session, request) = (&session, &request);
        with_rate_limit_retry("update message", move || session.chat_update(request)).await?;
        Ok(())
    }
}

impl ChatTransport for SlackService {
    fn create_native_poll(&self, request: NativePollRequest) -> TransportFuture<'_, NativePoll> {
        Box::pin(async move {
            let poll_id = uuid::Uuid::new_v4().to_string();
            let blocks = open_poll_blocks(&poll_id, &request.question, &request.options);
            let message_id = self
                .post(&request.chat_id, &request.question, blocks, None)
                .await?;
            self.remember_question(&message_id, &request.question);
            Ok(NativePoll {
                poll_id,
                message_id,
            })
        })
    }

    fn stop_native_poll(&self, chat_id: &str, message_id: &str) -> TransportFuture<'_, ()> {
        let chat_id = chat_id.to_owned();
        let message_id = message_id.to_owned();
        Box::pin(async move {
            let question = self.forget_question(&message_id);
            let blocks = closed_poll_blocks(question.as_deref());
            self.update(&chat_id, &message_id, "Voting is closed.", blocks)
                .await
        })
    }

    fn send_message(&self, message: OutgoingMessage) -> TransportFuture<'_, String> {
        Box::pin(async move {
            let blocks = message_blocks("actions", &message.text, &message.buttons);
            self.post(&message.chat_id, &message.text, blocks, message.thread_id)
                .await
        })
    }

    fn edit_message(
        &self,
        message_id: &str,
        message: OutgoingMessage,
    ) -> TransportFuture<'_, ()> {
        let message_id = message_id.to_owned();
        Box::pin(async move {
            let blocks = message_blocks("actions", &message.text, &message.buttons);
            self.update(&message.chat_id, &message_id, &message.text, blocks)
                .await
        })
    }

    fn answer_callback(&self, callback: CallbackRef, text: &str) -> TransportFuture<'_, ()> {
        let text = text.to_owned();
        Box::pin(async move {
            let request = SlackApiChatPostEphemeralRequest::new(
                SlackChannelId(callback.chat_id),
                SlackUserId(callback.user_id),
                content(&text, Vec::new()),
            );
            self.http_session()
                .chat_post_ephemeral(&request)
                .await
                .map_err(|err| AppError::Slack(format!("failed to answer user: {err}")))?;
            Ok(())
        })
    }
}

fn content(text: &str, blocks: Vec<SlackBlock>) -> SlackMessageContent {
    SlackMessageContent {
        text: Some(text.to_owned()),
        blocks: (!blocks.is_empty()).then_some(blocks),
        attachments: None,
        upload: None,
        files: None,
        reactions: None,
        metadata: None,
    }
}

/// Run `call`, sleeping through rate limits for a bounded number of
/// attempts. Other API errors fail immediately.
async fn with_rate_limit_retry<T, F, Fut>(what: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, SlackClientError>>,
{
    let mut backoff = INITIAL_RETRY_DELAY;
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(SlackClientError::RateLimitError(rate)) if attempt < MAX_SEND_ATTEMPTS => {
                let delay = rate.retry_after.unwrap_or(backoff).min(MAX_RETRY_DELAY);
                warn!(what, attempt, delay = ?delay, "slack rate limited; retrying");
                sleep(delay).await;
                backoff = (backoff * 2).min(MAX_RETRY_DELAY);
                attempt += 1;
            }
            Err(err) => return Err(AppError::Slack(format!("failed to {what}: {err}"))),
        }
    }
}
