//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

/// Keychain service name that holds runtime credentials.
const KEYRING_SERVICE: &str = "lineup";

/// Slack connectivity for Socket Mode.
///
/// Tokens are loaded at runtime via OS keychain or environment variables,
/// not from the TOML config file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SlackConfig {
    /// App-level token used for Socket Mode (populated at runtime).
    #[serde(skip)]
    pub app_token: String,
    /// Bot user token used for posting messages (populated at runtime).
    #[serde(skip)]
    pub bot_token: String,
}

/// Display timezone. Storage and comparisons always stay in UTC.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DisplayConfig {
    /// Offset of the display zone from UTC, in minutes.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    /// Short label printed after displayed times.
    #[serde(default = "default_zone_label")]
    pub zone_label: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
            zone_label: default_zone_label(),
        }
    }
}

fn default_utc_offset_minutes() -> i32 {
    180
}

fn default_zone_label() -> String {
    "MSK".into()
}

/// Delayed task queue tuning.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// How often the runner looks for due tasks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long a claimed task stays invisible to other runners.
    #[serde(default = "default_lease_seconds")]
    pub lease_seconds: u64,
    /// Attempts before a task is parked as `failed`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay of the exponential retry backoff.
    #[serde(default = "default_retry_base_seconds")]
    pub retry_base_seconds: u64,
    /// Interval of the sweep that re-arms overdue active polls.
    #[serde(default = "default_reconcile_interval_seconds")]
    pub reconcile_interval_seconds: u64,
    /// How long past `ends_at` a poll may stay active before the sweep acts.
    #[serde(default = "default_reconcile_grace_seconds")]
    pub reconcile_grace_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            lease_seconds: default_lease_seconds(),
            max_attempts: default_max_attempts(),
            retry_base_seconds: default_retry_base_seconds(),
            reconcile_interval_seconds: default_reconcile_interval_seconds(),
            reconcile_grace_seconds: default_reconcile_grace_seconds(),
        }
    }
}

impl SchedulerConfig {
    /// Runner tick interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Claim lease length.
    #[must_use]
    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_seconds)
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_lease_seconds() -> u64 {
    60
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_base_seconds() -> u64 {
    5
}

fn default_reconcile_interval_seconds() -> u64 {
    60
}

fn default_reconcile_grace_seconds() -> u64 {
    30
}

/// Creation wizard settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WizardConfig {
    /// Idle time after which an unfinished wizard session is discarded.
    #[serde(default = "default_session_ttl_seconds")]
    pub session_ttl_seconds: u64,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: default_session_ttl_seconds(),
        }
    }
}

fn default_session_ttl_seconds() -> u64 {
    1800
}

/// LLM-backed intent resolver settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct IntentConfig {
    /// Whether the LLM resolver is used at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Chat-completions endpoint.
    #[serde(default = "default_intent_endpoint")]
    pub endpoint: String,
    /// Model name sent with each request.
    #[serde(default = "default_intent_model")]
    pub model: String,
    /// Per-request timeout.
    #[serde(default = "default_intent_timeout_seconds")]
    pub timeout_seconds: u64,
    /// API key (populated at runtime).
    #[serde(skip)]
    pub api_key: String,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_intent_endpoint(),
            model: default_intent_model(),
            timeout_seconds: default_intent_timeout_seconds(),
            api_key: String::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_intent_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}

fn default_intent_model() -> String {
    "gpt-4o-mini".into()
}

fn default_intent_timeout_seconds() -> u64 {
    20
}

fn default_http_port() -> u16 {
    8080
}

fn default_retention_days() -> u32 {
    30
}

fn default_shutdown_grace_seconds() -> u64 {
    10
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// `SQLite` database file.
    pub db_path: PathBuf,
    /// Port of the HTTP health endpoint.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Days after a poll ends before its records are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Grace period for in-flight work on shutdown.
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
    /// Slack connectivity settings.
    #[serde(default)]
    pub slack: SlackConfig,
    /// Display timezone.
    #[serde(default)]
    pub display: DisplayConfig,
    /// Delayed task queue tuning.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Creation wizard settings.
    #[serde(default)]
    pub wizard: WizardConfig,
    /// Intent resolver settings.
    #[serde(default)]
    pub intent: IntentConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load Slack and resolver credentials from OS keychain with env-var fallback.
    ///
    /// A missing resolver key only disables the LLM resolver; missing Slack
    /// tokens are fatal.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if neither keychain nor env vars provide
    /// the Slack tokens.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.slack.app_token = load_credential("slack_app_token", "SLACK_APP_TOKEN").await?;
        self.slack.bot_token = load_credential("slack_bot_token", "SLACK_BOT_TOKEN").await?;

        if self.intent.enabled {
            match load_credential("intent_api_key", "OPENAI_API_KEY").await {
                Ok(key) => self.intent.api_key = key,
                Err(err) => {
                    warn!(%err, "intent resolver key missing; falling back to literal parsing");
                    self.intent.enabled = false;
                }
            }
        }
        Ok(())
    }

    /// Shutdown grace period.
    #[must_use]
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }

    /// Idle lifetime of wizard sessions.
    #[must_use]
    pub fn wizard_ttl(&self) -> Duration {
        Duration::from_secs(self.wizard.session_ttl_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.scheduler.max_attempts == 0 {
            return Err(AppError::Config(
                "scheduler.max_attempts must be greater than zero".into(),
            ));
        }

        if self.scheduler.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "scheduler.poll_interval_ms must be greater than zero".into(),
            ));
        }

        if self.display.utc_offset_minutes.abs() > 14 * 60 {
            return Err(AppError::Config(
                "display.utc_offset_minutes must be within ±840".into(),
            ));
        }

        if self.wizard.session_ttl_seconds == 0 {
            return Err(AppError::Config(
                "wizard.session_ttl_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    env::var(env_key).map_err(|_| {
        AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))
    })
}
