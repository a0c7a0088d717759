//! The single boundary where UTC instants become human-readable text.
//!
//! Everything else in the crate stores and compares `DateTime<Utc>`.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

use crate::config::DisplayConfig;
use crate::{AppError, Result};

/// Display timezone derived from configuration.
#[derive(Debug, Clone)]
pub struct DisplayZone {
    offset: FixedOffset,
    label: String,
}

impl DisplayZone {
    /// Build a zone from the `[display]` config section.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the offset is out of range.
    pub fn from_config(config: &DisplayConfig) -> Result<Self> {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            AppError::Config(format!(
                "invalid display offset: {} minutes",
                config.utc_offset_minutes
            ))
        })?;
        Ok(Self {
            offset,
            label: config.zone_label.clone(),
        })
    }

    /// Zone used when nothing is configured (UTC+3, "MSK").
    #[must_use]
    pub fn moscow() -> Self {
        Self {
            offset: FixedOffset::east_opt(3 * 3600).unwrap_or_else(|| Utc.fix()),
            label: "MSK".into(),
        }
    }

    /// `HH:MM DD.MM.YYYY MSK`
    #[must_use]
    pub fn format_instant(&self, at: DateTime<Utc>) -> String {
        format!(
            "{} {}",
            at.with_timezone(&self.offset).format("%H:%M %d.%m.%Y"),
            self.label
        )
    }

    /// `HH:MM` in the display zone.
    #[must_use]
    pub fn format_short(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).format("%H:%M").to_string()
    }

    /// Current wall-clock time in the display zone, for resolver prompts.
    #[must_use]
    pub fn now_local(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    /// Parse an end-time string into a UTC instant.
    ///
    /// Accepts RFC 3339 with an explicit offset, or a naive
    /// `YYYY-MM-DDTHH:MM[:SS]` interpreted in the display zone.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` when the string matches neither form.
    pub fn parse_end_time(&self, raw: &str) -> Result<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Ok(at.with_timezone(&Utc));
        }
        for pattern in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
                if let Some(local) = self.offset.from_local_datetime(&naive).single() {
                    return Ok(local.with_timezone(&Utc));
                }
            }
        }
        Err(AppError::Validation(format!(
            "cannot read end time `{raw}`; expected e.g. 2024-01-15T13:48:00+03:00"
        )))
    }
}

/// Human-readable duration such as `1 h 30 min`.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.as_secs() / 60;
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days} d"));
    }
    if hours > 0 {
        parts.push(format!("{hours} h"));
    }
    if minutes > 0 || parts.is_empty() {
        parts.push(format!("{minutes} min"));
    }
    parts.join(" ")
}
