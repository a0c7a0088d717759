//! Compact duration literals: `45m`, `1h30m`, `2d`, `90s`.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::{AppError, Result};

const DURATION_PATTERN: &str = r"(?i)^(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$";

static DURATION_RE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();

fn duration_regex() -> Result<&'static Regex> {
    DURATION_RE
        .get_or_init(|| Regex::new(DURATION_PATTERN))
        .as_ref()
        .map_err(|err| AppError::Config(format!("duration pattern: {err}")))
}

/// Parse a duration literal. Units must appear in `d h m s` order, each at
/// most once.
///
/// # Errors
///
/// Returns `AppError::Validation` for anything else, including the empty
/// string and values that overflow.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let invalid = || {
        AppError::Validation(format!(
            "cannot read duration `{raw}`; use forms like 45m, 1h30m or 2d"
        ))
    };
    if raw.is_empty() {
        return Err(invalid());
    }

    let captures = duration_regex()?.captures(raw).ok_or_else(invalid)?;

    let mut total: u64 = 0;
    for (group, unit_seconds) in [(1, 86_400_u64), (2, 3_600), (3, 60), (4, 1)] {
        if let Some(value) = captures.get(group) {
            let value: u64 = value.as_str().parse().map_err(|_| invalid())?;
            total = value
                .checked_mul(unit_seconds)
                .and_then(|secs| total.checked_add(secs))
                .ok_or_else(invalid)?;
        }
    }
    Ok(Duration::from_secs(total))
}

/// Canonical literal for a duration, e.g. `1h30m`.
#[must_use]
pub fn format_duration_literal(duration: Duration) -> String {
    let secs = duration.as_secs();
    let parts = [
        (secs / 86_400, 'd'),
        ((secs / 3_600) % 24, 'h'),
        ((secs / 60) % 60, 'm'),
        (secs % 60, 's'),
    ];
    let literal: String = parts
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect();
    if literal.is_empty() {
        "0m".to_owned()
    } else {
        literal
    }
}
