//! Time utilities for hostguard
//!
//! Session boundaries are absolute UTC timestamps so they survive restarts.
//! Every component reads the clock through [`now`].
//!
//! # Mock Time for Development
//!
//! In debug builds, the `HOSTGUARD_MOCK_TIME` environment variable can be set
//! to shift the clock, which makes it practical to watch a multi-day session
//! expire. Format: `YYYY-MM-DD HH:MM:SS` in local time.
//!
//! ```bash
//! HOSTGUARD_MOCK_TIME="2025-12-25 14:30:00" hostguardd
//! ```

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "HOSTGUARD_MOCK_TIME";

const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)]
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            let mock_time_str = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
            let Ok(naive_dt) = NaiveDateTime::parse_from_str(&mock_time_str, MOCK_TIME_FORMAT)
            else {
                tracing::warn!(
                    mock_time = %mock_time_str,
                    expected_format = MOCK_TIME_FORMAT,
                    "Invalid mock time format"
                );
                return None;
            };
            let Some(mock_dt) = Local.from_local_datetime(&naive_dt).single() else {
                tracing::warn!(mock_time = %mock_time_str, "Mock time is ambiguous in local timezone");
                return None;
            };
            let offset = mock_dt.with_timezone(&Utc).signed_duration_since(Utc::now());
            tracing::info!(
                mock_time = %mock_time_str,
                offset_secs = offset.num_seconds(),
                "Mock time enabled"
            );
            Some(offset)
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Current UTC time, shifted by `HOSTGUARD_MOCK_TIME` in debug builds.
#[allow(clippy::disallowed_methods)]
pub fn now() -> DateTime<Utc> {
    let real_now = Utc::now();
    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Format a timestamp in the local timezone for display.
pub fn format_local(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Convert a std duration into a chrono duration, saturating on overflow.
pub fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

/// Duration from `earlier` to `later`, or zero if `later` is not after `earlier`.
pub fn saturating_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> Duration {
    (later - earlier).to_std().unwrap_or(Duration::ZERO)
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Errors from [`parse_duration`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationParseError {
    #[error("duration is empty")]
    Empty,

    #[error("missing unit after '{0}' (use s, m, h, d or w)")]
    MissingUnit(String),

    #[error("unknown duration unit '{0}'")]
    UnknownUnit(char),

    #[error("expected a number before '{0}'")]
    MissingNumber(char),

    #[error("duration is too large")]
    Overflow,
}

/// Parse durations such as `45m`, `2h`, `7d`, `1w` or `1d12h`.
///
/// A bare number is a count of days.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(DurationParseError::Empty);
    }

    let mut total: u64 = 0;
    let mut number = String::new();

    for ch in input.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }

        let unit_secs = match ch.to_ascii_lowercase() {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86_400,
            'w' => 604_800,
            other => return Err(DurationParseError::UnknownUnit(other)),
        };
        if number.is_empty() {
            return Err(DurationParseError::MissingNumber(ch));
        }
        let value: u64 = number.parse().map_err(|_| DurationParseError::Overflow)?;
        total = value
            .checked_mul(unit_secs)
            .and_then(|secs| total.checked_add(secs))
            .ok_or(DurationParseError::Overflow)?;
        number.clear();
    }

    if !number.is_empty() {
        // A plain number means days; a trailing number after other units does not
        if total != 0 || number.len() != input.len() {
            return Err(DurationParseError::MissingUnit(number));
        }
        let days: u64 = number.parse().map_err(|_| DurationParseError::Overflow)?;
        total = days.checked_mul(86_400).ok_or(DurationParseError::Overflow)?;
    }

    Ok(Duration::from_secs(total))
}
