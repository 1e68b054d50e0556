//! Configuration validation

use crate::schema::RawConfig;
use crate::DEFAULT_EMERGENCY_LOCKOUT_MINUTES;
use hostguard_util::{normalize_path, Domain};
use std::collections::HashSet;
use std::net::IpAddr;
use thiserror::Error;

/// Allowed range for the enforcement tick, in seconds
pub const TICK_INTERVAL_RANGE: (u64, u64) = (5, 3600);

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Default block '{domain}': {message}")]
    InvalidDomain { domain: String, message: String },

    #[error("Default block '{domain}' lists '{normalized}' more than once")]
    DuplicateDomain { domain: String, normalized: String },

    #[error("Default block '{domain}': invalid path '{path}'")]
    InvalidPath { domain: String, path: String },

    #[error("Invalid redirect_ip '{0}'")]
    InvalidRedirectIp(String),

    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("Session config error: {0}")]
    SessionError(String),
}

/// Validate a raw configuration, collecting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(ip) = &config.enforcement.redirect_ip
        && ip.parse::<IpAddr>().is_err()
    {
        errors.push(ValidationError::InvalidRedirectIp(ip.clone()));
    }

    if let Some(secs) = config.enforcement.tick_interval_seconds {
        let (min, max) = TICK_INTERVAL_RANGE;
        if !(min..=max).contains(&secs) {
            errors.push(ValidationError::OutOfRange {
                field: "enforcement.tick_interval_seconds",
                value: secs,
                min,
                max,
            });
        }
    }

    if let Some(secs) = config.enforcement.display_interval_seconds
        && !(1..=60).contains(&secs)
    {
        errors.push(ValidationError::OutOfRange {
            field: "enforcement.display_interval_seconds",
            value: secs,
            min: 1,
            max: 60,
        });
    }

    errors.extend(validate_session(config));

    if let Some(blocks) = &config.default_blocks {
        errors.extend(validate_default_blocks(blocks.iter()));
    }

    errors
}

fn validate_session(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let session = &config.session;

    if session.max_duration_hours == Some(0) {
        errors.push(ValidationError::SessionError(
            "max_duration_hours must be greater than zero".into(),
        ));
    }

    // A lockout at least as long as the longest session would make the
    // override unreachable.
    let lockout = session
        .emergency_lockout_minutes
        .unwrap_or(DEFAULT_EMERGENCY_LOCKOUT_MINUTES);
    if let Some(max_hours) = session.max_duration_hours
        && max_hours > 0
        && lockout >= max_hours.saturating_mul(60)
    {
        errors.push(ValidationError::SessionError(format!(
            "emergency_lockout_minutes ({}) must be shorter than max_duration_hours ({}h)",
            lockout, max_hours
        )));
    }

    errors
}

fn validate_default_blocks<'a>(
    blocks: impl Iterator<Item = (&'a String, &'a Vec<String>)>,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for (domain, paths) in blocks {
        match Domain::parse(domain) {
            Ok(normalized) => {
                // "YouTube.com" and "youtube.com" are distinct TOML keys
                if !seen.insert(normalized.clone()) {
                    errors.push(ValidationError::DuplicateDomain {
                        domain: domain.clone(),
                        normalized: normalized.to_string(),
                    });
                }
            }
            Err(e) => errors.push(ValidationError::InvalidDomain {
                domain: domain.clone(),
                message: e.to_string(),
            }),
        }

        for path in paths {
            if normalize_path(path).is_none() || path.chars().any(char::is_whitespace) {
                errors.push(ValidationError::InvalidPath {
                    domain: domain.clone(),
                    path: path.clone(),
                });
            }
        }
    }

    errors
}
