//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (durations > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Settings → Result<(), Vec<ValidationError>>
//! - Runs before settings are accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::Settings;

/// Browsers clamp cookie lifetimes to 400 days.
pub const MAX_SESSION_DURATION_SECONDS: u64 = 400 * 24 * 60 * 60;

/// A single semantic problem found in the settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("server.name must not be empty")]
    EmptyServerName,

    #[error("server.session_duration_seconds must be greater than zero")]
    ZeroSessionDuration,

    #[error("server.session_duration_seconds ({seconds}) exceeds {max}")]
    SessionDurationTooLong { seconds: u64, max: u64 },

    #[error("server.body_limit_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("database.url must not be empty")]
    EmptyDatabaseHost,

    #[error("database.collection must not be empty")]
    EmptyCollection,

    #[error("database.retry_base_delay_ms ({base}) exceeds retry_max_delay_ms ({max})")]
    RetryDelaysOutOfOrder { base: u64, max: u64 },

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check settings for semantic problems.
pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.server.name.trim().is_empty() {
        errors.push(ValidationError::EmptyServerName);
    }
    if settings.server.session_duration_seconds == 0 {
        errors.push(ValidationError::ZeroSessionDuration);
    }
    if settings.server.session_duration_seconds > MAX_SESSION_DURATION_SECONDS {
        errors.push(ValidationError::SessionDurationTooLong {
            seconds: settings.server.session_duration_seconds,
            max: MAX_SESSION_DURATION_SECONDS,
        });
    }
    if settings.server.body_limit_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if settings.database.url.trim().is_empty() {
        errors.push(ValidationError::EmptyDatabaseHost);
    }
    if settings.database.collection.trim().is_empty() {
        errors.push(ValidationError::EmptyCollection);
    }

    let (base, max) = (
        settings.database.retry_base_delay_ms,
        settings.database.retry_max_delay_ms,
    );
    if base > max {
        errors.push(ValidationError::RetryDelaysOutOfOrder { base, max });
    }

    if settings.observability.metrics_enabled
        && settings
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            settings.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
