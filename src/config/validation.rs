//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, delays ordered)
//! - Check that URLs and addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::ClientConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.api.base_url.trim().is_empty() {
        errors.push(ValidationError::new("api.base_url", "must not be empty"));
    } else if let Err(e) = Url::parse(&config.api.base_url) {
        errors.push(ValidationError::new("api.base_url", e.to_string()));
    }

    if config.api.envelope_header.trim().is_empty() {
        errors.push(ValidationError::new("api.envelope_header", "must not be empty"));
    }

    if config.api.request_timeout_secs == Some(0) {
        errors.push(ValidationError::new(
            "api.request_timeout_secs",
            "must be greater than zero when set",
        ));
    }

    if config.envelope.success_code == config.envelope.token_expired_code {
        errors.push(ValidationError::new(
            "envelope.token_expired_code",
            "must differ from success_code",
        ));
    }

    if config.retry.base_delay_ms > config.retry.max_delay_ms {
        errors.push(ValidationError::new(
            "retry.base_delay_ms",
            "must not exceed max_delay_ms",
        ));
    }

    if config.cache.purge_interval_secs == 0 {
        errors.push(ValidationError::new("cache.purge_interval_secs", "must be greater than zero"));
    }

    if config.lifecycle.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "lifecycle.sweep_interval_secs",
            "must be greater than zero",
        ));
    }

    if config.lifecycle.stale_task_secs == 0 {
        errors.push(ValidationError::new("lifecycle.stale_task_secs", "must be greater than zero"));
    }

    if config.network.probe_enabled {
        if config.network.probe_interval_secs == 0 {
            errors.push(ValidationError::new(
                "network.probe_interval_secs",
                "must be greater than zero",
            ));
        }
        if config.network.probe_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "network.probe_timeout_secs",
                "must be greater than zero",
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
