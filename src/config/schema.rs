//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the resilient client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend location and request framing.
    pub api: ApiConfig,

    /// Response envelope codes.
    pub envelope: EnvelopeConfig,

    /// Default retry policy for calls that opt in.
    pub retry: RetryConfig,

    /// Response cache settings.
    pub cache: CacheConfig,

    /// Token refresh settings.
    pub auth: AuthConfig,

    /// In-flight task tracking.
    pub lifecycle: LifecycleConfig,

    /// Connectivity probing.
    pub network: NetworkConfig,

    /// Error presentation.
    pub errors: ErrorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Backend location and request framing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL joined with relative request paths.
    pub base_url: String,

    /// Header asking the backend for the `{code, message, data}` envelope.
    pub envelope_header: String,

    pub envelope_header_value: String,

    /// Whole-request timeout applied by the transport.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            envelope_header: "X-Response-Envelope".to_string(),
            envelope_header_value: "1".to_string(),
            request_timeout_secs: Some(30),
        }
    }
}

impl ApiConfig {
    pub fn envelope_header_pair(&self) -> (String, String) {
        (
            self.envelope_header.clone(),
            self.envelope_header_value.clone(),
        )
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Codes carried in the response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    pub success_code: i64,

    /// Business code meaning "access token expired".
    pub token_expired_code: i64,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            success_code: 200,
            token_expired_code: 401,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff (milliseconds).
    pub base_delay_ms: u64,

    /// Maximum delay between retries (milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// TTL used by `RequestDescriptor::cached_default`.
    pub default_ttl_secs: u64,

    /// How often the maintenance task purges expired entries.
    pub purge_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 300,
            purge_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Refresh endpoint, relative to `api.base_url` unless absolute.
    pub refresh_path: String,

    /// Refresh proactively when the token expires within this window.
    pub refresh_threshold_secs: u64,

    /// Persist tokens to this JSON file; in-memory when unset.
    pub credentials_path: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_path: "/v1/auth/refresh".to_string(),
            refresh_threshold_secs: 300,
            credentials_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Tasks older than this are cancelled by the sweeper.
    pub stale_task_secs: u64,

    pub sweep_interval_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            stale_task_secs: 30,
            sweep_interval_secs: 10,
        }
    }
}

/// Connectivity probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Run the background probe. Hosts with platform events leave this off
    /// and push state changes themselves.
    pub probe_enabled: bool,

    /// Probe URL, relative to `api.base_url` unless absolute.
    pub probe_url: String,

    pub probe_interval_secs: u64,

    pub probe_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_enabled: false,
            probe_url: "/health".to_string(),
            probe_interval_secs: 15,
            probe_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ErrorsConfig {
    /// Ask the host to show its login screen after an auth failure.
    pub redirect_on_auth_failure: bool,

    /// Identical toasts within this window are shown once.
    pub toast_dedup_ms: u64,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            redirect_on_auth_failure: true,
            toast_dedup_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics server bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
