//! Failure classification.
//!
//! # Precedence
//! 1. Transport-failure signature
//! 2. HTTP status / business code
//! 3. Named validation failure
//! 4. Permission-scope signature
//! 5. Generic exception
//! 6. Bare string
//! 7. Unknown
//!
//! Free-text variants (`Exception`, `Message`) are scanned for transport,
//! gateway, validation and permission signatures in the same order before
//! falling through to `Unknown`.

use crate::error::record::{ApiError, ErrorKind};
use crate::transport::TransportError;

/// Everything that can go wrong, tagged at the point where it was observed.
#[derive(Debug, Clone)]
pub enum Failure {
    /// The transport never produced a response.
    Transport(TransportError),
    /// A response arrived but could not be read as a success envelope.
    Http { status: u16, body: String },
    /// A well-formed envelope carrying a non-success code.
    Business { code: i64, message: String },
    /// Input rejected before or after transport.
    Validation { field: Option<String>, message: String },
    /// A platform or account grant is missing.
    Permission { scope: String, message: String },
    /// Description of a caught `std::error::Error`.
    Exception(String),
    /// Free-form text from an ad hoc caller.
    Message(String),
    Unknown,
}

impl From<TransportError> for Failure {
    fn from(err: TransportError) -> Self {
        Failure::Transport(err)
    }
}

impl From<serde_json::Error> for Failure {
    fn from(err: serde_json::Error) -> Self {
        Failure::Validation {
            field: None,
            message: format!("payload could not be decoded: {err}"),
        }
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        Failure::Exception(err.to_string())
    }
}

const TRANSPORT_MARKERS: &[&str] = &[
    "request:fail",
    "timed out",
    "timeout",
    "connection refused",
    "connection reset",
    "connection closed",
    "network is unreachable",
    "dns error",
    "failed to lookup address",
    "no route to host",
];

const GATEWAY_MARKERS: &[&str] = &[
    "bad gateway",
    "gateway timeout",
    "gateway time-out",
    "service unavailable",
    "proxy error",
    "upstream",
    "nginx",
    "cloudflare",
    "openresty",
    "<html",
    "<!doctype",
];

const PERMISSION_MARKERS: &[&str] = &[
    "permission denied",
    "auth deny",
    "authorize:fail",
    "not authorized to access",
    "scope.",
];

const GATEWAY_STATUSES: &[u64] = &[502, 503, 504];

/// Turn a tagged failure into the normalized record.
pub fn classify(failure: Failure) -> ApiError {
    match failure {
        Failure::Transport(err) => classify_transport(err),
        Failure::Http { status, body } => classify_status(status, &body),
        // A proxy error relayed inside a well-formed envelope is still a gateway failure
        Failure::Business { code, message } if is_gateway_signature(&message) => {
            ApiError::backend_unavailable(format!("business code {code} relays gateway failure: {message}"))
                .with_code(code)
        }
        Failure::Business { code, message } => ApiError::business(code, &message),
        Failure::Validation { field, message } => {
            let technical = match &field {
                Some(field) => format!("validation failed on `{field}`: {message}"),
                None => format!("validation failed: {message}"),
            };
            ApiError::validation(technical).with_user_message(message)
        }
        Failure::Permission { scope, message } => {
            ApiError::permission(format!("missing grant `{scope}`: {message}"))
        }
        Failure::Exception(text) => classify_text(&text, "exception"),
        Failure::Message(text) => classify_text(&text, "message"),
        Failure::Unknown => ApiError::unknown("unclassified failure"),
    }
}

fn classify_transport(err: TransportError) -> ApiError {
    match err {
        TransportError::Cancelled => ApiError::cancelled(),
        TransportError::InvalidRequest(reason) => {
            ApiError::validation(format!("request could not be built: {reason}"))
        }
        TransportError::Connection(reason) if is_gateway_signature(&reason) => {
            ApiError::backend_unavailable(format!("gateway failure: {reason}"))
        }
        other => ApiError::network(format!("transport failure: {other}")),
    }
}

/// Classify a response that was not a success envelope.
pub fn classify_status(status: u16, body: &str) -> ApiError {
    let snippet = body_snippet(body);
    let err = match status {
        401 => ApiError::auth(format!("HTTP 401: {snippet}")),
        403 => ApiError::permission(format!("HTTP 403: {snippet}")),
        400 | 422 => ApiError::validation(format!("HTTP {status}: {snippet}")),
        500..=599 => ApiError::backend_unavailable(format!("HTTP {status}: {snippet}")),
        _ if is_gateway_body(body) => {
            ApiError::backend_unavailable(format!("HTTP {status} with gateway body: {snippet}"))
        }
        200..=299 => ApiError::unknown(format!("HTTP {status} without envelope: {snippet}")),
        _ => ApiError::new(ErrorKind::Business, format!("HTTP {status}: {snippet}"))
            .with_code(i64::from(status)),
    };
    err.with_status(status)
}

fn classify_text(text: &str, origin: &str) -> ApiError {
    let lower = text.to_ascii_lowercase();
    if TRANSPORT_MARKERS.iter().any(|m| lower.contains(m)) {
        if is_gateway_signature(text) {
            return ApiError::backend_unavailable(format!("{origin}: {text}"));
        }
        return ApiError::network(format!("{origin}: {text}"));
    }
    if is_gateway_signature(text) {
        return ApiError::backend_unavailable(format!("{origin}: {text}"));
    }
    if lower.contains("validation") || lower.contains("invalid argument") {
        return ApiError::validation(format!("{origin}: {text}"));
    }
    if PERMISSION_MARKERS.iter().any(|m| lower.contains(m)) {
        return ApiError::permission(format!("{origin}: {text}"));
    }
    ApiError::unknown(format!("{origin}: {text}"))
}

/// True when text carries a 502/503/504 status or a gateway/proxy marker.
pub fn is_gateway_signature(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    GATEWAY_MARKERS.iter().any(|m| lower.contains(m))
        || GATEWAY_STATUSES.iter().any(|s| contains_number(text, *s))
}

/// True when a response body is not JSON at all or looks like a proxy page.
pub fn is_gateway_body(body: &str) -> bool {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(trimmed).is_err() && is_gateway_signature(body)
}

/// Whole-number match so "15023" does not count as 502.
fn contains_number(text: &str, wanted: u64) -> bool {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty() && run.len() <= 6)
        .any(|run| run.parse::<u64>().ok() == Some(wanted))
}

fn body_snippet(body: &str) -> String {
    const LIMIT: usize = 160;
    let trimmed = body.trim();
    if trimmed.chars().count() <= LIMIT {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(LIMIT).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::record::ErrorTag;

    #[test]
    fn test_gateway_numbers_are_backend_unavailable() {
        for text in ["upstream said 502", "HTTP 503", "504 Gateway Time-out", "proxy error"] {
            let err = classify(Failure::Message(text.to_string()));
            assert_eq!(err.kind, ErrorKind::Network, "{text}");
            assert_eq!(err.tag, Some(ErrorTag::BackendUnavailable), "{text}");
        }
    }

    #[test]
    fn test_business_message_with_gateway_signature() {
        let err = classify(Failure::Business {
            code: 50002,
            message: "upstream 502 Bad Gateway".into(),
        });
        assert_eq!(err.kind, ErrorKind::Network);
        assert!(err.is_backend_unavailable());
        assert_eq!(err.code, Some(50002));

        let err = classify(Failure::Business {
            code: 40021,
            message: "Coupon already used".into(),
        });
        assert_eq!(err.kind, ErrorKind::Business);
        assert_eq!(err.tag, None);
    }

    #[test]
    fn test_number_inside_larger_number_is_not_gateway() {
        assert!(!is_gateway_signature("order 15023 rejected"));
        assert!(is_gateway_signature("status=502;"));
    }

    #[test]
    fn test_transport_signature_wins_over_permission() {
        let err = classify(Failure::Message("request:fail permission denied".into()));
        assert_eq!(err.kind, ErrorKind::Network);
    }

    #[test]
    fn test_permission_signature() {
        let err = classify(Failure::Exception("getLocation:fail auth deny".into()));
        assert_eq!(err.kind, ErrorKind::Permission);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(classify_status(403, "{}").kind, ErrorKind::Permission);
        assert_eq!(classify_status(422, "{}").kind, ErrorKind::Validation);
        assert_eq!(classify_status(404, "not here").kind, ErrorKind::Business);
        assert_eq!(classify_status(404, "not here").code, Some(404));

        let err = classify_status(500, "oops");
        assert!(err.is_backend_unavailable());
        assert_eq!(err.status, Some(500));

        let err = classify_status(200, "<html><body>nginx</body></html>");
        assert!(err.is_backend_unavailable());
    }

    #[test]
    fn test_transport_variants() {
        assert!(classify(TransportError::Cancelled.into()).is_cancelled());
        assert_eq!(
            classify(TransportError::Timeout.into()).kind,
            ErrorKind::Network
        );
        assert_eq!(
            classify(TransportError::InvalidRequest("bad url".into()).into()).kind,
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_named_validation_keeps_field_in_diagnostics() {
        let err = classify(Failure::Validation {
            field: Some("phone".into()),
            message: "Phone number must have 11 digits".into(),
        });
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("phone"));
        assert_eq!(err.user_message, "Phone number must have 11 digits");
    }

    #[test]
    fn test_fallback_unknown() {
        let err = classify(Failure::Message("something odd".into()));
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_ne!(err.user_message, err.message);
        assert_eq!(classify(Failure::Unknown).kind, ErrorKind::Unknown);
    }
}
