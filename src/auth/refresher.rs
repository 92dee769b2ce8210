//! The refresh-endpoint call.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::credentials::TokenSet;
use crate::config::EnvelopeConfig;
use crate::dispatch::envelope::Envelope;
use crate::error::ApiError;
use crate::transport::{Method, RequestBody, Transport, TransportRequest};

/// Exchanges a refresh token for a new token set.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, ApiError>;
}

#[derive(Debug, Deserialize)]
struct RefreshPayload {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: u64,
}

/// POSTs `{"refresh_token": ..}` to the refresh endpoint and reads the
/// enveloped `{access_token, refresh_token, expires_in}` payload.
///
/// Goes straight to the transport so a refresh can never trigger another.
pub struct HttpTokenRefresher {
    transport: Arc<dyn Transport>,
    url: String,
    envelope: EnvelopeConfig,
    envelope_header: (String, String),
}

impl HttpTokenRefresher {
    pub fn new(
        transport: Arc<dyn Transport>,
        url: impl Into<String>,
        envelope: EnvelopeConfig,
        envelope_header: (String, String),
    ) -> Self {
        Self {
            transport,
            url: url.into(),
            envelope,
            envelope_header,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, ApiError> {
        let request = TransportRequest {
            method: Method::Post,
            url: self.url.clone(),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                self.envelope_header.clone(),
            ],
            body: RequestBody::Json(json!({ "refresh_token": refresh_token })),
        };

        let response = self.transport.send(request).await.map_err(|e| {
            ApiError::auth("token refresh request failed").with_cause(e.to_string())
        })?;

        if !(200..300).contains(&response.status) {
            return Err(ApiError::auth(format!(
                "token refresh rejected with HTTP {}",
                response.status
            ))
            .with_status(response.status));
        }

        let envelope: Envelope = serde_json::from_str(&response.body).map_err(|e| {
            ApiError::auth("token refresh returned an unreadable body").with_cause(e.to_string())
        })?;
        if envelope.code != self.envelope.success_code {
            return Err(ApiError::auth(format!(
                "token refresh rejected with code {}: {}",
                envelope.code, envelope.message
            ))
            .with_code(envelope.code));
        }

        let payload: RefreshPayload = serde_json::from_value(envelope.data).map_err(|e| {
            ApiError::auth("token refresh payload is malformed").with_cause(e.to_string())
        })?;

        Ok(TokenSet::new(
            payload.access_token,
            payload.refresh_token,
            payload.expires_in,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::{TransportError, TransportResponse};
    use std::sync::Mutex;

    struct OneShot {
        reply: Result<TransportResponse, TransportError>,
        seen: Mutex<Vec<TransportRequest>>,
    }

    #[async_trait]
    impl Transport for OneShot {
        async fn send(
            &self,
            request: TransportRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            self.reply.clone()
        }
    }

    fn build_refresher(reply: Result<TransportResponse, TransportError>) -> (Arc<OneShot>, HttpTokenRefresher) {
        let transport = Arc::new(OneShot {
            reply,
            seen: Mutex::new(Vec::new()),
        });
        let refresher = HttpTokenRefresher::new(
            transport.clone(),
            "https://api.test/v1/auth/refresh",
            EnvelopeConfig::default(),
            ("X-Response-Envelope".into(), "1".into()),
        );
        (transport, refresher)
    }

    #[tokio::test]
    async fn test_successful_refresh() {
        let body = r#"{"code":200,"message":"ok","data":{"access_token":"new","refresh_token":"r2","expires_in":3600}}"#;
        let (transport, refresher) = build_refresher(Ok(TransportResponse {
            status: 200,
            body: body.into(),
        }));

        let tokens = refresher.refresh("r1").await.unwrap();
        assert_eq!(tokens.access_token, "new");
        assert_eq!(tokens.refresh_token.as_deref(), Some("r2"));

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].method, Method::Post);
        assert_eq!(seen[0].body, RequestBody::Json(json!({"refresh_token": "r1"})));
        assert!(seen[0].header("authorization").is_none());
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_auth_error() {
        let body = r#"{"code":40102,"message":"refresh token revoked","data":null}"#;
        let (_, refresher) = build_refresher(Ok(TransportResponse {
            status: 200,
            body: body.into(),
        }));
        let err = refresher.refresh("r1").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert_eq!(err.code, Some(40102));

        let (_, refresher) = refresher_with_error();
        let err = refresher.refresh("r1").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        assert!(err.cause.is_some());
    }

    fn refresher_with_error() -> (Arc<OneShot>, HttpTokenRefresher) {
        build_refresher(Err(TransportError::Timeout))
    }
}
