//! reqwest-backed transport.

use async_trait::async_trait;
use std::time::Duration;

use crate::transport::{
    MultipartUpload, RequestBody, Transport, TransportError, TransportRequest, TransportResponse,
};

/// Production transport over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport, optionally with a whole-request timeout.
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("client setup failed: {e}")))?;
        Ok(Self { client })
    }

    /// Wrap an existing client (shared pools, custom TLS).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn multipart_form(
        upload: &MultipartUpload,
    ) -> Result<reqwest::multipart::Form, TransportError> {
        let bytes = tokio::fs::read(&upload.file_path).await.map_err(|e| {
            TransportError::InvalidRequest(format!(
                "cannot read upload file {}: {e}",
                upload.file_path.display()
            ))
        })?;
        let file_name = upload
            .file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let mut form = reqwest::multipart::Form::new()
            .part(upload.field.clone(), reqwest::multipart::Part::bytes(bytes).file_name(file_name));
        for (key, value) in &upload.fields {
            form = form.text(key.clone(), value.clone());
        }
        Ok(form)
    }
}

fn to_reqwest_method(method: crate::transport::Method) -> reqwest::Method {
    use crate::transport::Method;
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let multipart = matches!(request.body, RequestBody::Multipart(_));
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.url);

        for (name, value) in &request.headers {
            // reqwest writes its own boundary-bearing content type for forms
            if multipart && name.eq_ignore_ascii_case("content-type") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => {
                let bytes = serde_json::to_vec(value)
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                builder.body(bytes)
            }
            RequestBody::Multipart(upload) => builder.multipart(Self::multipart_form(upload).await?),
        };

        tracing::trace!(method = %request.method, url = %request.url, "Sending request");

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(TransportResponse { status, body })
    }
}
