//! Response envelope parsing.
//!
//! The backend wraps every payload as `{code, message, data}` when the
//! envelope header is sent. Anything else is classified by HTTP status.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EnvelopeConfig;
use crate::error::classify::{classify, classify_status, Failure};
use crate::error::ApiError;
use crate::transport::TransportResponse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

/// How the dispatcher should proceed after a response.
#[derive(Debug, Clone)]
pub enum Reply {
    Data(Value),
    /// HTTP 401 or the token-expired business code.
    TokenExpired,
    Failed(ApiError),
}

pub fn interpret(response: &TransportResponse, codes: &EnvelopeConfig) -> Reply {
    let status = response.status;
    if status == 401 {
        return Reply::TokenExpired;
    }
    if status >= 500 {
        return Reply::Failed(classify_status(status, &response.body));
    }

    match serde_json::from_str::<Envelope>(&response.body) {
        Ok(envelope) if envelope.code == codes.success_code => Reply::Data(envelope.data),
        Ok(envelope) if envelope.code == codes.token_expired_code => Reply::TokenExpired,
        Ok(envelope) => Reply::Failed(
            classify(Failure::Business {
                code: envelope.code,
                message: envelope.message,
            })
            .with_status(status),
        ),
        Err(_) => Reply::Failed(classify_status(status, &response.body)),
    }
}
