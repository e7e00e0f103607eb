use crate::models::{ErrorResponse, ReceivedParameters};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

const NETWORK_KEYWORDS: [&str; 8] = [
    "network",
    "timeout",
    "timed out",
    "connect",
    "fetch",
    "dns",
    "abort",
    "unreachable",
];

/// A `/check-payment` request that cannot be processed. Always a 400.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Missing required parameters: address and amount")]
    MissingParameters {
        address: Option<String>,
        amount: Option<String>,
    },

    #[error("Invalid expected amount: {amount}")]
    InvalidAmount { address: String, amount: String },

    #[error("Parameter '{name}' given more than once")]
    DuplicateParameter {
        name: String,
        address: Option<String>,
        amount: Option<String>,
    },

    #[error("Invalid query string: {0}")]
    InvalidQuery(String),
}

impl RequestError {
    fn error_code(&self) -> &'static str {
        match self {
            RequestError::MissingParameters { .. } => "MISSING_PARAMETERS",
            RequestError::InvalidAmount { .. } => "INVALID_AMOUNT",
            RequestError::DuplicateParameter { .. } => "DUPLICATE_PARAMETER",
            RequestError::InvalidQuery(_) => "INVALID_QUERY",
        }
    }

    /// What the caller sent, echoed back for debugging.
    fn received(&self) -> Option<ReceivedParameters> {
        match self {
            RequestError::MissingParameters { address, amount }
            | RequestError::DuplicateParameter {
                address, amount, ..
            } => Some(ReceivedParameters {
                address: address.clone(),
                amount: amount.clone(),
            }),
            RequestError::InvalidAmount { address, amount } => Some(ReceivedParameters {
                address: Some(address.clone()),
                amount: Some(amount.clone()),
            }),
            RequestError::InvalidQuery(_) => None,
        }
    }
}

/// Whether a failure message looks like the explorer could not be reached.
pub fn mentions_network(message: &str) -> bool {
    let message = message.to_lowercase();
    NETWORK_KEYWORDS.iter().any(|k| message.contains(k))
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let error_code = self.error_code();

        let body = ErrorResponse {
            confirmed: false,
            error: self.to_string(),
            error_code: error_code.to_string(),
            timestamp: Utc::now(),
            request_id: Uuid::new_v4().to_string(),
            received: self.received(),
        };

        tracing::warn!(
            error = ?self,
            error_code = error_code,
            "Rejected payment check request"
        );

        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}
