use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub explorer_endpoints: usize,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// Body returned when the request itself is unusable.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub confirmed: bool,
    pub error: String,
    pub error_code: String,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<ReceivedParameters>,
}

/// Echo of the query parameters that arrived, for client-side debugging.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReceivedParameters {
    pub address: Option<String>,
    pub amount: Option<String>,
}
