use super::explorer::NormalizedTransaction;
use chrono::Utc;
use serde::Serialize;

/// Upper bound on transactions echoed back to the caller.
pub const MAX_REPORTED_TRANSACTIONS: usize = 10;

const EXPLORER_UI: &str = "https://bscscan.com";

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub confirmed: bool,
    pub balance: f64,
    pub transactions: Vec<TransactionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_mode: Option<bool>,
    pub api_status: ApiStatus,
    pub debug_info: DebugInfo,
}

/// A normalized transaction as reported to the caller, without the match flags.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: f64,
    pub timestamp: String,
    pub confirmations: u64,
    pub block_number: u64,
}

impl From<&NormalizedTransaction> for TransactionSummary {
    fn from(tx: &NormalizedTransaction) -> Self {
        Self {
            hash: tx.hash.clone(),
            from: tx.from.clone(),
            to: tx.to.clone(),
            value: tx.value,
            timestamp: tx.timestamp.clone(),
            confirmations: tx.confirmations,
            block_number: tx.block_number,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ApiStatus {
    pub status: String,
    pub message: String,
    pub result: serde_json::Value,
}

impl ApiStatus {
    pub fn unavailable(last_error: Option<&str>) -> Self {
        Self {
            status: "0".to_string(),
            message: "Explorer API unavailable".to_string(),
            result: last_error
                .map(|e| serde_json::Value::String(e.to_string()))
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Where the reported `balance` came from.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BalanceSource {
    /// Sum of recent transfers into the address.
    Transfers,
    /// The explorer's token balance query.
    Explorer,
}

#[derive(Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum DebugInfo {
    Verified(VerifiedDebug),
    Manual(ManualDebug),
    Failure(FailureDebug),
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedDebug {
    pub working_endpoint: String,
    pub timestamp: String,
    pub requested_address: String,
    pub contract_address: String,
    pub expected_amount: f64,
    pub total_transactions: usize,
    pub skipped_transactions: usize,
    pub matching_transactions: Vec<NormalizedTransaction>,
    pub transfer_balance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_balance: Option<f64>,
    pub balance_source: BalanceSource,
    pub endpoint_errors: Vec<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ManualDebug {
    pub reason: String,
    pub endpoint_errors: Vec<String>,
    pub timestamp: String,
    #[serde(flatten)]
    pub fallback: ManualFallback,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FailureDebug {
    pub error: String,
    pub error_chain: Vec<String>,
    pub network_error: bool,
    pub timestamp: String,
    #[serde(flatten)]
    pub fallback: ManualFallback,
}

/// Directions for checking the payment by hand on the explorer website.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ManualFallback {
    pub manual_verification_url: String,
    pub instructions: Vec<String>,
}

impl ManualFallback {
    pub fn new(contract: &str, address: &str, expected_amount: &str) -> Self {
        Self {
            manual_verification_url: format!("{}/token/{}?a={}", EXPLORER_UI, contract, address),
            instructions: vec![
                "Open the manual verification URL in a browser".to_string(),
                format!(
                    "Look for an incoming USDT (BEP-20) transfer of {} to {}",
                    expected_amount, address
                ),
                "Check that the transfer arrived within the last hour".to_string(),
                "Confirm the transaction status is Success and has confirmations".to_string(),
                "If it matches, treat the payment as received".to_string(),
            ],
        }
    }
}

impl VerificationReport {
    /// Every explorer endpoint failed; the caller has to verify by hand.
    pub fn manual(
        contract: &str,
        address: &str,
        expected_amount: &str,
        endpoint_errors: Vec<String>,
    ) -> Self {
        let last_error = endpoint_errors.last().cloned();

        Self {
            confirmed: false,
            balance: 0.0,
            transactions: Vec::new(),
            manual_mode: Some(true),
            api_status: ApiStatus::unavailable(last_error.as_deref()),
            debug_info: DebugInfo::Manual(ManualDebug {
                reason: "All explorer endpoints failed".to_string(),
                endpoint_errors,
                timestamp: now_iso(),
                fallback: ManualFallback::new(contract, address, expected_amount),
            }),
        }
    }

    /// The pipeline itself failed. `manualMode` is only raised for network failures.
    pub fn failure(
        contract: &str,
        address: &str,
        expected_amount: &str,
        error: String,
        error_chain: Vec<String>,
        network_error: bool,
    ) -> Self {
        Self {
            confirmed: false,
            balance: 0.0,
            transactions: Vec::new(),
            manual_mode: Some(network_error),
            api_status: ApiStatus {
                status: "0".to_string(),
                message: "Payment check failed".to_string(),
                result: serde_json::Value::String(error.clone()),
            },
            debug_info: DebugInfo::Failure(FailureDebug {
                error,
                error_chain,
                network_error,
                timestamp: now_iso(),
                fallback: ManualFallback::new(contract, address, expected_amount),
            }),
        }
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
