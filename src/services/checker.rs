use crate::{
    config::{CheckerConfig, Config},
    error::RequestError,
    models::*,
    services::explorer::{build_http_client, BscScanClient, ExplorerError, ExplorerProvider},
};
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::timeout;

/// A validated `/check-payment` request.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub address: String,
    /// The amount exactly as the caller sent it, used in manual instructions.
    pub amount: String,
    pub expected_amount: f64,
}

impl PaymentRequest {
    pub fn new(address: Option<String>, amount: Option<String>) -> Result<Self, RequestError> {
        let address = address.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
        let amount = amount.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());

        let (Some(address), Some(amount)) = (address.clone(), amount.clone()) else {
            return Err(RequestError::MissingParameters { address, amount });
        };

        let expected_amount = amount
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| RequestError::InvalidAmount {
                address: address.clone(),
                amount: amount.clone(),
            })?;

        Ok(Self {
            address,
            amount,
            expected_amount,
        })
    }
}

/// The first explorer that produced a parsed transfer history.
struct WorkingEndpoint {
    provider: Arc<dyn ExplorerProvider>,
    response: ExplorerResponse,
    errors: Vec<String>,
}

#[derive(Default)]
struct TransferScan {
    total: usize,
    skipped: usize,
    normalized: Vec<NormalizedTransaction>,
}

pub struct PaymentChecker {
    providers: Vec<Arc<dyn ExplorerProvider>>,
    config: CheckerConfig,
}

impl PaymentChecker {
    pub fn new(providers: Vec<Arc<dyn ExplorerProvider>>, config: CheckerConfig) -> Self {
        Self { providers, config }
    }

    /// One BscScan client per configured endpoint, in configured order.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_http_client().context("Failed to build explorer HTTP client")?;

        let providers = config
            .explorer_endpoints
            .iter()
            .map(|endpoint| {
                Arc::new(BscScanClient::new(
                    endpoint.clone(),
                    config.explorer_api_key.clone(),
                    client.clone(),
                )) as Arc<dyn ExplorerProvider>
            })
            .collect();

        Ok(Self::new(providers, config.checker_config()))
    }

    pub fn contract_address(&self) -> &str {
        &self.config.contract_address
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Runs one payment check. Upstream failures never escape: they end in a
    /// manual-mode report or leave the transfer-derived balance in place.
    pub async fn check(&self, request: &PaymentRequest) -> VerificationReport {
        let contract = self.config.contract_address.as_str();

        let working = match self.first_available(&request.address).await {
            Ok(working) => working,
            Err(errors) => {
                tracing::warn!(
                    "All {} explorer endpoints failed for {}, falling back to manual verification",
                    self.providers.len(),
                    request.address
                );
                return VerificationReport::manual(
                    contract,
                    &request.address,
                    &request.amount,
                    errors,
                );
            }
        };

        let criteria = MatchCriteria {
            address: request.address.clone(),
            expected_amount: request.expected_amount,
            now: Utc::now(),
        };
        let scan = scan_transfers(&working.response, &criteria);

        let matching: Vec<NormalizedTransaction> = scan
            .normalized
            .iter()
            .filter(|tx| tx.is_match())
            .cloned()
            .collect();

        // `Sum for f64` starts from -0.0, which would serialize as "-0.0".
        let transfer_balance = scan
            .normalized
            .iter()
            .filter(|tx| tx.is_to_address)
            .fold(0.0, |acc, tx| acc + tx.value);

        let explorer_balance = self
            .explorer_balance(working.provider.as_ref(), &request.address)
            .await;

        let (balance, balance_source) = match explorer_balance {
            Some(balance) => (balance, BalanceSource::Explorer),
            None => (transfer_balance, BalanceSource::Transfers),
        };

        let confirmed = !matching.is_empty();

        tracing::info!(
            "Payment check for {}: confirmed={} ({} matching of {} transfers), balance={} via {:?}",
            request.address,
            confirmed,
            matching.len(),
            scan.normalized.len(),
            balance,
            balance_source
        );

        VerificationReport {
            confirmed,
            balance,
            transactions: scan
                .normalized
                .iter()
                .take(MAX_REPORTED_TRANSACTIONS)
                .map(TransactionSummary::from)
                .collect(),
            manual_mode: None,
            api_status: api_status(&working.response),
            debug_info: DebugInfo::Verified(VerifiedDebug {
                working_endpoint: working.provider.label(),
                timestamp: now_iso(),
                requested_address: request.address.clone(),
                contract_address: contract.to_string(),
                expected_amount: request.expected_amount,
                total_transactions: scan.total,
                skipped_transactions: scan.skipped,
                matching_transactions: matching,
                transfer_balance,
                explorer_balance,
                balance_source,
                endpoint_errors: working.errors,
            }),
        }
    }

    async fn first_available(&self, address: &str) -> Result<WorkingEndpoint, Vec<String>> {
        let mut errors = Vec::new();

        for provider in &self.providers {
            let label = provider.label();
            let lookup = provider.token_transfers(address, &self.config.contract_address);

            let error = match timeout(self.config.transfer_timeout, lookup).await {
                Ok(Ok(response)) => {
                    tracing::info!(
                        "Explorer {} answered: status={} message={}",
                        label,
                        response.status,
                        response.message
                    );
                    return Ok(WorkingEndpoint {
                        provider: provider.clone(),
                        response,
                        errors,
                    });
                }
                Ok(Err(e)) => e,
                Err(_) => ExplorerError::Timeout(self.config.transfer_timeout),
            };

            tracing::warn!("Explorer {} failed: {}", label, error);
            errors.push(format!("{}: {}", label, error));
        }

        Err(errors)
    }

    /// Token balance from the explorer, or `None` if the lookup fails in any way.
    async fn explorer_balance(
        &self,
        provider: &dyn ExplorerProvider,
        address: &str,
    ) -> Option<f64> {
        let lookup = provider.token_balance(address, &self.config.contract_address);

        let response = match timeout(self.config.balance_timeout, lookup).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!("Balance lookup via {} failed: {}", provider.label(), e);
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    "Balance lookup via {} timed out after {:?}",
                    provider.label(),
                    self.config.balance_timeout
                );
                return None;
            }
        };

        if !response.is_ok() {
            tracing::debug!(
                "Balance lookup returned status {}: {}",
                response.status,
                response.message
            );
            return None;
        }

        let raw = match &response.result {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                tracing::warn!("Unexpected balance result: {}", other);
                return None;
            }
        };

        match raw_to_decimal(&raw, BALANCE_DECIMALS) {
            Ok(balance) => Some(balance),
            Err(e) => {
                tracing::warn!("Unusable balance {:?}: {}", raw, e);
                None
            }
        }
    }
}

fn scan_transfers(response: &ExplorerResponse, criteria: &MatchCriteria) -> TransferScan {
    let entries = match response.result.as_array() {
        Some(entries) if response.is_ok() => entries,
        _ => return TransferScan::default(),
    };

    let mut scan = TransferScan {
        total: entries.len(),
        ..Default::default()
    };

    for entry in entries {
        let tx: ExplorerTransaction = match serde_json::from_value(entry.clone()) {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!("Skipping malformed explorer transaction: {}", e);
                scan.skipped += 1;
                continue;
            }
        };

        match tx.normalize(criteria) {
            Ok(normalized) => scan.normalized.push(normalized),
            Err(e) => {
                tracing::warn!("Skipping transaction {}: {}", tx.hash, e);
                scan.skipped += 1;
            }
        }
    }

    scan
}

fn api_status(response: &ExplorerResponse) -> ApiStatus {
    let result = match &response.result {
        serde_json::Value::Array(items) => {
            serde_json::Value::String(format!("{} transactions", items.len()))
        }
        other => other.clone(),
    };

    ApiStatus {
        status: response.status.clone(),
        message: response.message.clone(),
        result,
    }
}
