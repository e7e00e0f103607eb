use crate::models::ExplorerResponse;
use async_trait::async_trait;
use reqwest::{header::ACCEPT, StatusCode, Url};
use std::time::Duration;
use thiserror::Error;

pub const USER_AGENT: &str = concat!("usdt-payment-checker/", env!("CARGO_PKG_VERSION"));

const TRANSFER_PAGE_SIZE: &str = "100";

#[derive(Error, Debug)]
pub enum ExplorerError {
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {0}")]
    Http(StatusCode),

    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// A block explorer that can answer the two queries the checker needs.
///
/// Providers are tried in order until one returns a parsed response for
/// `token_transfers`; the balance query then goes to that same provider.
#[async_trait]
pub trait ExplorerProvider: Send + Sync {
    /// Display form of the endpoint, safe to log and return to callers.
    fn label(&self) -> String;

    async fn token_transfers(
        &self,
        address: &str,
        contract: &str,
    ) -> Result<ExplorerResponse, ExplorerError>;

    async fn token_balance(
        &self,
        address: &str,
        contract: &str,
    ) -> Result<ExplorerResponse, ExplorerError>;
}

pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().user_agent(USER_AGENT).build()
}

/// BscScan-compatible `/api` endpoint.
#[derive(Clone)]
pub struct BscScanClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl BscScanClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            client,
        }
    }

    fn url(&self, params: &[(&str, &str)]) -> Result<Url, ExplorerError> {
        let mut pairs = params.to_vec();
        if let Some(key) = &self.api_key {
            pairs.push(("apikey", key.as_str()));
        }

        Url::parse_with_params(&self.base_url, &pairs)
            .map_err(|e| ExplorerError::InvalidUrl(format!("{}: {}", self.base_url, e)))
    }

    async fn get_json(&self, params: &[(&str, &str)]) -> Result<ExplorerResponse, ExplorerError> {
        let url = self.url(params)?;
        tracing::debug!("Explorer request: {}", redact_api_key(&url));

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExplorerError::Http(status));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ExplorerProvider for BscScanClient {
    fn label(&self) -> String {
        match self.url(&[]) {
            Ok(url) => redact_api_key(&url),
            Err(_) => self.base_url.clone(),
        }
    }

    async fn token_transfers(
        &self,
        address: &str,
        contract: &str,
    ) -> Result<ExplorerResponse, ExplorerError> {
        self.get_json(&[
            ("module", "account"),
            ("action", "tokentx"),
            ("contractaddress", contract),
            ("address", address),
            ("page", "1"),
            ("offset", TRANSFER_PAGE_SIZE),
            ("sort", "desc"),
        ])
        .await
    }

    async fn token_balance(
        &self,
        address: &str,
        contract: &str,
    ) -> Result<ExplorerResponse, ExplorerError> {
        self.get_json(&[
            ("module", "account"),
            ("action", "tokenbalance"),
            ("contractaddress", contract),
            ("address", address),
            ("tag", "latest"),
        ])
        .await
    }
}

/// Replaces the `apikey` query value so the URL can be logged or echoed.
pub fn redact_api_key(url: &Url) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == "apikey" {
                "REDACTED".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();

    let mut redacted = url.clone();
    if pairs.is_empty() {
        redacted.set_query(None);
    } else {
        redacted.query_pairs_mut().clear().extend_pairs(pairs);
    }
    redacted.to_string()
}
