use anyhow::{bail, Context, Result};
use ethers::types::Address;
use std::str::FromStr;
use std::time::Duration;

/// USDT (BEP-20) on BNB Smart Chain.
pub const USDT_BSC_CONTRACT: &str = "0x55d398326f99059fF775485246999027B3197955";

pub const DEFAULT_EXPLORER_ENDPOINTS: [&str; 2] = [
    "https://api.bscscan.com/api",
    "https://api-bscscan.bnbchain.org/api",
];

#[derive(Debug, Clone)]
pub enum Environment {
    Development,
    Testnet,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,

    // Explorer API
    pub explorer_api_key: Option<String>,
    pub explorer_endpoints: Vec<String>,
    pub contract_address: String,

    // Outbound deadlines
    pub transfer_timeout_secs: u64,
    pub balance_timeout_secs: u64,
}

/// Everything the payment checker needs, handed over at construction.
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    pub contract_address: String,
    pub transfer_timeout: Duration,
    pub balance_timeout: Duration,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            contract_address: USDT_BSC_CONTRACT.to_string(),
            transfer_timeout: Duration::from_secs(8),
            balance_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let environment = Self::parse_environment()?;

        let config = Self {
            environment,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid PORT")?,

            explorer_api_key: std::env::var("BSCSCAN_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            explorer_endpoints: Self::parse_endpoints(std::env::var("EXPLORER_ENDPOINTS").ok()),
            contract_address: std::env::var("USDT_CONTRACT_ADDRESS")
                .unwrap_or_else(|_| USDT_BSC_CONTRACT.to_string()),

            transfer_timeout_secs: std::env::var("TRANSFER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .context("Invalid TRANSFER_TIMEOUT_SECS")?,
            balance_timeout_secs: std::env::var("BALANCE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid BALANCE_TIMEOUT_SECS")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn checker_config(&self) -> CheckerConfig {
        CheckerConfig {
            contract_address: self.contract_address.clone(),
            transfer_timeout: Duration::from_secs(self.transfer_timeout_secs),
            balance_timeout: Duration::from_secs(self.balance_timeout_secs),
        }
    }

    fn parse_environment() -> Result<Environment> {
        let env = std::env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string());

        match env.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testnet" | "test" => Ok(Environment::Testnet),
            "production" | "prod" => Ok(Environment::Production),
            _ => bail!("Unknown environment: {}", env),
        }
    }

    fn parse_endpoints(raw: Option<String>) -> Vec<String> {
        match raw {
            Some(list) if !list.trim().is_empty() => list
                .split(',')
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            _ => DEFAULT_EXPLORER_ENDPOINTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.explorer_endpoints.is_empty() {
            bail!("EXPLORER_ENDPOINTS must list at least one URL");
        }
        for endpoint in &self.explorer_endpoints {
            if !endpoint.starts_with("http") {
                bail!("Explorer endpoint must be HTTP(S) URL: {}", endpoint);
            }
        }
        if self.explorer_endpoints.len() < 2 {
            tracing::warn!("Only one explorer endpoint configured, no fallback available");
        }

        Address::from_str(&self.contract_address)
            .with_context(|| format!("Invalid contract address: {}", self.contract_address))?;

        if self.transfer_timeout_secs == 0 || self.balance_timeout_secs == 0 {
            bail!("Explorer timeouts must be greater than zero");
        }

        if self.explorer_api_key.is_none() {
            tracing::warn!("BSCSCAN_API_KEY not set, explorer requests will be sent without a key");
        }

        tracing::info!(
            "Configuration validated for {:?} environment ({} explorer endpoints)",
            self.environment,
            self.explorer_endpoints.len()
        );

        Ok(())
    }
}
