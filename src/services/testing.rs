//! Scripted explorer used by unit tests.

use crate::models::ExplorerResponse;
use crate::services::explorer::{ExplorerError, ExplorerProvider};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Clone)]
pub enum Scripted {
    Respond(ExplorerResponse),
    Fail,
    Hang,
    Panic(&'static str),
}

impl Scripted {
    async fn run(&self) -> Result<ExplorerResponse, ExplorerError> {
        match self {
            Scripted::Respond(response) => Ok(response.clone()),
            Scripted::Fail => Err(ExplorerError::Http(StatusCode::BAD_GATEWAY)),
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(ExplorerError::Http(StatusCode::GATEWAY_TIMEOUT))
            }
            Scripted::Panic(message) => panic!("{}", message),
        }
    }
}

pub struct ScriptedProvider {
    name: String,
    transfers: Scripted,
    balance: Scripted,
}

impl ScriptedProvider {
    pub fn new(name: &str, transfers: Scripted, balance: Scripted) -> Self {
        Self {
            name: name.to_string(),
            transfers,
            balance,
        }
    }
}

#[async_trait]
impl ExplorerProvider for ScriptedProvider {
    fn label(&self) -> String {
        self.name.clone()
    }

    async fn token_transfers(&self, _: &str, _: &str) -> Result<ExplorerResponse, ExplorerError> {
        self.transfers.run().await
    }

    async fn token_balance(&self, _: &str, _: &str) -> Result<ExplorerResponse, ExplorerError> {
        self.balance.run().await
    }
}

pub fn transfer_json(to: &str, value: &str, time_stamp: i64) -> Value {
    json!({
        "blockNumber": "41234567",
        "timeStamp": time_stamp.to_string(),
        "hash": format!("0x{:064x}", time_stamp),
        "from": "0x9999999999999999999999999999999999999999",
        "to": to,
        "value": value,
        "tokenName": "Tether USD",
        "tokenSymbol": "USDT",
        "tokenDecimal": "18",
        "confirmations": "20"
    })
}

pub fn transfers_ok(transfers: Vec<Value>) -> Scripted {
    Scripted::Respond(ExplorerResponse {
        status: "1".to_string(),
        message: "OK".to_string(),
        result: Value::Array(transfers),
    })
}

pub fn balance_ok(raw: &str) -> Scripted {
    Scripted::Respond(ExplorerResponse {
        status: "1".to_string(),
        message: "OK".to_string(),
        result: Value::String(raw.to_string()),
    })
}
