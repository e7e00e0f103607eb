use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use ethers::types::U256;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Transfers older than this are not considered a fresh payment.
pub const RECENT_WINDOW_SECS: i64 = 3600;

/// Maximum distance between a transfer and the expected amount.
pub const AMOUNT_TOLERANCE: f64 = 0.001;

/// Decimals used by the explorer's token balance endpoint for USDT on BSC.
pub const BALANCE_DECIMALS: u32 = 18;

/// Envelope shared by every BscScan-style API response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplorerResponse {
    #[serde(default, deserialize_with = "string_or_number")]
    pub status: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

/// Some explorer deployments send `"status": 1` instead of `"status": "1"`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl ExplorerResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "1"
    }
}

/// One entry of the `tokentx` result list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorerTransaction {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub token_decimal: String,
    pub time_stamp: String,
    pub confirmations: String,
    pub block_number: String,
}

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("cannot scale {raw} by 10^{decimals}")]
    Conversion { raw: String, decimals: u32 },
}

/// What a transfer has to look like to count as the expected payment.
#[derive(Debug, Clone)]
pub struct MatchCriteria {
    pub address: String,
    pub expected_amount: f64,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTransaction {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: f64,
    pub timestamp: String,
    pub confirmations: u64,
    pub block_number: u64,
    pub is_recent: bool,
    pub is_to_address: bool,
    pub is_expected_amount: bool,
}

impl NormalizedTransaction {
    pub fn is_match(&self) -> bool {
        self.is_recent && self.is_to_address && self.is_expected_amount
    }
}

impl ExplorerTransaction {
    pub fn normalize(
        &self,
        criteria: &MatchCriteria,
    ) -> Result<NormalizedTransaction, NormalizeError> {
        let decimals: u32 = parse_field("tokenDecimal", &self.token_decimal)?;
        let value = raw_to_decimal(&self.value, decimals)?;

        let seconds: i64 = parse_field("timeStamp", &self.time_stamp)?;
        let received_at = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| NormalizeError::InvalidField {
                field: "timeStamp",
                value: self.time_stamp.clone(),
            })?;

        let age = criteria.now.timestamp() - seconds;

        Ok(NormalizedTransaction {
            hash: self.hash.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            value,
            timestamp: received_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            confirmations: parse_field("confirmations", &self.confirmations)?,
            block_number: parse_field("blockNumber", &self.block_number)?,
            is_recent: age < RECENT_WINDOW_SECS,
            is_to_address: self.to.eq_ignore_ascii_case(criteria.address.trim()),
            is_expected_amount: (value - criteria.expected_amount).abs() < AMOUNT_TOLERANCE,
        })
    }
}

fn parse_field<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, NormalizeError> {
    raw.trim().parse().map_err(|_| NormalizeError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

/// Scales an on-chain integer amount down by `10^decimals`.
///
/// The division happens on `U256` so large raw balances keep every digit until
/// the final conversion to `f64`.
pub fn raw_to_decimal(raw: &str, decimals: u32) -> Result<f64, NormalizeError> {
    let amount = U256::from_dec_str(raw.trim()).map_err(|_| NormalizeError::InvalidField {
        field: "value",
        value: raw.to_string(),
    })?;

    let formatted = ethers::utils::format_units(amount, decimals).map_err(|_| {
        NormalizeError::Conversion {
            raw: raw.to_string(),
            decimals,
        }
    })?;

    formatted.parse().map_err(|_| NormalizeError::Conversion {
        raw: raw.to_string(),
        decimals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPIENT: &str = "0xAbC0000000000000000000000000000000000001";

    fn criteria(now: DateTime<Utc>) -> MatchCriteria {
        MatchCriteria {
            address: RECIPIENT.to_lowercase(),
            expected_amount: 25.0,
            now,
        }
    }

    fn transfer(to: &str, value: &str, time_stamp: i64) -> ExplorerTransaction {
        ExplorerTransaction {
            hash: "0xfeed".to_string(),
            from: "0x0000000000000000000000000000000000000009".to_string(),
            to: to.to_string(),
            value: value.to_string(),
            token_decimal: "18".to_string(),
            time_stamp: time_stamp.to_string(),
            confirmations: "12".to_string(),
            block_number: "40000000".to_string(),
        }
    }

    #[test]
    fn matching_transfer_sets_all_flags() {
        let now = Utc::now();
        let tx = transfer(RECIPIENT, "25000000000000000000", now.timestamp());

        let normalized = tx.normalize(&criteria(now)).unwrap();

        assert_eq!(normalized.value, 25.0);
        assert!(normalized.is_recent);
        assert!(normalized.is_to_address);
        assert!(normalized.is_expected_amount);
        assert!(normalized.is_match());
        assert_eq!(normalized.block_number, 40_000_000);
    }

    #[test]
    fn address_comparison_ignores_case() {
        let now = Utc::now();
        let tx = transfer(&RECIPIENT.to_uppercase().replace("0X", "0x"), "1", now.timestamp());
        assert!(tx.normalize(&criteria(now)).unwrap().is_to_address);
    }

    #[test]
    fn transfer_older_than_an_hour_is_not_recent() {
        let now = Utc::now();
        let tx = transfer(RECIPIENT, "25000000000000000000", now.timestamp() - 3601);

        let normalized = tx.normalize(&criteria(now)).unwrap();

        assert!(!normalized.is_recent);
        assert!(!normalized.is_match());
    }

    #[test]
    fn amount_outside_tolerance_does_not_match() {
        let now = Utc::now();
        // 25.002
        let tx = transfer(RECIPIENT, "25002000000000000000", now.timestamp());
        assert!(!tx.normalize(&criteria(now)).unwrap().is_expected_amount);

        // 25.0005
        let tx = transfer(RECIPIENT, "25000500000000000000", now.timestamp());
        assert!(tx.normalize(&criteria(now)).unwrap().is_expected_amount);
    }

    #[test]
    fn timestamp_is_iso_utc() {
        let now = Utc::now();
        let tx = transfer(RECIPIENT, "1", 1_700_000_000);
        let normalized = tx.normalize(&criteria(now)).unwrap();
        assert_eq!(normalized.timestamp, "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn malformed_value_is_rejected() {
        let now = Utc::now();
        let tx = transfer(RECIPIENT, "12abc", now.timestamp());
        assert!(matches!(
            tx.normalize(&criteria(now)),
            Err(NormalizeError::InvalidField { field: "value", .. })
        ));
    }

    #[test]
    fn missing_fields_fail_schema() {
        let raw = serde_json::json!({ "hash": "0x1", "to": RECIPIENT, "value": "1" });
        assert!(serde_json::from_value::<ExplorerTransaction>(raw).is_err());
    }

    #[test]
    fn raw_balance_scales_by_decimals() {
        assert_eq!(raw_to_decimal("2500000000000000000", BALANCE_DECIMALS).unwrap(), 2.5);
        assert_eq!(raw_to_decimal("1500000", 6).unwrap(), 1.5);
        assert_eq!(raw_to_decimal("0", BALANCE_DECIMALS).unwrap(), 0.0);
    }

    #[test]
    fn envelope_accepts_numeric_status() {
        let response: ExplorerResponse =
            serde_json::from_str(r#"{"status":1,"message":null,"result":[]}"#).unwrap();
        assert!(response.is_ok());
        assert_eq!(response.message, "");
    }

    #[test]
    fn envelope_rejects_bare_strings() {
        assert!(serde_json::from_str::<ExplorerResponse>(r#""maintenance""#).is_err());
    }

    #[test]
    fn envelope_accepts_partial_objects() {
        let response: ExplorerResponse =
            serde_json::from_str(r#"{"status":"0","message":"NOTOK"}"#).unwrap();
        assert!(!response.is_ok());
        assert!(response.result.is_null());
    }
}
