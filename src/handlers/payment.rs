use crate::{
    error::{mentions_network, RequestError},
    models::VerificationReport,
    services::{PaymentChecker, PaymentRequest},
};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub checker: Arc<PaymentChecker>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(checker: Arc<PaymentChecker>) -> Self {
        Self {
            checker,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CheckPaymentParams {
    pub address: Option<String>,
    pub amount: Option<String>,
}

impl CheckPaymentParams {
    /// `expectedAmount` is an alias of `amount`. Each slot may be filled once;
    /// unknown keys are ignored.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, RequestError> {
        let mut params = Self::default();

        for (key, value) in pairs {
            let slot = match key.as_str() {
                "address" => &mut params.address,
                "amount" | "expectedAmount" => &mut params.amount,
                _ => continue,
            };

            if slot.is_some() {
                return Err(RequestError::DuplicateParameter {
                    name: key,
                    address: params.address,
                    amount: params.amount,
                });
            }
            *slot = Some(value);
        }

        Ok(params)
    }
}

/// `GET /check-payment?address=<addr>&amount=<amount>`
///
/// Only unusable input is reported as an HTTP error. Everything that goes
/// wrong after validation is folded into a 200 report that tells the caller
/// to verify by hand.
pub async fn check_payment(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<VerificationReport>, RequestError> {
    let Query(pairs) =
        query.map_err(|rejection| RequestError::InvalidQuery(rejection.body_text()))?;
    let params = CheckPaymentParams::from_pairs(pairs)?;
    let request = PaymentRequest::new(params.address, params.amount)?;

    let outcome = AssertUnwindSafe(state.checker.check(&request))
        .catch_unwind()
        .await;

    let report = match outcome {
        Ok(report) => report,
        Err(panic) => failure_report(&state, &request, panic_message(panic.as_ref())),
    };

    Ok(Json(report))
}

fn failure_report(
    state: &AppState,
    request: &PaymentRequest,
    message: String,
) -> VerificationReport {
    let network_error = mentions_network(&message);

    tracing::error!(
        error = %message,
        network_error,
        address = %request.address,
        "Payment check failed"
    );

    VerificationReport::failure(
        state.checker.contract_address(),
        &request.address,
        &request.amount,
        message.clone(),
        vec![message],
        network_error,
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckerConfig;
    use crate::models::DebugInfo;
    use crate::services::testing::{Scripted, ScriptedProvider};
    use crate::services::ExplorerProvider;

    fn state(provider: ScriptedProvider) -> AppState {
        let providers: Vec<Arc<dyn ExplorerProvider>> = vec![Arc::new(provider)];
        AppState::new(Arc::new(PaymentChecker::new(
            providers,
            CheckerConfig::default(),
        )))
    }

    fn query(pairs: &[(&str, &str)]) -> Result<Query<Vec<(String, String)>>, QueryRejection> {
        Ok(Query(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }

    #[tokio::test]
    async fn missing_amount_is_rejected() {
        let state = state(ScriptedProvider::new("p", Scripted::Fail, Scripted::Fail));
        let result = check_payment(State(state), query(&[("address", "0xabc")])).await;
        assert!(matches!(result, Err(RequestError::MissingParameters { .. })));
    }

    #[test]
    fn expected_amount_is_an_alias() {
        let params = CheckPaymentParams::from_pairs(vec![
            ("expectedAmount".to_string(), "2".to_string()),
            ("address".to_string(), "0xabc".to_string()),
            ("utm_source".to_string(), "mail".to_string()),
        ])
        .unwrap();
        assert_eq!(params.amount.as_deref(), Some("2"));
        assert_eq!(params.address.as_deref(), Some("0xabc"));
    }

    #[test]
    fn repeated_or_aliased_amount_is_a_duplicate() {
        let err = CheckPaymentParams::from_pairs(vec![
            ("address".to_string(), "0xabc".to_string()),
            ("amount".to_string(), "1".to_string()),
            ("expectedAmount".to_string(), "2".to_string()),
        ])
        .unwrap_err();

        match err {
            RequestError::DuplicateParameter {
                name,
                address,
                amount,
            } => {
                assert_eq!(name, "expectedAmount");
                assert_eq!(address.as_deref(), Some("0xabc"));
                assert_eq!(amount.as_deref(), Some("1"));
            }
            other => panic!("expected duplicate parameter, got {:?}", other),
        }

        let err = CheckPaymentParams::from_pairs(vec![
            ("address".to_string(), "0xabc".to_string()),
            ("address".to_string(), "0xdef".to_string()),
        ])
        .unwrap_err();
        assert!(matches!(err, RequestError::DuplicateParameter { name, .. } if name == "address"));
    }

    #[tokio::test]
    async fn panic_in_pipeline_becomes_failure_report() {
        let state = state(ScriptedProvider::new(
            "p",
            Scripted::Panic("explorer client blew up"),
            Scripted::Fail,
        ));

        let params = query(&[("address", "0xabc"), ("amount", "1")]);
        let Json(report) = check_payment(State(state), params).await.unwrap();

        assert!(!report.confirmed);
        assert_eq!(report.manual_mode, Some(false));
        match report.debug_info {
            DebugInfo::Failure(debug) => {
                assert!(debug.error.contains("explorer client blew up"));
                assert!(!debug.network_error);
                assert!(debug.fallback.manual_verification_url.contains("0xabc"));
            }
            other => panic!("expected failure debug info, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn network_panic_switches_to_manual_mode() {
        let state = state(ScriptedProvider::new(
            "p",
            Scripted::Panic("connection reset while fetching transfers"),
            Scripted::Fail,
        ));

        let params = query(&[("address", "0xabc"), ("amount", "1")]);
        let Json(report) = check_payment(State(state), params).await.unwrap();

        assert_eq!(report.manual_mode, Some(true));
        match report.debug_info {
            DebugInfo::Failure(debug) => {
                assert!(debug.network_error);
                assert_eq!(debug.error_chain, vec![debug.error.clone()]);
            }
            other => panic!("expected failure debug info, got {:?}", other),
        }
    }

    #[test]
    fn panic_message_handles_both_payload_kinds() {
        let static_payload: Box<dyn Any + Send> = Box::new("static");
        let owned_payload: Box<dyn Any + Send> = Box::new("owned".to_string());
        assert_eq!(panic_message(static_payload.as_ref()), "static");
        assert_eq!(panic_message(owned_payload.as_ref()), "owned");
    }
}
