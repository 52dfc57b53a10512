//! Wire types for the collect gateway, and the alias-tolerant parsing that goes with them.
//!
//! The gateway's response field names drift between deployments and API revisions (`collect_request_url` vs
//! `Collect_request_url` vs `redirect_url`). Rather than scattering fallback chains through the client, each
//! logical field resolves through one ordered alias list, in this module, at the parse boundary.

use chrono::{DateTime, Utc};
use fpg_common::Money;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::GatewayError;

const COLLECT_ID_ALIASES: [&str; 3] = ["collect_request_id", "collect_id", "id"];
const PAYMENT_URL_ALIASES: [&str; 4] = ["collect_request_url", "Collect_request_url", "payment_url", "redirect_url"];
const STATUS_ALIASES: [&str; 3] = ["status", "payment_status", "Status"];
const TRANSACTION_AMOUNT_ALIASES: [&str; 3] = ["transaction_amount", "transactionAmount", "amount"];
const PAYMENT_MODE_ALIASES: [&str; 2] = ["payment_mode", "payment_method"];
const PAYMENT_DETAILS_ALIASES: [&str; 2] = ["details", "payment_details"];
const BANK_REFERENCE_ALIASES: [&str; 2] = ["bank_reference", "bank_ref"];
const PAYMENT_MESSAGE_ALIASES: [&str; 2] = ["payment_message", "message"];
const PAYMENT_TIME_ALIASES: [&str; 2] = ["payment_time", "updated_at"];
const ERROR_MESSAGE_ALIASES: [&str; 2] = ["error_message", "error"];

/// The result of a successful collect-request creation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectRequestCreated {
    pub collect_request_id: String,
    pub payment_url: String,
}

/// One answer from the gateway's status endpoint. The status token is passed through raw; normalization to the
/// canonical vocabulary happens in the engine, where all three ingestion channels share one set of rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectStatusReport {
    pub status: String,
    pub transaction_amount: Option<Money>,
    pub payment_mode: Option<String>,
    pub payment_details: Option<String>,
    pub bank_reference: Option<String>,
    pub payment_message: Option<String>,
    pub payment_time: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Return the first alias that resolves to a non-null field of `value`.
fn pick_alias<'a>(value: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().map(|key| &value[*key]).find(|v| !v.is_null())
}

fn pick_string(value: &Value, aliases: &[&str]) -> Option<String> {
    pick_alias(value, aliases).and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn pick_amount(value: &Value, aliases: &[&str]) -> Option<Money> {
    pick_alias(value, aliases).and_then(Value::as_i64).map(Money::from)
}

fn pick_timestamp(value: &Value, aliases: &[&str]) -> Option<DateTime<Utc>> {
    pick_string(value, aliases).and_then(|s| s.parse::<DateTime<Utc>>().ok())
}

/// Parse a collect-request creation response.
///
/// A response with an id but no payment URL is reported as [`GatewayError::MissingPaymentUrl`] carrying that id,
/// so the caller can still register the collect request for later reconciliation — the gateway may well have
/// accepted the request despite the malformed response.
pub(crate) fn parse_collect_request_created(value: &Value) -> Result<CollectRequestCreated, GatewayError> {
    let collect_request_id = pick_string(value, &COLLECT_ID_ALIASES)
        .ok_or_else(|| GatewayError::InvalidResponse(format!("no collect request id in response: {value}")))?;
    match pick_string(value, &PAYMENT_URL_ALIASES) {
        Some(payment_url) => Ok(CollectRequestCreated { collect_request_id, payment_url }),
        None => Err(GatewayError::MissingPaymentUrl { collect_request_id }),
    }
}

/// Parse a status-query response. The status token is mandatory; everything else is best-effort.
pub(crate) fn parse_collect_status_report(value: &Value) -> Result<CollectStatusReport, GatewayError> {
    let status = pick_string(value, &STATUS_ALIASES)
        .ok_or_else(|| GatewayError::InvalidResponse(format!("no status field in response: {value}")))?;
    Ok(CollectStatusReport {
        status,
        transaction_amount: pick_amount(value, &TRANSACTION_AMOUNT_ALIASES),
        payment_mode: pick_string(value, &PAYMENT_MODE_ALIASES),
        payment_details: pick_string(value, &PAYMENT_DETAILS_ALIASES),
        bank_reference: pick_string(value, &BANK_REFERENCE_ALIASES),
        payment_message: pick_string(value, &PAYMENT_MESSAGE_ALIASES),
        payment_time: pick_timestamp(value, &PAYMENT_TIME_ALIASES),
        error_message: pick_string(value, &ERROR_MESSAGE_ALIASES),
    })
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn created_response_resolves_primary_field_names() {
        let value = json!({"collect_request_id": "abc123", "collect_request_url": "https://pay/abc123"});
        let created = parse_collect_request_created(&value).unwrap();
        assert_eq!(created.collect_request_id, "abc123");
        assert_eq!(created.payment_url, "https://pay/abc123");
    }

    #[test]
    fn created_response_resolves_alias_field_names() {
        let value = json!({"id": "xyz789", "Collect_request_url": "https://pay/xyz789"});
        let created = parse_collect_request_created(&value).unwrap();
        assert_eq!(created.collect_request_id, "xyz789");
        assert_eq!(created.payment_url, "https://pay/xyz789");
    }

    #[test]
    fn alias_order_is_respected() {
        // Both names present: the primary name wins.
        let value = json!({"collect_request_id": "primary", "id": "fallback", "redirect_url": "https://pay/p"});
        let created = parse_collect_request_created(&value).unwrap();
        assert_eq!(created.collect_request_id, "primary");
    }

    #[test]
    fn missing_payment_url_still_surfaces_the_collect_id() {
        let value = json!({"collect_request_id": "abc123"});
        match parse_collect_request_created(&value) {
            Err(GatewayError::MissingPaymentUrl { collect_request_id }) => {
                assert_eq!(collect_request_id, "abc123");
            },
            other => panic!("Expected MissingPaymentUrl, got {other:?}"),
        }
    }

    #[test]
    fn missing_collect_id_is_an_invalid_response() {
        let value = json!({"collect_request_url": "https://pay/abc123"});
        assert!(matches!(parse_collect_request_created(&value), Err(GatewayError::InvalidResponse(_))));
    }

    #[test]
    fn status_report_parses_details() {
        let value = json!({
            "status": "SUCCESS",
            "transaction_amount": 990,
            "payment_mode": "upi",
            "details": "upi@bank",
            "bank_reference": "BNK001",
            "payment_message": "payment success",
            "payment_time": "2024-05-01T10:30:00Z",
        });
        let report = parse_collect_status_report(&value).unwrap();
        assert_eq!(report.status, "SUCCESS");
        assert_eq!(report.transaction_amount, Some(Money::from(990)));
        assert_eq!(report.bank_reference.as_deref(), Some("BNK001"));
        assert!(report.payment_time.is_some());
        assert!(report.error_message.is_none());
    }

    #[test]
    fn status_report_without_status_is_invalid() {
        let value = json!({"transaction_amount": 990});
        assert!(matches!(parse_collect_status_report(&value), Err(GatewayError::InvalidResponse(_))));
    }
}
