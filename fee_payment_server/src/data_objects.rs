use std::collections::HashMap;

use chrono::{DateTime, Utc};
use fpg_common::Money;
use serde::{Deserialize, Serialize};

// The gateway's redirect query parameters are as version-drifted as its response bodies, so the callback
// identifiers resolve through the same ordered-alias discipline. First listed name wins.
pub const CALLBACK_COLLECT_ID_ALIASES: [&str; 3] = ["collect_request_id", "collect_id", "CollectRequestId"];
pub const CALLBACK_ORDER_ID_ALIASES: [&str; 3] = ["order_id", "custom_order_id", "OrderId"];
pub const CALLBACK_STATUS_ALIASES: [&str; 3] = ["status", "payment_status", "Status"];

/// Resolve the first alias present (and non-empty) in a query-string map.
pub fn first_param<'a>(query: &'a HashMap<String, String>, aliases: &[&str]) -> Option<&'a str> {
    aliases.iter().filter_map(|key| query.get(*key)).map(String::as_str).find(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentInfoPayload {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub amount: i64,
    pub student_info: StudentInfoPayload,
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Supplied by the auth layer fronting this service, when there is one.
    #[serde(default)]
    pub initiated_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentResponse {
    pub redirect_url: String,
    pub collect_request_id: String,
    pub order_id: String,
    pub status: String,
}

/// The body the gateway POSTs to the webhook endpoint. `order_info` stays raw JSON until the signature has been
/// verified; nothing in it may be trusted (or even parsed into domain types) before then.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub order_info: serde_json::Value,
    pub sign: String,
}

/// The settlement fields a webhook must carry. `order_id` here is the gateway's collect id — the gateway calls
/// it an order id because, from its side, the collect request *is* the order.
///
/// The four non-optional fields are the required set: a payload missing any of them is rejected before any
/// write, rather than applied partially.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderInfo {
    pub order_id: String,
    pub order_amount: Money,
    pub transaction_amount: Money,
    pub status: String,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub bank_reference: Option<String>,
    #[serde(default)]
    pub payment_mode: Option<String>,
    #[serde(default)]
    pub payment_details: Option<String>,
    #[serde(default)]
    pub payment_message: Option<String>,
    #[serde(default)]
    pub payment_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub message: String,
    pub order_id: String,
}

#[cfg(test)]
mod test {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn first_param_respects_alias_order() {
        let q = query(&[("collect_id", "second"), ("collect_request_id", "first")]);
        assert_eq!(first_param(&q, &CALLBACK_COLLECT_ID_ALIASES), Some("first"));
    }

    #[test]
    fn first_param_skips_empty_values() {
        let q = query(&[("collect_request_id", ""), ("collect_id", "fallback")]);
        assert_eq!(first_param(&q, &CALLBACK_COLLECT_ID_ALIASES), Some("fallback"));
        assert_eq!(first_param(&q, &CALLBACK_ORDER_ID_ALIASES), None);
    }

    #[test]
    fn order_info_requires_the_settlement_fields() {
        let missing_amount = serde_json::json!({
            "order_id": "abc123",
            "transaction_amount": 100,
            "status": "SUCCESS",
        });
        assert!(serde_json::from_value::<OrderInfo>(missing_amount).is_err());

        let complete = serde_json::json!({
            "order_id": "abc123",
            "order_amount": 100,
            "transaction_amount": 100,
            "status": "SUCCESS",
        });
        let info = serde_json::from_value::<OrderInfo>(complete).unwrap();
        assert_eq!(info.order_id, "abc123");
        assert!(info.bank_reference.is_none());
    }
}
