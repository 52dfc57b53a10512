use actix_web::{http::StatusCode, web, web::ServiceConfig};
use collect_gateway::WebhookClaims;
use fee_payment_engine::{
    db_types::{Channel, PaymentStatus, UpdateOutcome},
    PaymentFlowApi,
    PaymentStoreError,
};
use fpg_common::Money;
use serde_json::json;

use super::{
    helpers::{post_request, status_fixture, test_signer},
    mocks::MockPaymentStore,
};
use crate::routes::PaymentWebhookRoute;

fn register(cfg: &mut ServiceConfig, store: MockPaymentStore) {
    cfg.app_data(web::Data::new(PaymentFlowApi::new(store)))
        .app_data(web::Data::new(test_signer()))
        .service(PaymentWebhookRoute::<MockPaymentStore>::new());
}

fn order_info(collect_id: &str) -> serde_json::Value {
    json!({
        "order_id": collect_id,
        "order_amount": 1000,
        "transaction_amount": 1000,
        "status": "SUCCESS",
        "gateway": "CollectGateway",
        "bank_reference": "BNK001",
        "payment_mode": "upi",
        "payment_message": "payment success",
    })
}

fn signed_payload(collect_id: &str) -> serde_json::Value {
    let sign = test_signer()
        .webhook_token(&WebhookClaims { collect_request_id: collect_id.to_string(), status: "SUCCESS".to_string() })
        .unwrap();
    json!({"order_info": order_info(collect_id), "sign": sign})
}

#[actix_web::test]
async fn webhook_happy_path() {
    let _ = env_logger::try_init();
    let (status, body) = post_request("/payment-webhook", signed_payload("abc123"), configure_happy_path).await;
    assert_eq!(status, StatusCode::OK);
    let response: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(response["order_id"], "abc123");
    assert_eq!(response["message"], "Webhook processed successfully");
}

fn configure_happy_path(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_record_webhook().times(1).returning(|_, _| Ok(()));
    store
        .expect_apply_status_update()
        .times(1)
        .withf(|collect_id, channel, update| {
            collect_id.as_str() == "abc123"
                && *channel == Channel::Webhook
                && update.status == PaymentStatus::Success
                && update.transaction_amount == Some(Money::from(1000))
                && update.bank_reference.as_deref() == Some("BNK001")
        })
        .returning(|cid, channel, _| {
            Ok(UpdateOutcome::Applied(status_fixture(cid.as_str(), "ord-1", PaymentStatus::Success, channel)))
        });
    register(cfg, store);
}

#[actix_web::test]
async fn an_unverifiable_signature_never_touches_the_store() {
    let _ = env_logger::try_init();
    let payload = json!({"order_info": order_info("abc123"), "sign": "not-even-a-token"});
    // No expectations on the store: any store access fails the test.
    let (status, body) = post_request("/payment-webhook", payload, configure_untouched).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("unauthorized webhook"), "{body}");
}

#[actix_web::test]
async fn a_tampered_token_never_touches_the_store() {
    let _ = env_logger::try_init();
    let mut payload = signed_payload("abc123");
    let sign = payload["sign"].as_str().unwrap().to_string();
    payload["sign"] = json!(format!("{}XXXX", &sign[..sign.len() - 4]));
    let (status, _) = post_request("/payment-webhook", payload, configure_untouched).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

fn configure_untouched(cfg: &mut ServiceConfig) {
    register(cfg, MockPaymentStore::new());
}

#[actix_web::test]
async fn webhooks_for_unknown_collect_requests_are_not_found() {
    let _ = env_logger::try_init();
    let (status, body) = post_request("/payment-webhook", signed_payload("ghost"), configure_not_found).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("not found"), "{body}");
}

fn configure_not_found(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_record_webhook().times(1).returning(|_, _| Ok(()));
    // A webhook must reference a collect request this system initiated; nothing is created on the fly.
    store
        .expect_apply_status_update()
        .returning(|cid, _, _| Err(PaymentStoreError::CollectRequestNotFound(cid.clone())));
    register(cfg, store);
}

#[actix_web::test]
async fn partial_payloads_are_rejected_before_any_write() {
    let _ = env_logger::try_init();
    let mut info = order_info("abc123");
    info.as_object_mut().unwrap().remove("transaction_amount");
    let sign = test_signer()
        .webhook_token(&WebhookClaims { collect_request_id: "abc123".to_string(), status: "SUCCESS".to_string() })
        .unwrap();
    let payload = json!({"order_info": info, "sign": sign});
    let (status, body) = post_request("/payment-webhook", payload, configure_log_only).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("malformed webhook payload"), "{body}");
}

#[actix_web::test]
async fn the_signature_must_cover_the_payload_it_arrives_with() {
    let _ = env_logger::try_init();
    // Token legitimately signed for one collect request, replayed against another.
    let sign = test_signer()
        .webhook_token(&WebhookClaims { collect_request_id: "other999".to_string(), status: "SUCCESS".to_string() })
        .unwrap();
    let payload = json!({"order_info": order_info("abc123"), "sign": sign});
    let (status, _) = post_request("/payment-webhook", payload, configure_log_only).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// The audit log sees the authenticated payload, but no settlement write may happen.
fn configure_log_only(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_record_webhook().times(1).returning(|_, _| Ok(()));
    register(cfg, store);
}

#[actix_web::test]
async fn duplicate_deliveries_acknowledge_identically() {
    let _ = env_logger::try_init();
    let (first_status, first_body) =
        post_request("/payment-webhook", signed_payload("abc123"), configure_duplicate).await;
    let (second_status, second_body) =
        post_request("/payment-webhook", signed_payload("abc123"), configure_duplicate).await;
    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first_body, second_body);
}

fn configure_duplicate(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_record_webhook().returning(|_, _| Ok(()));
    store.expect_apply_status_update().returning(|cid, channel, _| {
        Ok(UpdateOutcome::Applied(status_fixture(cid.as_str(), "ord-1", PaymentStatus::Success, channel)))
    });
    register(cfg, store);
}
