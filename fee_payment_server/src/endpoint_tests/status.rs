use actix_web::{http::StatusCode, web, web::ServiceConfig};
use fee_payment_engine::{
    db_types::{Channel, PaymentStatus},
    PaymentFlowApi,
};

use super::{
    helpers::{get_request, status_fixture},
    mocks::MockPaymentStore,
};
use crate::routes::TransactionStatusRoute;

fn register(cfg: &mut ServiceConfig, store: MockPaymentStore) {
    cfg.app_data(web::Data::new(PaymentFlowApi::new(store)))
        .service(TransactionStatusRoute::<MockPaymentStore>::new());
}

#[actix_web::test]
async fn settled_records_are_returned_as_json() {
    let _ = env_logger::try_init();
    let (status, body) = get_request("/transaction-status/abc123", configure_found).await;
    assert_eq!(status, StatusCode::OK);
    let record: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(record["collect_id"], "abc123");
    assert_eq!(record["status"], "success");
    assert_eq!(record["source_channel"], "webhook");
    assert_eq!(record["transaction_amount"], 1000);
}

fn configure_found(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store
        .expect_fetch_status_by_collect_id()
        .withf(|cid| cid.as_str() == "abc123")
        .returning(|cid| Ok(Some(status_fixture(cid.as_str(), "ord-1", PaymentStatus::Success, Channel::Webhook))));
    register(cfg, store);
}

#[actix_web::test]
async fn unknown_collect_requests_are_not_found() {
    let _ = env_logger::try_init();
    let (status, body) = get_request("/transaction-status/ghost", configure_missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("not found"), "{body}");
}

fn configure_missing(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_fetch_status_by_collect_id().returning(|_| Ok(None));
    register(cfg, store);
}
