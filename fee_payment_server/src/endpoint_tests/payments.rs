use actix_web::{http::StatusCode, web, web::ServiceConfig};
use collect_gateway::{CollectRequestCreated, GatewayError};
use fee_payment_engine::{
    db_types::{Channel, PaymentStatus},
    PaymentFlowApi,
};
use fpg_common::Money;
use serde_json::json;

use super::{
    helpers::{order_fixture, post_request, status_fixture, test_settings},
    mocks::{MockGateway, MockPaymentStore},
};
use crate::routes::CreatePaymentRoute;

fn payment_body() -> serde_json::Value {
    json!({"amount": 1000, "student_info": {"name": "Asha"}})
}

fn register(cfg: &mut ServiceConfig, store: MockPaymentStore, gateway: MockGateway) {
    cfg.app_data(web::Data::new(PaymentFlowApi::new(store)))
        .app_data(web::Data::new(gateway))
        .app_data(web::Data::new(test_settings()))
        .service(CreatePaymentRoute::<MockPaymentStore, MockGateway>::new());
}

#[actix_web::test]
async fn create_payment_happy_path() {
    let _ = env_logger::try_init();
    let (status, body) = post_request("/create-payment", payment_body(), configure_happy_path).await;
    assert_eq!(status, StatusCode::OK);
    let response: serde_json::Value = serde_json::from_str(&body).expect("Response should be JSON");
    assert_eq!(response["redirect_url"], "https://pay/abc123");
    assert_eq!(response["collect_request_id"], "abc123");
    assert_eq!(response["status"], "success");
    assert!(response["order_id"].as_str().unwrap().starts_with("ord-"));
}

fn configure_happy_path(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store
        .expect_insert_order()
        .withf(|new| {
            new.amount == Money::from(1000)
                && new.student.name == "Asha"
                && new.school_id == "SCHOOL-1"
                && !new.student.student_id.is_empty()
        })
        .returning(|new| Ok(order_fixture(&new)));
    store
        .expect_register_collect_request()
        .withf(|_, collect_id, amount| collect_id.as_str() == "abc123" && *amount == Money::from(1000))
        .returning(|order_id, collect_id, _| {
            Ok(status_fixture(
                collect_id.as_str(),
                order_id.as_str(),
                PaymentStatus::Pending,
                Channel::Callback,
            ))
        });
    let mut gateway = MockGateway::new();
    gateway
        .expect_create_collect_request()
        .withf(|amount, callback_url| {
            *amount == Money::from(1000) && callback_url.contains("/payments/payment-callback?order_id=ord-")
        })
        .returning(|_, _| {
            Ok(CollectRequestCreated {
                collect_request_id: "abc123".to_string(),
                payment_url: "https://pay/abc123".to_string(),
            })
        });
    register(cfg, store, gateway);
}

#[actix_web::test]
async fn nonpositive_amounts_are_rejected_before_any_call() {
    let _ = env_logger::try_init();
    for amount in [0, -50] {
        let body = json!({"amount": amount, "student_info": {"name": "Asha"}});
        let (status, body) = post_request("/create-payment", body, configure_untouched).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("invalid request"), "{body}");
    }
}

#[actix_web::test]
async fn blank_student_names_are_rejected_before_any_call() {
    let _ = env_logger::try_init();
    let body = json!({"amount": 1000, "student_info": {"name": "   "}});
    let (status, body) = post_request("/create-payment", body, configure_untouched).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("student name"), "{body}");
}

// Neither the store nor the gateway carries any expectations: a single call to either fails the test.
fn configure_untouched(cfg: &mut ServiceConfig) {
    register(cfg, MockPaymentStore::new(), MockGateway::new());
}

#[actix_web::test]
async fn gateway_timeouts_surface_as_unavailable() {
    let _ = env_logger::try_init();
    let (status, body) = post_request("/create-payment", payment_body(), configure_gateway_down).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("gateway unavailable"), "{body}");
}

fn configure_gateway_down(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_insert_order().returning(|new| Ok(order_fixture(&new)));
    let mut gateway = MockGateway::new();
    gateway
        .expect_create_collect_request()
        .returning(|_, _| Err(GatewayError::Unavailable("connect timeout".to_string())));
    register(cfg, store, gateway);
}

#[actix_web::test]
async fn missing_payment_url_registers_the_collect_id_and_errors() {
    let _ = env_logger::try_init();
    let (status, body) = post_request("/create-payment", payment_body(), configure_missing_payment_url).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("invalid gateway response"), "{body}");
}

fn configure_missing_payment_url(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_insert_order().returning(|new| Ok(order_fixture(&new)));
    // The collect id must still be registered, or the order could never be reconciled later.
    store
        .expect_register_collect_request()
        .times(1)
        .withf(|_, collect_id, _| collect_id.as_str() == "abc123")
        .returning(|order_id, collect_id, _| {
            Ok(status_fixture(
                collect_id.as_str(),
                order_id.as_str(),
                PaymentStatus::Pending,
                Channel::Callback,
            ))
        });
    let mut gateway = MockGateway::new();
    gateway
        .expect_create_collect_request()
        .returning(|_, _| Err(GatewayError::MissingPaymentUrl { collect_request_id: "abc123".to_string() }));
    register(cfg, store, gateway);
}
