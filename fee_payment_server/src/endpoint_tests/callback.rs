use actix_web::{http::header, http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use collect_gateway::{CollectStatusReport, GatewayError};
use fee_payment_engine::{
    db_types::{Channel, PaymentStatus, UpdateOutcome},
    PaymentFlowApi,
};

use super::{
    helpers::{status_fixture, test_settings},
    mocks::{MockGateway, MockPaymentStore},
};
use crate::routes::PaymentCallbackRoute;

fn register(cfg: &mut ServiceConfig, store: MockPaymentStore, gateway: MockGateway) {
    cfg.app_data(web::Data::new(PaymentFlowApi::new(store)))
        .app_data(web::Data::new(gateway))
        .app_data(web::Data::new(test_settings()))
        .service(PaymentCallbackRoute::<MockPaymentStore, MockGateway>::new());
}

/// The callback responds with a redirect, so the interesting part of the response is the Location header.
async fn callback_request(path: &str, configure: fn(&mut ServiceConfig)) -> (StatusCode, Option<String>) {
    let service = test::init_service(App::new().configure(configure)).await;
    let req = TestRequest::get().uri(path).to_request();
    let res = test::call_service(&service, req).await;
    let status = res.status();
    let location = res.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()).map(String::from);
    (status, location)
}

#[actix_web::test]
async fn callbacks_without_identifiers_are_client_errors() {
    let _ = env_logger::try_init();
    let (status, location) = callback_request("/payment-callback?status=success", configure_untouched).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(location.is_none(), "a 400 short-circuits before any redirect");
}

fn configure_untouched(cfg: &mut ServiceConfig) {
    register(cfg, MockPaymentStore::new(), MockGateway::new());
}

#[actix_web::test]
async fn inline_status_settles_a_pending_record() {
    let _ = env_logger::try_init();
    let (status, location) =
        callback_request("/payment-callback?collect_request_id=abc123&status=SUCCESS", configure_inline_success).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = location.expect("redirect must carry a Location header");
    assert!(location.starts_with("http://frontend.test/payment-status?"), "{location}");
    assert!(location.contains("status=success"), "{location}");
    assert!(location.contains("collect_request_id=abc123"), "{location}");
}

fn configure_inline_success(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store
        .expect_fetch_status_by_collect_id()
        .returning(|cid| Ok(Some(status_fixture(cid.as_str(), "ord-1", PaymentStatus::Pending, Channel::Callback))));
    store
        .expect_apply_status_update()
        .withf(|_, channel, update| *channel == Channel::Callback && update.status == PaymentStatus::Success)
        .returning(|cid, channel, _| {
            Ok(UpdateOutcome::Applied(status_fixture(cid.as_str(), "ord-1", PaymentStatus::Success, channel)))
        });
    // The inline status reached a terminal state, so the poller must not be consulted.
    register(cfg, store, MockGateway::new());
}

#[actix_web::test]
async fn a_callback_without_inline_status_falls_back_to_the_poller() {
    let _ = env_logger::try_init();
    let (status, location) =
        callback_request("/payment-callback?collect_request_id=abc123", configure_poll_success).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = location.unwrap();
    assert!(location.contains("status=success"), "{location}");
}

fn configure_poll_success(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store
        .expect_fetch_status_by_collect_id()
        .returning(|cid| Ok(Some(status_fixture(cid.as_str(), "ord-1", PaymentStatus::Pending, Channel::Callback))));
    store
        .expect_apply_status_update()
        .withf(|_, channel, update| *channel == Channel::Poller && update.status == PaymentStatus::Success)
        .returning(|cid, channel, _| {
            Ok(UpdateOutcome::Applied(status_fixture(cid.as_str(), "ord-1", PaymentStatus::Success, channel)))
        });
    let mut gateway = MockGateway::new();
    gateway.expect_collect_status().returning(|_| {
        Ok(CollectStatusReport { status: "SUCCESS".to_string(), ..Default::default() })
    });
    register(cfg, store, gateway);
}

#[actix_web::test]
async fn an_inconclusive_poll_degrades_to_pending_and_still_redirects() {
    let _ = env_logger::try_init();
    let (status, location) =
        callback_request("/payment-callback?collect_request_id=abc123", configure_poll_inconclusive).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = location.unwrap();
    assert!(location.contains("status=pending"), "{location}");
}

fn configure_poll_inconclusive(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store
        .expect_fetch_status_by_collect_id()
        .returning(|cid| Ok(Some(status_fixture(cid.as_str(), "ord-1", PaymentStatus::Pending, Channel::Callback))));
    let mut gateway = MockGateway::new();
    gateway.expect_collect_status().returning(|_| Err(GatewayError::Unavailable("poll timeout".to_string())));
    register(cfg, store, gateway);
}

#[actix_web::test]
async fn a_stale_callback_cannot_revert_a_settled_record() {
    let _ = env_logger::try_init();
    let (status, location) =
        callback_request("/payment-callback?collect_request_id=abc123&status=failed", configure_superseded).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = location.unwrap();
    // The redirect reports what actually stands, not what the callback guessed.
    assert!(location.contains("status=success"), "{location}");
}

fn configure_superseded(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store
        .expect_fetch_status_by_collect_id()
        .returning(|cid| Ok(Some(status_fixture(cid.as_str(), "ord-1", PaymentStatus::Success, Channel::Webhook))));
    store
        .expect_apply_status_update()
        .withf(|_, channel, update| *channel == Channel::Callback && update.status == PaymentStatus::Failed)
        .returning(|cid, _, _| {
            Ok(UpdateOutcome::Superseded(status_fixture(cid.as_str(), "ord-1", PaymentStatus::Success, Channel::Webhook)))
        });
    register(cfg, store, MockGateway::new());
}

#[actix_web::test]
async fn unknown_identifiers_still_redirect_as_pending() {
    let _ = env_logger::try_init();
    let (status, location) =
        callback_request("/payment-callback?collect_request_id=nope&order_id=ord-nope", configure_not_found).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = location.unwrap();
    assert!(location.contains("status=pending"), "{location}");
    assert!(location.contains("order_id=ord-nope"), "{location}");
}

fn configure_not_found(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentStore::new();
    store.expect_fetch_status_by_collect_id().returning(|_| Ok(None));
    store.expect_fetch_status_by_order_id().returning(|_| Ok(None));
    register(cfg, store, MockGateway::new());
}
