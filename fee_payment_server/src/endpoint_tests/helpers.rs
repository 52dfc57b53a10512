use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use chrono::{TimeZone, Utc};
use collect_gateway::SignatureService;
use fee_payment_engine::db_types::{Channel, CollectId, NewOrder, Order, OrderId, OrderStatus, PaymentStatus};
use fpg_common::{Money, Secret};

use crate::config::PaymentSettings;

// Test-only signing key. DO NOT re-use anywhere.
pub const TEST_SIGNING_KEY: &str = "endpoint-test-signing-key";

pub fn test_signer() -> SignatureService {
    SignatureService::new(&Secret::new(TEST_SIGNING_KEY.to_string()))
}

pub fn test_settings() -> PaymentSettings {
    PaymentSettings {
        school_id: "SCHOOL-1".to_string(),
        gateway_name: "CollectGateway".to_string(),
        public_url: "http://fees.test:8460".to_string(),
        redirect_url: "http://frontend.test/payment-status".to_string(),
    }
}

/// The order a mocked store would return for a freshly inserted `NewOrder`.
pub fn order_fixture(new: &NewOrder) -> Order {
    Order {
        id: 1,
        order_id: new.order_id.clone(),
        school_id: new.school_id.clone(),
        initiated_by: new.initiated_by.clone(),
        student_name: new.student.name.clone(),
        student_id: new.student.student_id.clone(),
        student_email: new.student.email.clone(),
        gateway: new.gateway.clone(),
        amount: new.amount,
        currency: new.currency.clone(),
        status: PaymentStatus::Pending,
        created_at: new.created_at,
        updated_at: new.created_at,
    }
}

pub fn status_fixture(collect_id: &str, order_id: &str, status: PaymentStatus, source: Channel) -> OrderStatus {
    OrderStatus {
        collect_id: CollectId::from(collect_id),
        order_id: OrderId::from(order_id.to_string()),
        order_amount: Money::from(1000),
        transaction_amount: status.is_terminal().then(|| Money::from(1000)),
        payment_mode: None,
        payment_details: None,
        bank_reference: None,
        payment_message: None,
        status,
        source_channel: source,
        error_message: None,
        payment_time: None,
        updated_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap(),
    }
}

pub async fn get_request(path: &str, configure: fn(&mut ServiceConfig)) -> (StatusCode, String) {
    let req = TestRequest::get().uri(path).to_request();
    let service = test::init_service(App::new().configure(configure)).await;
    let res = test::call_service(&service, req).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}

pub async fn post_request(
    path: &str,
    body: serde_json::Value,
    configure: fn(&mut ServiceConfig),
) -> (StatusCode, String) {
    let req = TestRequest::post().uri(path).set_json(body).to_request();
    let service = test::init_service(App::new().configure(configure)).await;
    let res = test::call_service(&service, req).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}
