use fee_payment_engine::{
    db_types::{Channel, CollectId, NewOrder, OrderId, PaymentStatus, StatusUpdate, StudentInfo},
    test_utils::{prepare_test_env, random_db_path},
    PaymentFlowApi,
    PaymentStoreError,
};
use fpg_common::Money;

fn new_order(amount: i64) -> NewOrder {
    let student = StudentInfo::with_defaults("Asha".to_string(), None, None);
    NewOrder::new("SCHOOL-1".to_string(), "CollectGateway".to_string(), Money::from(amount), student)
}

#[tokio::test]
async fn order_creation_starts_pending() {
    let _ = env_logger::try_init();
    let db = prepare_test_env(&random_db_path()).await;
    let api = PaymentFlowApi::new(db);

    let order = api.process_new_order(new_order(1000)).await.expect("Error creating order");
    assert_eq!(order.status, PaymentStatus::Pending);
    assert_eq!(order.amount, Money::from(1000));
    assert_eq!(order.school_id, "SCHOOL-1");
    assert_eq!(order.currency, "INR");
    assert_eq!(order.student_name, "Asha");
    assert!(!order.student_id.is_empty());
    assert!(!order.student_email.is_empty());
}

#[tokio::test]
async fn duplicate_order_ids_are_rejected() {
    let _ = env_logger::try_init();
    let db = prepare_test_env(&random_db_path()).await;
    let api = PaymentFlowApi::new(db);

    let order = new_order(500);
    api.process_new_order(order.clone()).await.expect("Error creating order");
    let err = api.process_new_order(order).await.expect_err("Duplicate order should be rejected");
    assert!(matches!(err, PaymentStoreError::OrderAlreadyExists(_)));
}

#[tokio::test]
async fn collect_request_registration() {
    let _ = env_logger::try_init();
    let db = prepare_test_env(&random_db_path()).await;
    let api = PaymentFlowApi::new(db);

    let order = api.process_new_order(new_order(1000)).await.unwrap();
    let collect_id = CollectId::from("abc123");
    let record = api.register_collect_request(&order.order_id, &collect_id, order.amount).await.unwrap();
    assert_eq!(record.collect_id, collect_id);
    assert_eq!(record.order_id, order.order_id);
    assert_eq!(record.order_amount, Money::from(1000));
    assert_eq!(record.status, PaymentStatus::Pending);
    assert!(record.transaction_amount.is_none());

    // The collect id is the hot lookup path; the order id is the fallback.
    let by_collect = api.resolve_status(Some(&collect_id), None).await.unwrap().unwrap();
    assert_eq!(by_collect.collect_id, collect_id);
    let by_order = api.resolve_status(None, Some(&order.order_id)).await.unwrap().unwrap();
    assert_eq!(by_order.collect_id, collect_id);
}

#[tokio::test]
async fn collect_ids_register_once() {
    let _ = env_logger::try_init();
    let db = prepare_test_env(&random_db_path()).await;
    let api = PaymentFlowApi::new(db);

    let order = api.process_new_order(new_order(1000)).await.unwrap();
    let collect_id = CollectId::from("abc123");
    api.register_collect_request(&order.order_id, &collect_id, order.amount).await.unwrap();
    let err = api
        .register_collect_request(&order.order_id, &collect_id, order.amount)
        .await
        .expect_err("Second registration should be rejected");
    assert!(matches!(err, PaymentStoreError::CollectRequestAlreadyRegistered(_)));
}

#[tokio::test]
async fn collect_requests_need_an_owning_order() {
    let _ = env_logger::try_init();
    let db = prepare_test_env(&random_db_path()).await;
    let api = PaymentFlowApi::new(db);

    let err = api
        .register_collect_request(&OrderId::from("ord-missing".to_string()), &CollectId::from("abc123"), Money::from(10))
        .await
        .expect_err("Registration against a missing order should fail");
    assert!(matches!(err, PaymentStoreError::OrderNotFound(_)));
}

#[tokio::test]
async fn settlement_propagates_to_the_owning_order() {
    let _ = env_logger::try_init();
    let db = prepare_test_env(&random_db_path()).await;
    let api = PaymentFlowApi::new(db);

    let order = api.process_new_order(new_order(1000)).await.unwrap();
    let collect_id = CollectId::from("abc123");
    api.register_collect_request(&order.order_id, &collect_id, order.amount).await.unwrap();

    let mut update = StatusUpdate::new(PaymentStatus::normalize("SUCCESS"));
    update.transaction_amount = Some(Money::from(1000));
    update.payment_mode = Some("upi".to_string());
    let outcome = api.apply_status_update(Channel::Webhook, &collect_id, update).await.unwrap();
    assert!(outcome.was_applied());
    let record = outcome.record();
    assert_eq!(record.status, PaymentStatus::Success);
    assert_eq!(record.transaction_amount, Some(Money::from(1000)));

    let order = api.order_by_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, PaymentStatus::Success);
}
