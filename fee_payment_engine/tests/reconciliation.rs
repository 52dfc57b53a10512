//! Exercises the monotonic-trust rule end to end against a real database: three channels racing for the same
//! settlement record, with the webhook always winning and nobody able to un-settle what a higher-trust channel
//! wrote.
use fee_payment_engine::{
    db_types::{Channel, CollectId, NewOrder, PaymentStatus, StatusUpdate, StudentInfo},
    test_utils::{prepare_test_env, random_db_path},
    PaymentFlowApi,
    PaymentStoreError,
    SqliteDatabase,
};
use fpg_common::Money;

async fn fixture(amount: i64) -> (PaymentFlowApi<SqliteDatabase>, CollectId) {
    let _ = env_logger::try_init();
    let db = prepare_test_env(&random_db_path()).await;
    let api = PaymentFlowApi::new(db);
    let student = StudentInfo::with_defaults("Ravi".to_string(), None, None);
    let order = api
        .process_new_order(NewOrder::new(
            "SCHOOL-1".to_string(),
            "CollectGateway".to_string(),
            Money::from(amount),
            student,
        ))
        .await
        .expect("Error creating order");
    let collect_id = CollectId::from("abc123");
    api.register_collect_request(&order.order_id, &collect_id, order.amount).await.expect("Error registering");
    (api, collect_id)
}

fn success_webhook_update(amount: i64) -> StatusUpdate {
    let mut update = StatusUpdate::new(PaymentStatus::Success);
    update.transaction_amount = Some(Money::from(amount));
    update.payment_mode = Some("upi".to_string());
    update.bank_reference = Some("BNK001".to_string());
    update.payment_message = Some("payment success".to_string());
    update
}

#[tokio::test]
async fn callback_settles_a_pending_record() {
    let (api, collect_id) = fixture(1000).await;
    let outcome = api
        .apply_status_update(Channel::Callback, &collect_id, StatusUpdate::new(PaymentStatus::Success))
        .await
        .unwrap();
    assert!(outcome.was_applied());
    assert_eq!(outcome.record().status, PaymentStatus::Success);
    assert_eq!(outcome.record().source_channel, Channel::Callback);
}

#[tokio::test]
async fn callback_cannot_revert_a_webhook_settlement() {
    let (api, collect_id) = fixture(1000).await;
    api.apply_status_update(Channel::Webhook, &collect_id, success_webhook_update(1000)).await.unwrap();

    let outcome = api
        .apply_status_update(Channel::Callback, &collect_id, StatusUpdate::new(PaymentStatus::Failed))
        .await
        .unwrap();
    assert!(!outcome.was_applied());
    assert_eq!(outcome.record().status, PaymentStatus::Success);
    assert_eq!(outcome.record().source_channel, Channel::Webhook);

    // The stored record really is untouched.
    let record = api.status_by_collect_id(&collect_id).await.unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Success);
    assert_eq!(record.transaction_amount, Some(Money::from(1000)));
}

#[tokio::test]
async fn webhook_corrects_a_callback_guess() {
    let (api, collect_id) = fixture(1000).await;
    // The browser redirect guessed "failed" before the authoritative notification arrived.
    api.apply_status_update(Channel::Callback, &collect_id, StatusUpdate::new(PaymentStatus::Failed)).await.unwrap();

    let outcome = api.apply_status_update(Channel::Webhook, &collect_id, success_webhook_update(1000)).await.unwrap();
    assert!(outcome.was_applied());
    assert_eq!(outcome.record().status, PaymentStatus::Success);
    assert_eq!(outcome.record().transaction_amount, Some(Money::from(1000)));
}

#[tokio::test]
async fn poller_outranks_callback_but_not_webhook() {
    let (api, collect_id) = fixture(1000).await;
    api.apply_status_update(Channel::Callback, &collect_id, StatusUpdate::new(PaymentStatus::Failed)).await.unwrap();

    let outcome = api
        .apply_status_update(Channel::Poller, &collect_id, StatusUpdate::new(PaymentStatus::Success))
        .await
        .unwrap();
    assert!(outcome.was_applied(), "the poller may overwrite a callback guess");

    api.apply_status_update(Channel::Webhook, &collect_id, success_webhook_update(1000)).await.unwrap();
    let outcome = api
        .apply_status_update(Channel::Poller, &collect_id, StatusUpdate::new(PaymentStatus::Cancelled))
        .await
        .unwrap();
    assert!(!outcome.was_applied(), "the poller may not overwrite a webhook settlement");
    assert_eq!(outcome.record().status, PaymentStatus::Success);
}

#[tokio::test]
async fn webhook_delivery_is_idempotent() {
    let (api, collect_id) = fixture(1000).await;
    let first = api
        .apply_status_update(Channel::Webhook, &collect_id, success_webhook_update(990))
        .await
        .unwrap()
        .record()
        .clone();
    let second = api
        .apply_status_update(Channel::Webhook, &collect_id, success_webhook_update(990))
        .await
        .unwrap()
        .record()
        .clone();

    assert_eq!(first.status, second.status);
    assert_eq!(first.transaction_amount, second.transaction_amount);
    assert_eq!(first.payment_mode, second.payment_mode);
    assert_eq!(first.bank_reference, second.bank_reference);
    assert_eq!(first.payment_message, second.payment_message);
    assert_eq!(first.error_message, second.error_message);
}

#[tokio::test]
async fn webhook_overwrites_detail_fields_wholesale() {
    let (api, collect_id) = fixture(1000).await;
    let mut first = StatusUpdate::new(PaymentStatus::Failed);
    first.error_message = Some("insufficient funds".to_string());
    api.apply_status_update(Channel::Webhook, &collect_id, first).await.unwrap();

    // The corrected webhook carries no error message; the stale one must not linger.
    let record = api
        .apply_status_update(Channel::Webhook, &collect_id, success_webhook_update(1000))
        .await
        .unwrap()
        .record()
        .clone();
    assert_eq!(record.status, PaymentStatus::Success);
    assert!(record.error_message.is_none());
}

#[tokio::test]
async fn poller_merges_detail_fields() {
    let (api, collect_id) = fixture(1000).await;
    let mut first = StatusUpdate::new(PaymentStatus::Pending);
    first.payment_mode = Some("upi".to_string());
    api.apply_status_update(Channel::Poller, &collect_id, first).await.unwrap();

    // A later poll that carries no payment mode keeps the one already recorded.
    let record = api
        .apply_status_update(Channel::Poller, &collect_id, StatusUpdate::new(PaymentStatus::Success))
        .await
        .unwrap()
        .record()
        .clone();
    assert_eq!(record.payment_mode.as_deref(), Some("upi"));
}

#[tokio::test]
async fn unknown_collect_ids_are_reported() {
    let (api, _) = fixture(1000).await;
    let err = api
        .apply_status_update(Channel::Webhook, &CollectId::from("nope"), success_webhook_update(1))
        .await
        .expect_err("Updating an unknown collect id should fail");
    assert!(matches!(err, PaymentStoreError::CollectRequestNotFound(_)));
}

#[tokio::test]
async fn concurrent_channels_cannot_lose_the_webhook_write() {
    let (api, collect_id) = fixture(1000).await;
    let api = std::sync::Arc::new(api);

    let callback = {
        let api = api.clone();
        let cid = collect_id.clone();
        tokio::spawn(async move {
            api.apply_status_update(Channel::Callback, &cid, StatusUpdate::new(PaymentStatus::Failed)).await
        })
    };
    let poller = {
        let api = api.clone();
        let cid = collect_id.clone();
        tokio::spawn(async move {
            api.apply_status_update(Channel::Poller, &cid, StatusUpdate::new(PaymentStatus::Cancelled)).await
        })
    };
    let webhook = {
        let api = api.clone();
        let cid = collect_id.clone();
        tokio::spawn(
            async move { api.apply_status_update(Channel::Webhook, &cid, success_webhook_update(1000)).await },
        )
    };
    callback.await.unwrap().unwrap();
    poller.await.unwrap().unwrap();
    webhook.await.unwrap().unwrap();

    // Whatever the interleaving, the webhook's answer must be what survives.
    let record = api.status_by_collect_id(&collect_id).await.unwrap().unwrap();
    assert_eq!(record.status, PaymentStatus::Success);
    assert_eq!(record.source_channel, Channel::Webhook);
}
