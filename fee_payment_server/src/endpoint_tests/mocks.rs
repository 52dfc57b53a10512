use collect_gateway::{CollectGateway, CollectRequestCreated, CollectStatusReport, GatewayError};
use fee_payment_engine::{
    db_types::{Channel, CollectId, NewOrder, Order, OrderId, OrderStatus, StatusUpdate, UpdateOutcome},
    PaymentStore,
    PaymentStoreError,
};
use fpg_common::Money;
use mockall::mock;
use serde_json::Value;

mock! {
    pub PaymentStore {}
    impl PaymentStore for PaymentStore {
        fn url(&self) -> &str;
        async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentStoreError>;
        async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError>;
        async fn register_collect_request(&self, order_id: &OrderId, collect_id: &CollectId, order_amount: Money) -> Result<OrderStatus, PaymentStoreError>;
        async fn fetch_status_by_collect_id(&self, collect_id: &CollectId) -> Result<Option<OrderStatus>, PaymentStoreError>;
        async fn fetch_status_by_order_id(&self, order_id: &OrderId) -> Result<Option<OrderStatus>, PaymentStoreError>;
        async fn apply_status_update(&self, collect_id: &CollectId, channel: Channel, update: StatusUpdate) -> Result<UpdateOutcome, PaymentStoreError>;
        async fn record_webhook(&self, collect_id: &CollectId, payload: &Value) -> Result<(), PaymentStoreError>;
    }
}

mock! {
    pub Gateway {}
    impl CollectGateway for Gateway {
        async fn create_collect_request(&self, amount: Money, callback_url: &str) -> Result<CollectRequestCreated, GatewayError>;
        async fn collect_status(&self, collect_request_id: &str) -> Result<CollectStatusReport, GatewayError>;
    }
}
