use fpg_common::Money;
use serde_json::Value;
use thiserror::Error;

use crate::db_types::{Channel, CollectId, NewOrder, Order, OrderId, OrderStatus, StatusUpdate, UpdateOutcome};

/// The storage contract for the payment gateway.
///
/// This behaviour includes:
/// * Creating payment intents (orders) and the settlement records attached to them.
/// * Looking up settlement records by collect id (the hot path — it's what the gateway echoes back) and by
///   order id (the fallback when a redirect only carries our own id).
/// * Applying status updates under the monotonic-trust rule, atomically enough that concurrently delivered
///   signals for the same record cannot lose writes.
/// * Appending raw webhook payloads to the audit log.
#[allow(async_fn_in_trait)]
pub trait PaymentStore {
    /// The URL of the backing database.
    fn url(&self) -> &str;

    /// Persist a brand-new order with a pending status. Fails if the order id already exists.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentStoreError>;

    /// Fetch an order by the id this system assigned at creation.
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError>;

    /// Create the pending settlement record for a freshly created collect request.
    ///
    /// Called exactly once per collect id, straight after the gateway accepts the collect request. Fails if the
    /// collect id is already registered.
    async fn register_collect_request(
        &self,
        order_id: &OrderId,
        collect_id: &CollectId,
        order_amount: Money,
    ) -> Result<OrderStatus, PaymentStoreError>;

    /// Fetch the settlement record for a collect id.
    async fn fetch_status_by_collect_id(
        &self,
        collect_id: &CollectId,
    ) -> Result<Option<OrderStatus>, PaymentStoreError>;

    /// Fetch the settlement record owned by the given order.
    async fn fetch_status_by_order_id(&self, order_id: &OrderId) -> Result<Option<OrderStatus>, PaymentStoreError>;

    /// Apply one channel's status assertion to the settlement record for `collect_id`, and mirror the resulting
    /// canonical status onto the owning order.
    ///
    /// The write is subject to [`Channel::allows_transition`]; a rejected write returns
    /// [`UpdateOutcome::Superseded`] with the untouched record. Implementations must serialize the
    /// read-modify-write against concurrent writers for the same collect id — a plain read-then-write loses
    /// updates under concurrent delivery.
    async fn apply_status_update(
        &self,
        collect_id: &CollectId,
        channel: Channel,
        update: StatusUpdate,
    ) -> Result<UpdateOutcome, PaymentStoreError>;

    /// Append a raw webhook payload to the audit log, keyed by the collect id the delivery claims to settle.
    async fn record_webhook(&self, collect_id: &CollectId, payload: &Value) -> Result<(), PaymentStoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentStoreError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("No settlement record exists for collect request {0}")]
    CollectRequestNotFound(CollectId),
    #[error("Collect request {0} is already registered")]
    CollectRequestAlreadyRegistered(CollectId),
    #[error("Gave up applying a status update for {0} after repeated write conflicts")]
    ConcurrentUpdateConflict(CollectId),
}

impl From<sqlx::Error> for PaymentStoreError {
    fn from(e: sqlx::Error) -> Self {
        PaymentStoreError::DatabaseError(e.to_string())
    }
}
