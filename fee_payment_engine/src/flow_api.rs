use std::fmt::Debug;

use fpg_common::Money;
use log::*;
use serde_json::Value;

use crate::{
    db_types::{Channel, CollectId, NewOrder, Order, OrderId, OrderStatus, StatusUpdate, UpdateOutcome},
    traits::{PaymentStore, PaymentStoreError},
};

/// `PaymentFlowApi` is the primary API for the payment-order lifecycle: creating orders, attaching the gateway's
/// collect requests to them, and applying status assertions from the three ingestion channels.
pub struct PaymentFlowApi<B> {
    db: B,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B> PaymentFlowApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> PaymentFlowApi<B>
where B: PaymentStore
{
    /// Persist a brand-new payment intent. The order starts pending and stays that way until a settlement
    /// record attached to it says otherwise.
    pub async fn process_new_order(&self, order: NewOrder) -> Result<Order, PaymentStoreError> {
        let order = self.db.insert_order(order).await?;
        debug!("🔄️📦️ Order [{}] created for {} ({})", order.order_id, order.student_name, order.amount);
        Ok(order)
    }

    /// Record the collect request the gateway assigned to `order_id`. From here on, every status signal for the
    /// order arrives keyed by this collect id.
    pub async fn register_collect_request(
        &self,
        order_id: &OrderId,
        collect_id: &CollectId,
        order_amount: Money,
    ) -> Result<OrderStatus, PaymentStoreError> {
        let record = self.db.register_collect_request(order_id, collect_id, order_amount).await?;
        debug!("🔄️📦️ Collect request [{collect_id}] registered for order [{order_id}]");
        Ok(record)
    }

    /// Apply one channel's status assertion, subject to the monotonic-trust rule, and mirror the result onto the
    /// owning order.
    pub async fn apply_status_update(
        &self,
        channel: Channel,
        collect_id: &CollectId,
        update: StatusUpdate,
    ) -> Result<UpdateOutcome, PaymentStoreError> {
        let asserted = update.status;
        let outcome = self.db.apply_status_update(collect_id, channel, update).await?;
        match &outcome {
            UpdateOutcome::Applied(record) => {
                info!("🔄️💰️ [{collect_id}] settled as {} via {channel}", record.status);
            },
            UpdateOutcome::Superseded(record) => {
                info!(
                    "🔄️💰️ {channel} asserted {asserted} for [{collect_id}], but {} (set via {}) stands",
                    record.status, record.source_channel
                );
            },
        }
        Ok(outcome)
    }

    /// Find the settlement record for whichever identifier the caller has. The collect id is preferred; the
    /// order id is the fallback for redirects that only carry our own identifier.
    pub async fn resolve_status(
        &self,
        collect_id: Option<&CollectId>,
        order_id: Option<&OrderId>,
    ) -> Result<Option<OrderStatus>, PaymentStoreError> {
        if let Some(cid) = collect_id {
            if let Some(record) = self.db.fetch_status_by_collect_id(cid).await? {
                return Ok(Some(record));
            }
        }
        match order_id {
            Some(oid) => self.db.fetch_status_by_order_id(oid).await,
            None => Ok(None),
        }
    }

    pub async fn status_by_collect_id(
        &self,
        collect_id: &CollectId,
    ) -> Result<Option<OrderStatus>, PaymentStoreError> {
        self.db.fetch_status_by_collect_id(collect_id).await
    }

    pub async fn order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError> {
        self.db.fetch_order_by_order_id(order_id).await
    }

    /// Append a raw webhook payload to the audit log. The log is for debugging settlement disputes; failures
    /// here are the caller's to decide on.
    pub async fn record_webhook(&self, collect_id: &CollectId, payload: &Value) -> Result<(), PaymentStoreError> {
        self.db.record_webhook(collect_id, payload).await
    }
}
