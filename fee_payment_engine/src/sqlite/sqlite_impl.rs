//! `SqliteDatabase` is a concrete implementation of a fee payment gateway backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements the [`crate::traits::PaymentStore`] trait.
//!
//! The one subtle piece is [`PaymentStore::apply_status_update`]: three ingestion paths can race for the same
//! settlement record, so the write is a bounded-retry compare-and-set keyed on the record's current
//! `(status, source_channel)` pair. A guard miss re-reads the record and re-evaluates the trust rule against
//! whatever the winning writer left behind.
use std::fmt::Debug;

use fpg_common::Money;
use log::*;
use serde_json::Value;
use sqlx::SqlitePool;

use super::db::{new_pool, order_status, orders, webhook_log};
use crate::{
    db_types::{Channel, CollectId, NewOrder, Order, OrderId, OrderStatus, StatusUpdate, UpdateOutcome},
    traits::{PaymentStore, PaymentStoreError},
};

/// How many guard misses to tolerate before reporting a conflict. Races are pairwise (three channels at most),
/// so a second miss on the same update means something is systematically wrong.
const MAX_UPDATE_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, PaymentStoreError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), PaymentStoreError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PaymentStoreError::DatabaseError(e.to_string()))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }
}

impl PaymentStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::insert_order(order, &mut conn).await?;
        debug!("🗃️ Order [{}] has been saved in the DB", order.order_id);
        Ok(order)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn register_collect_request(
        &self,
        order_id: &OrderId,
        collect_id: &CollectId,
        order_amount: Money,
    ) -> Result<OrderStatus, PaymentStoreError> {
        let mut tx = self.pool.begin().await?;
        orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| PaymentStoreError::OrderNotFound(order_id.clone()))?;
        let record = order_status::insert_pending(order_id, collect_id, order_amount, &mut tx).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn fetch_status_by_collect_id(
        &self,
        collect_id: &CollectId,
    ) -> Result<Option<OrderStatus>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let record = order_status::fetch_by_collect_id(collect_id, &mut conn).await?;
        Ok(record)
    }

    async fn fetch_status_by_order_id(&self, order_id: &OrderId) -> Result<Option<OrderStatus>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let record = order_status::fetch_by_order_id(order_id, &mut conn).await?;
        Ok(record)
    }

    async fn apply_status_update(
        &self,
        collect_id: &CollectId,
        channel: Channel,
        update: StatusUpdate,
    ) -> Result<UpdateOutcome, PaymentStoreError> {
        // No enclosing transaction here: the guarded UPDATE is atomic on its own, and the order mirror reads
        // the settlement status inside its own statement, so interleaved writers cannot leave the two tables
        // disagreeing.
        let mut conn = self.pool.acquire().await?;
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let current = order_status::fetch_by_collect_id(collect_id, &mut conn)
                .await?
                .ok_or_else(|| PaymentStoreError::CollectRequestNotFound(collect_id.clone()))?;
            if !channel.allows_transition(current.status, current.source_channel, update.status) {
                debug!(
                    "🗃️ {channel} may not change [{collect_id}] from {} (set via {}) to {}. Keeping the record as \
                     is.",
                    current.status, current.source_channel, update.status
                );
                return Ok(UpdateOutcome::Superseded(current));
            }
            match order_status::cas_update(&current, channel, &update, &mut conn).await? {
                Some(record) => {
                    orders::mirror_settlement_status(&record.order_id, &mut conn).await?;
                    debug!("🗃️ [{collect_id}] is now {} (via {channel})", record.status);
                    return Ok(UpdateOutcome::Applied(record));
                },
                None => {
                    trace!("🗃️ Write conflict on [{collect_id}] (attempt {attempt}). Re-reading.");
                },
            }
        }
        Err(PaymentStoreError::ConcurrentUpdateConflict(collect_id.clone()))
    }

    async fn record_webhook(&self, collect_id: &CollectId, payload: &Value) -> Result<(), PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        webhook_log::insert_webhook(collect_id, payload, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), PaymentStoreError> {
        self.pool.close().await;
        Ok(())
    }
}
