use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Channel, CollectId, OrderId, OrderStatus, StatusUpdate},
    traits::PaymentStoreError,
};
use fpg_common::Money;

/// Creates the pending settlement record for a freshly accepted collect request.
pub async fn insert_pending(
    order_id: &OrderId,
    collect_id: &CollectId,
    order_amount: Money,
    conn: &mut SqliteConnection,
) -> Result<OrderStatus, PaymentStoreError> {
    if fetch_by_collect_id(collect_id, conn).await?.is_some() {
        return Err(PaymentStoreError::CollectRequestAlreadyRegistered(collect_id.clone()));
    }
    let record: OrderStatus = sqlx::query_as(
        r#"
            INSERT INTO order_status (collect_id, order_id, order_amount)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(collect_id.as_str())
    .bind(order_id.as_str())
    .bind(order_amount.value())
    .fetch_one(conn)
    .await?;
    debug!("📝️ Collect request [{collect_id}] registered against order [{order_id}]");
    Ok(record)
}

pub async fn fetch_by_collect_id(
    collect_id: &CollectId,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderStatus>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_status WHERE collect_id = $1")
        .bind(collect_id.as_str())
        .fetch_optional(conn)
        .await
}

pub async fn fetch_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderStatus>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_status WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await
}

// The two write shapes share the same compare-and-set guard: the row is only touched if its (status,
// source_channel) pair is still what the caller read. A miss means another channel won the race and the caller
// must re-read and re-evaluate the trust rule.
//
// The merge shape keeps existing detail fields where the update carries none; the overwrite shape replaces every
// mutable field, NULLs included. The webhook channel uses the latter — an authenticated webhook is the full
// authoritative settlement picture, not a delta.
const CAS_UPDATE_MERGE: &str = r#"
    UPDATE order_status SET
        status = $1,
        source_channel = $2,
        transaction_amount = COALESCE($3, transaction_amount),
        payment_mode = COALESCE($4, payment_mode),
        payment_details = COALESCE($5, payment_details),
        bank_reference = COALESCE($6, bank_reference),
        payment_message = COALESCE($7, payment_message),
        error_message = COALESCE($8, error_message),
        payment_time = COALESCE($9, payment_time),
        updated_at = CURRENT_TIMESTAMP
    WHERE collect_id = $10 AND status = $11 AND source_channel = $12
    RETURNING *;
"#;

const CAS_UPDATE_OVERWRITE: &str = r#"
    UPDATE order_status SET
        status = $1,
        source_channel = $2,
        transaction_amount = $3,
        payment_mode = $4,
        payment_details = $5,
        bank_reference = $6,
        payment_message = $7,
        error_message = $8,
        payment_time = $9,
        updated_at = CURRENT_TIMESTAMP
    WHERE collect_id = $10 AND status = $11 AND source_channel = $12
    RETURNING *;
"#;

/// Applies `update` through `channel`, guarded against the state the caller last read from `current`.
///
/// Returns `None` when the guard missed, i.e. a concurrent writer changed the record between the caller's read
/// and this write.
pub(crate) async fn cas_update(
    current: &OrderStatus,
    channel: Channel,
    update: &StatusUpdate,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderStatus>, PaymentStoreError> {
    let sql = if channel == Channel::Webhook { CAS_UPDATE_OVERWRITE } else { CAS_UPDATE_MERGE };
    let row: Option<OrderStatus> = sqlx::query_as(sql)
        .bind(update.status)
        .bind(channel)
        .bind(update.transaction_amount.map(|a| a.value()))
        .bind(update.payment_mode.as_deref())
        .bind(update.payment_details.as_deref())
        .bind(update.bank_reference.as_deref())
        .bind(update.payment_message.as_deref())
        .bind(update.error_message.as_deref())
        .bind(update.payment_time)
        .bind(current.collect_id.as_str())
        .bind(current.status)
        .bind(current.source_channel)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}
