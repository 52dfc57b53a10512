use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderId},
    traits::PaymentStoreError,
};

/// Inserts a new order into the database, erroring if the order id is already taken.
///
/// This is not atomic on its own. Embed the call inside a transaction and pass `&mut *tx` as the connection
/// argument when atomicity with other writes is needed.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, PaymentStoreError> {
    if fetch_order_by_order_id(&order.order_id, conn).await?.is_some() {
        return Err(PaymentStoreError::OrderAlreadyExists(order.order_id));
    }
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                school_id,
                initiated_by,
                student_name,
                student_id,
                student_email,
                gateway,
                amount,
                currency,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.school_id)
    .bind(order.initiated_by)
    .bind(order.student.name)
    .bind(order.student.student_id)
    .bind(order.student.email)
    .bind(order.gateway)
    .bind(order.amount.value())
    .bind(order.currency)
    .bind(order.created_at)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Order [{}] inserted with id {}", order.order_id, order.id);
    Ok(order)
}

/// Returns the order with the given `order_id`, if any.
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

/// Mirrors the owning settlement record's canonical status onto the order.
///
/// The status is read from `order_status` inside the statement itself, so the mirror always reflects the latest
/// settlement even when two channels' writes interleave with their mirror steps.
pub(crate) async fn mirror_settlement_status(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentStoreError> {
    let result: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = (SELECT status FROM order_status WHERE order_status.order_id = orders.order_id),
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $1
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await?;
    result.ok_or_else(|| PaymentStoreError::OrderNotFound(order_id.clone()))
}
