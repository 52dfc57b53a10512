use log::trace;
use serde_json::Value;
use sqlx::SqliteConnection;

use crate::{db_types::CollectId, traits::PaymentStoreError};

/// Appends one raw webhook payload to the audit log. Entries are never updated or deleted.
pub async fn insert_webhook(
    collect_id: &CollectId,
    payload: &Value,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentStoreError> {
    sqlx::query("INSERT INTO webhook_log (collect_id, payload) VALUES ($1, $2)")
        .bind(collect_id.as_str())
        .bind(payload.to_string())
        .execute(conn)
        .await?;
    trace!("📝️ Webhook payload logged for [{collect_id}]");
    Ok(())
}
