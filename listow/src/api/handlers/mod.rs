//! HTTP request handlers, one module per resource.

pub mod auth;
pub mod health;
pub mod items;
pub mod lists;

use sqlx::PgConnection;

use crate::{
    db::{handlers::AuditLogs, models::audit_logs::AuditLogCreateDBRequest},
    errors::Error,
    types::UserId,
};

/// Append an audit row on the handler's transaction.
pub(crate) async fn audit(
    conn: &mut PgConnection,
    user_id: UserId,
    action: &'static str,
    entity_type: &'static str,
    entity_id: i64,
    details: serde_json::Value,
) -> Result<(), Error> {
    AuditLogs::new(conn)
        .record(&AuditLogCreateDBRequest {
            user_id,
            action,
            entity_type,
            entity_id: Some(entity_id),
            details: Some(details),
        })
        .await?;
    Ok(())
}
