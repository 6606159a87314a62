//! Append-only audit trail of list and item mutations.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::{
    errors::Result,
    models::audit_logs::{AuditLog, AuditLogCreateDBRequest},
};

pub struct AuditLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> AuditLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(action = request.action, entity_id = request.entity_id), err)]
    pub async fn record(&mut self, request: &AuditLogCreateDBRequest) -> Result<()> {
        sqlx::query("INSERT INTO audit_logs (user_id, action, entity_type, entity_id, details) VALUES ($1, $2, $3, $4, $5)")
            .bind(request.user_id)
            .bind(request.action)
            .bind(request.entity_type)
            .bind(request.entity_id)
            .bind(&request.details)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// Entries for one entity, oldest first.
    #[instrument(skip(self), err)]
    pub async fn for_entity(&mut self, entity_type: &str, entity_id: i64) -> Result<Vec<AuditLog>> {
        let logs = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, user_id, action, entity_type, entity_id, details, created_at
            FROM audit_logs
            WHERE entity_type = $1 AND entity_id = $2
            ORDER BY id ASC
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(logs)
    }
}
