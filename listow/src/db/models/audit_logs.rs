//! Database models for the audit trail.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;

use crate::types::UserId;

#[derive(Debug, Clone, FromRow)]
pub struct AuditLog {
    pub id: i64,
    pub user_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub details: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AuditLogCreateDBRequest {
    pub user_id: UserId,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: Option<i64>,
    pub details: Option<Value>,
}
