//! Database models for Expo push tokens.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::UserId;

#[derive(Debug, Clone, FromRow)]
pub struct PushToken {
    pub id: i64,
    pub user_id: UserId,
    pub token: String,
    pub created_at: DateTime<Utc>,
}
