//! Database models for shopping lists.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{CollaboratorPermission, ListId, UserId};

#[derive(Debug, Clone, FromRow)]
pub struct ShoppingList {
    pub id: ListId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub type ListDBResponse = ShoppingList;

#[derive(Debug, Clone)]
pub struct ListCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
}

/// Partial list update. The outer `Option` of `description` means "supplied"; the inner one
/// is the new value, so `Some(None)` clears the description.
#[derive(Debug, Clone, Default)]
pub struct ListUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

impl ListUpdateDBRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub owner_id: Option<UserId>,
}

/// A list as seen by one user: counts, the user's role and the last-activity marker.
#[derive(Debug, Clone, FromRow)]
pub struct ListSummary {
    pub id: ListId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub item_count: i64,
    pub pending_count: i64,
    pub completed_count: i64,
    pub collaborator_count: i64,
    pub user_role: String,
    pub is_owner: bool,
    pub last_activity: DateTime<Utc>,
}

/// Owner and (optional) collaborator grant of one user on one list.
#[derive(Debug, Clone, FromRow)]
pub struct ListAccessRow {
    pub owner_id: UserId,
    pub permission: Option<CollaboratorPermission>,
}
