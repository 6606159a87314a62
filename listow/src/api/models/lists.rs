//! API request/response models for shopping lists and sharing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::ToSchema;

use crate::api::models::items::ItemResponse;
use crate::db::models::{
    collaborators::{Collaborator, CollaboratorWithUser},
    lists::{ListDBResponse, ListSummary},
};
use crate::types::{CollaboratorId, CollaboratorPermission, ListId, UserId};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListCreate {
    #[schema(example = "Weekly groceries")]
    pub name: String,
    pub description: Option<String>,
}

/// Partial list update. At least one field must be present. An empty or `null` description
/// clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ListUpdate {
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
}

/// A list as returned by create/update. `items` and `collaborators` are always empty here;
/// clients load them through their own endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListResponse {
    pub id: ListId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<ItemResponse>,
    pub collaborators: Vec<CollaboratorResponse>,
}

impl From<ListDBResponse> for ListResponse {
    fn from(db: ListDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            owner_id: db.owner_id,
            is_shared: db.is_shared,
            created_at: db.created_at,
            updated_at: db.updated_at,
            items: Vec::new(),
            collaborators: Vec::new(),
        }
    }
}

/// A list from the caller's point of view, as returned by `GET /api/lists`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListSummaryResponse {
    pub id: ListId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_items: i64,
    pub pending_items: i64,
    pub completed_items: i64,
    pub collaborators_count: i64,
    /// `owner`, `write` or `read`
    pub user_role: String,
    pub is_owner: bool,
    /// Latest of the list's `updated_at` and its newest item's `created_at`
    pub last_activity: DateTime<Utc>,
    pub items: Vec<ItemResponse>,
    pub collaborators: Vec<CollaboratorResponse>,
}

impl From<ListSummary> for ListSummaryResponse {
    fn from(s: ListSummary) -> Self {
        Self {
            id: s.id,
            name: s.name,
            description: s.description,
            owner_id: s.owner_id,
            is_shared: s.is_shared,
            created_at: s.created_at,
            updated_at: s.updated_at,
            total_items: s.item_count,
            pending_items: s.pending_count,
            completed_items: s.completed_count,
            collaborators_count: s.collaborator_count,
            user_role: s.user_role,
            is_owner: s.is_owner,
            last_activity: s.last_activity,
            items: Vec::new(),
            collaborators: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShareListRequest {
    #[schema(example = "friend@example.com")]
    pub email: String,
    /// Defaults to `read`
    #[serde(default)]
    pub permission: CollaboratorPermission,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShareListResponse {
    pub message: String,
    pub collaborator: CollaboratorResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CollaboratorResponse {
    pub id: CollaboratorId,
    pub user_id: UserId,
    pub permission: CollaboratorPermission,
    pub name: Option<String>,
    pub email: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl From<CollaboratorWithUser> for CollaboratorResponse {
    fn from(c: CollaboratorWithUser) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            permission: c.permission,
            name: Some(c.name),
            email: Some(c.email),
            added_at: c.added_at,
        }
    }
}

impl From<Collaborator> for CollaboratorResponse {
    fn from(c: Collaborator) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            permission: c.permission,
            name: None,
            email: None,
            added_at: c.added_at,
        }
    }
}
