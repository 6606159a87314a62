//! Database models for list collaborators.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{CollaboratorId, CollaboratorPermission, ListId, UserId};

#[derive(Debug, Clone, FromRow)]
pub struct Collaborator {
    pub id: CollaboratorId,
    pub list_id: ListId,
    pub user_id: UserId,
    pub permission: CollaboratorPermission,
    pub added_at: DateTime<Utc>,
}

/// Collaborator row joined with the collaborating user's name and email.
#[derive(Debug, Clone, FromRow)]
pub struct CollaboratorWithUser {
    pub id: CollaboratorId,
    pub list_id: ListId,
    pub user_id: UserId,
    pub permission: CollaboratorPermission,
    pub added_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
}

/// Result of granting a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    Created,
    Updated,
    Unchanged,
}
