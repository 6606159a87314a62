//! API request/response models for users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::users::UserDBResponse;
use crate::types::UserId;

/// The authenticated caller, as carried by the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
}

/// Public view of a user. Never includes the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub google_id: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            email: db.email,
            google_id: db.google_id,
            photo_url: db.photo_url,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

impl From<&UserResponse> for CurrentUser {
    fn from(user: &UserResponse) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

/// `{ "user": ... }` envelope used by the profile endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserEnvelope {
    pub user: UserResponse,
}
