//! Wire types shared with the server's JSON API.
//!
//! Decimals (quantity, price) arrive as strings and are sent back as strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;

pub type UserId = i64;
pub type ListId = i64;
pub type ItemId = i64;
pub type CollaboratorId = i64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    Read,
    Write,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub google_id: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// Body of `POST /api/auth/google`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLogin {
    pub google_token: String,
    pub google_id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Photo attached to a profile update.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    /// For example `image/jpeg`
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// A list as returned by the list endpoints. The counters are only filled in by
/// `GET /api/lists`; create and update responses leave them at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShoppingList {
    pub id: ListId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub is_shared: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub total_items: i64,
    #[serde(default)]
    pub pending_items: i64,
    #[serde(default)]
    pub completed_items: i64,
    #[serde(default)]
    pub collaborators_count: i64,
    #[serde(default)]
    pub user_role: Option<String>,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub list_id: ListId,
    pub name: String,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub price: Option<Decimal>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    pub id: CollaboratorId,
    pub user_id: UserId,
    pub permission: Permission,
    pub name: Option<String>,
    pub email: Option<String>,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareResponse {
    pub message: String,
    pub collaborator: Collaborator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewList {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewList {
    /// Trimmed, with a blank description dropped. The form both sent and echoed locally.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            description: trim_optional(self.description),
        }
    }
}

/// Partial list update. `Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
}

impl NewItem {
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            unit: trim_optional(self.unit),
            ..self
        }
    }
}

fn trim_optional(value: Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Partial item update. Absent fields are left alone; `Some(None)` clears a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub quantity: Option<Option<Decimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub unit: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub price: Option<Option<Decimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
}

impl ItemChanges {
    /// Apply the changes to a local copy, the way the server would.
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(name) = &self.name {
            item.name = name.trim().to_string();
        }
        if let Some(quantity) = self.quantity {
            item.quantity = quantity;
        }
        if let Some(unit) = &self.unit {
            item.unit = trim_optional(unit.clone());
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(is_completed) = self.is_completed {
            item.is_completed = is_completed;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
    pub database: String,
}
