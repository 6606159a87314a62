//! Database models for shopping items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::types::{ItemId, ListId};

#[derive(Debug, Clone, FromRow)]
pub struct ShoppingItem {
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

pub type ItemDBResponse = ShoppingItem;

#[derive(Debug, Clone)]
pub struct ItemCreateDBRequest {
    pub list_id: ListId,
    pub name: String,
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    pub price: Option<Decimal>,
}

/// Partial item update; only supplied fields are written. Nullable columns use a nested
/// `Option` so a client can clear them explicitly.
#[derive(Debug, Clone, Default)]
pub struct ItemUpdateDBRequest {
    pub name: Option<String>,
    pub quantity: Option<Option<Decimal>>,
    pub unit: Option<Option<String>>,
    pub price: Option<Option<Decimal>>,
    pub is_completed: Option<bool>,
}

impl ItemUpdateDBRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.quantity.is_none() && self.unit.is_none() && self.price.is_none() && self.is_completed.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ItemFilter {
    pub list_id: ListId,
}
