//! API request/response models for shopping items.
//!
//! Quantities and prices are decimals. They serialize as strings and accept either JSON
//! numbers or strings on input.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::ToSchema;

use crate::db::models::items::ItemDBResponse;
use crate::types::{ItemId, ListId};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemCreate {
    #[schema(example = "Milk")]
    pub name: String,
    #[schema(value_type = Option<String>, example = "2")]
    pub quantity: Option<Decimal>,
    #[schema(example = "l")]
    pub unit: Option<String>,
    #[schema(value_type = Option<String>, example = "4.99")]
    pub price: Option<Decimal>,
}

/// Partial item update. Only fields present in the body are written; `null` clears a
/// nullable field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ItemUpdate {
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub quantity: Option<Option<Decimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub unit: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub price: Option<Option<Decimal>>,
    pub is_completed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemResponse {
    pub id: ItemId,
    pub list_id: ListId,
    pub name: String,
    #[schema(value_type = Option<String>)]
    pub quantity: Option<Decimal>,
    pub unit: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ItemDBResponse> for ItemResponse {
    fn from(db: ItemDBResponse) -> Self {
        Self {
            id: db.id,
            list_id: db.list_id,
            name: db.name,
            quantity: db.quantity,
            unit: db.unit,
            price: db.price,
            is_completed: db.is_completed,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_item_update_distinguishes_absent_and_null() {
        let update: ItemUpdate = serde_json::from_str(r#"{"price": null, "quantity": 3}"#).unwrap();
        assert_eq!(update.price, Some(None));
        assert_eq!(update.quantity, Some(Some(Decimal::from(3))));
        assert_eq!(update.unit, None);
        assert_eq!(update.name, None);
    }

    #[test]
    fn test_item_create_accepts_string_and_number_decimals() {
        let create: ItemCreate = serde_json::from_str(r#"{"name": "Milk", "quantity": "1.5", "price": 4.5}"#).unwrap();
        assert_eq!(create.quantity, Some(Decimal::from_str("1.5").unwrap()));
        assert_eq!(create.price, Some(Decimal::from_str("4.5").unwrap()));
        assert_eq!(create.unit, None);
    }
}
