//! Database repository for shopping items.

use std::collections::HashMap;

use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::items::{ItemCreateDBRequest, ItemDBResponse, ItemFilter, ItemUpdateDBRequest, ShoppingItem},
    },
    types::{ItemId, ListId},
};

const ITEM_COLUMNS: &str = "id, list_id, name, quantity, unit, price, is_completed, created_at, updated_at";

pub struct Items<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Items<'c> {
    type CreateRequest = ItemCreateDBRequest;
    type UpdateRequest = ItemUpdateDBRequest;
    type Response = ItemDBResponse;
    type Id = ItemId;
    type Filter = ItemFilter;

    #[instrument(skip(self, request), fields(list_id = request.list_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let item = sqlx::query_as::<_, ShoppingItem>(&format!(
            r#"
            INSERT INTO shopping_items (list_id, name, quantity, unit, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(request.list_id)
        .bind(&request.name)
        .bind(request.quantity)
        .bind(&request.unit)
        .bind(request.price)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(item)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let item = sqlx::query_as::<_, ShoppingItem>(&format!("SELECT {ITEM_COLUMNS} FROM shopping_items WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(item)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let items = sqlx::query_as::<_, ShoppingItem>(&format!("SELECT {ITEM_COLUMNS} FROM shopping_items WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(items.into_iter().map(|i| (i.id, i)).collect())
    }

    /// Items of one list: incomplete first, each group in creation order.
    #[instrument(skip(self, filter), fields(list_id = filter.list_id), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let items = sqlx::query_as::<_, ShoppingItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM shopping_items WHERE list_id = $1 ORDER BY is_completed ASC, created_at ASC, id ASC"
        ))
        .bind(filter.list_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(items)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM shopping_items WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Writes only the supplied fields. Callers reject empty requests before getting here; an
    /// empty request still refreshes `updated_at`.
    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE shopping_items SET updated_at = NOW()");

        if let Some(name) = &request.name {
            query.push(", name = ").push_bind(name);
        }
        if let Some(quantity) = &request.quantity {
            query.push(", quantity = ").push_bind(*quantity);
        }
        if let Some(unit) = &request.unit {
            query.push(", unit = ").push_bind(unit.clone());
        }
        if let Some(price) = &request.price {
            query.push(", price = ").push_bind(*price);
        }
        if let Some(is_completed) = request.is_completed {
            query.push(", is_completed = ").push_bind(is_completed);
        }

        query.push(" WHERE id = ").push_bind(id);
        query.push(format!(" RETURNING {ITEM_COLUMNS}"));

        let item = query.build_query_as::<ShoppingItem>().fetch_one(&mut *self.db).await?;

        Ok(item)
    }
}

impl<'c> Items<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// The list an item belongs to, or `None` if the item does not exist.
    #[instrument(skip(self), err)]
    pub async fn list_id_of(&mut self, id: ItemId) -> Result<Option<ListId>> {
        let list_id = sqlx::query_scalar::<_, ListId>("SELECT list_id FROM shopping_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(list_id)
    }

    /// Flip completion and refresh the item's `updated_at`.
    #[instrument(skip(self), err)]
    pub async fn toggle(&mut self, id: ItemId) -> Result<ShoppingItem> {
        let item = sqlx::query_as::<_, ShoppingItem>(&format!(
            "UPDATE shopping_items SET is_completed = NOT is_completed, updated_at = NOW() WHERE id = $1 RETURNING {ITEM_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(item)
    }
}
