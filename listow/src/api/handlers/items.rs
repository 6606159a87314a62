use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde_json::json;

use crate::{
    AppState,
    api::{
        handlers::audit,
        models::{
            MessageResponse,
            items::{ItemCreate, ItemResponse, ItemUpdate},
            users::CurrentUser,
        },
    },
    auth::permissions::{AccessPolicy, Action, authorize_item, authorize_list},
    db::{
        handlers::{Items, Lists, Repository},
        models::items::{ItemCreateDBRequest, ItemFilter, ItemUpdateDBRequest},
    },
    errors::Error,
    notifications::ItemAdded,
    types::{ItemId, ListId, trim_optional},
};

const NAME_MAX_CHARS: usize = 255;
const UNIT_MAX_CHARS: usize = 50;
/// Columns are NUMERIC(10, 3) and NUMERIC(10, 2).
const QUANTITY_LIMIT: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 0);
const PRICE_LIMIT: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

fn required_name(name: &str) -> Result<String, Error> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "Item name is required".to_string(),
        });
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(Error::BadRequest {
            message: format!("Item name cannot exceed {NAME_MAX_CHARS} characters"),
        });
    }
    Ok(name.to_string())
}

fn unit(value: Option<&str>) -> Result<Option<String>, Error> {
    let unit = trim_optional(value);
    if unit.as_ref().is_some_and(|u| u.chars().count() > UNIT_MAX_CHARS) {
        return Err(Error::BadRequest {
            message: format!("Unit cannot exceed {UNIT_MAX_CHARS} characters"),
        });
    }
    Ok(unit)
}

fn amount(field: &str, value: Option<Decimal>, limit: Decimal) -> Result<Option<Decimal>, Error> {
    match value {
        Some(v) if v.is_sign_negative() && !v.is_zero() => Err(Error::BadRequest {
            message: format!("{field} cannot be negative"),
        }),
        Some(v) if v >= limit => Err(Error::BadRequest {
            message: format!("{field} must be less than {limit}"),
        }),
        _ => Ok(value),
    }
}

/// Items of a list
///
/// Incomplete items first, then completed ones, each group in creation order.
#[utoipa::path(
    get,
    path = "/items/list/{list_id}",
    tag = "items",
    params(("list_id" = i64, Path, description = "List ID")),
    responses(
        (status = 200, description = "Items of the list", body = [ItemResponse]),
        (status = 404, description = "List not found"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_items(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(list_id): Path<ListId>,
) -> Result<Json<Vec<ItemResponse>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    authorize_list(&mut conn, current_user.id, list_id, Action::ViewList, &AccessPolicy::from(&state.config)).await?;

    let items = Items::new(&mut conn).list(&ItemFilter { list_id }).await?;
    Ok(Json(items.into_iter().map(Into::into).collect()))
}

/// Add an item to a list
///
/// Everyone else on the list gets a push notification once the item is stored.
#[utoipa::path(
    post,
    path = "/items/list/{list_id}",
    tag = "items",
    request_body = ItemCreate,
    params(("list_id" = i64, Path, description = "List ID")),
    responses(
        (status = 201, description = "Item created", body = ItemResponse),
        (status = 400, description = "Missing name or invalid amounts"),
        (status = 403, description = "Read-only collaborator"),
        (status = 404, description = "List not found"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(list_id): Path<ListId>,
    Json(request): Json<ItemCreate>,
) -> Result<(StatusCode, Json<ItemResponse>), Error> {
    let create = ItemCreateDBRequest {
        list_id,
        name: required_name(&request.name)?,
        quantity: amount("Quantity", request.quantity, QUANTITY_LIMIT)?,
        unit: unit(request.unit.as_deref())?,
        price: amount("Price", request.price, PRICE_LIMIT)?,
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    authorize_list(&mut tx, current_user.id, list_id, Action::CreateItem, &AccessPolicy::from(&state.config)).await?;

    let item = Items::new(&mut tx).create(&create).await?;
    let mut lists = Lists::new(&mut tx);
    lists.touch(list_id).await?;
    let list_name = lists.get_by_id(list_id).await?.map(|l| l.name).unwrap_or_default();
    audit(&mut tx, current_user.id, "item.create", "item", item.id, json!({ "list_id": list_id, "name": item.name })).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    state.notifier.item_added(
        state.db.clone(),
        ItemAdded {
            actor: current_user.id,
            list_id,
            list_name,
            item_id: item.id,
            item_name: item.name.clone(),
        },
    );

    Ok((StatusCode::CREATED, Json(item.into())))
}

/// Update some fields of an item
///
/// Only the fields present in the body are written. `null` clears quantity, unit or price.
#[utoipa::path(
    put,
    path = "/items/{id}",
    tag = "items",
    request_body = ItemUpdate,
    params(("id" = i64, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item updated", body = ItemResponse),
        (status = 400, description = "Nothing to update"),
        (status = 403, description = "Read-only collaborator"),
        (status = 404, description = "Item not found"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ItemId>,
    Json(request): Json<ItemUpdate>,
) -> Result<Json<ItemResponse>, Error> {
    let update = ItemUpdateDBRequest {
        name: request.name.as_deref().map(required_name).transpose()?,
        quantity: request.quantity.map(|q| amount("Quantity", q, QUANTITY_LIMIT)).transpose()?,
        unit: request.unit.map(|u| unit(u.as_deref())).transpose()?,
        price: request.price.map(|p| amount("Price", p, PRICE_LIMIT)).transpose()?,
        is_completed: request.is_completed,
    };
    if update.is_empty() {
        return Err(Error::BadRequest {
            message: "Nothing to update".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let list_id = authorize_item(&mut tx, current_user.id, id, Action::UpdateItem, &AccessPolicy::from(&state.config)).await?;

    let item = Items::new(&mut tx).update(id, &update).await?;
    Lists::new(&mut tx).touch(list_id).await?;
    audit(&mut tx, current_user.id, "item.update", "item", id, json!({ "list_id": list_id })).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(item.into()))
}

/// Delete an item
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tag = "items",
    params(("id" = i64, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item deleted", body = MessageResponse),
        (status = 403, description = "Read-only collaborator"),
        (status = 404, description = "Item not found"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_item(State(state): State<AppState>, current_user: CurrentUser, Path(id): Path<ItemId>) -> Result<Json<MessageResponse>, Error> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let list_id = authorize_item(&mut tx, current_user.id, id, Action::DeleteItem, &AccessPolicy::from(&state.config)).await?;

    if !Items::new(&mut tx).delete(id).await? {
        return Err(Error::NotFound {
            resource: "Item".to_string(),
            id: id.to_string(),
        });
    }
    Lists::new(&mut tx).touch(list_id).await?;
    audit(&mut tx, current_user.id, "item.delete", "item", id, json!({ "list_id": list_id })).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(MessageResponse::new("Item deleted successfully")))
}

/// Flip an item between pending and completed
#[utoipa::path(
    patch,
    path = "/items/{id}/toggle",
    tag = "items",
    params(("id" = i64, Path, description = "Item ID")),
    responses(
        (status = 200, description = "Item toggled", body = ItemResponse),
        (status = 403, description = "Not allowed to toggle items on this list"),
        (status = 404, description = "Item not found"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn toggle_item(State(state): State<AppState>, current_user: CurrentUser, Path(id): Path<ItemId>) -> Result<Json<ItemResponse>, Error> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let list_id = authorize_item(&mut tx, current_user.id, id, Action::ToggleItem, &AccessPolicy::from(&state.config)).await?;

    let item = Items::new(&mut tx).toggle(id).await?;
    Lists::new(&mut tx).touch(list_id).await?;
    audit(
        &mut tx,
        current_user.id,
        "item.toggle",
        "item",
        id,
        json!({ "list_id": list_id, "is_completed": item.is_completed }),
    )
    .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(item.into()))
}
