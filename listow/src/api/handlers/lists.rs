use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::json;
use tracing::info;

use crate::{
    AppState,
    api::{
        handlers::audit,
        models::{
            MessageResponse,
            lists::{CollaboratorResponse, ListCreate, ListResponse, ListSummaryResponse, ListUpdate, ShareListRequest, ShareListResponse},
            users::CurrentUser,
        },
    },
    auth::permissions::{AccessPolicy, Action, authorize_list},
    db::{
        handlers::{Collaborators, Lists, Repository, Users},
        models::{
            collaborators::GrantOutcome,
            lists::{ListCreateDBRequest, ListUpdateDBRequest},
        },
    },
    errors::Error,
    types::{CollaboratorId, ListId, normalize_email, trim_optional},
};

const NAME_MAX_CHARS: usize = 255;

fn required_name(name: &str) -> Result<String, Error> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "List name is required".to_string(),
        });
    }
    if name.chars().count() > NAME_MAX_CHARS {
        return Err(Error::BadRequest {
            message: format!("List name cannot exceed {NAME_MAX_CHARS} characters"),
        });
    }
    Ok(name.to_string())
}

/// List every list the user owns or collaborates on
///
/// Most recently active first. Activity is the later of the list's own `updated_at` and the
/// newest item's creation time.
#[utoipa::path(
    get,
    path = "/lists",
    tag = "lists",
    responses(
        (status = 200, description = "Lists visible to the user", body = [ListSummaryResponse]),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_lists(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<ListSummaryResponse>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let summaries = Lists::new(&mut conn).summaries_for_user(current_user.id).await?;

    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

/// Create a list owned by the current user
#[utoipa::path(
    post,
    path = "/lists",
    tag = "lists",
    request_body = ListCreate,
    responses(
        (status = 201, description = "List created", body = ListResponse),
        (status = 400, description = "Missing name"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_list(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ListCreate>,
) -> Result<(StatusCode, Json<ListResponse>), Error> {
    let name = required_name(&request.name)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let list = Lists::new(&mut tx)
        .create(&ListCreateDBRequest {
            name,
            description: trim_optional(request.description.as_deref()),
            owner_id: current_user.id,
        })
        .await?;
    audit(&mut tx, current_user.id, "list.create", "list", list.id, json!({ "name": list.name })).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(list.into())))
}

/// Rename a list or change its description
///
/// Open to the owner and write collaborators. A blank description clears it.
#[utoipa::path(
    put,
    path = "/lists/{id}",
    tag = "lists",
    request_body = ListUpdate,
    params(("id" = i64, Path, description = "List ID")),
    responses(
        (status = 200, description = "List updated", body = ListResponse),
        (status = 400, description = "Nothing to update, or blank name"),
        (status = 403, description = "Read-only collaborator"),
        (status = 404, description = "List not found"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_list(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ListId>,
    Json(request): Json<ListUpdate>,
) -> Result<Json<ListResponse>, Error> {
    let update = ListUpdateDBRequest {
        name: request.name.as_deref().map(required_name).transpose()?,
        description: request.description.map(|d| trim_optional(d.as_deref())),
    };
    if update.is_empty() {
        return Err(Error::BadRequest {
            message: "Nothing to update".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    authorize_list(&mut tx, current_user.id, id, Action::UpdateList, &AccessPolicy::from(&state.config)).await?;

    let list = Lists::new(&mut tx).update(id, &update).await?;
    audit(
        &mut tx,
        current_user.id,
        "list.update",
        "list",
        id,
        json!({ "name": update.name, "description_changed": update.description.is_some() }),
    )
    .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(list.into()))
}

/// Delete a list with its items and collaborators (owner only)
#[utoipa::path(
    delete,
    path = "/lists/{id}",
    tag = "lists",
    params(("id" = i64, Path, description = "List ID")),
    responses(
        (status = 200, description = "List deleted", body = MessageResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "List not found"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_list(State(state): State<AppState>, current_user: CurrentUser, Path(id): Path<ListId>) -> Result<Json<MessageResponse>, Error> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    authorize_list(&mut tx, current_user.id, id, Action::DeleteList, &AccessPolicy::from(&state.config)).await?;

    if !Lists::new(&mut tx).delete(id).await? {
        return Err(Error::NotFound {
            resource: "List".to_string(),
            id: id.to_string(),
        });
    }
    audit(&mut tx, current_user.id, "list.delete", "list", id, json!({})).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(list_id = id, "Deleted list");
    Ok(Json(MessageResponse::new("List deleted successfully")))
}

/// Share a list with another user by email (owner only)
///
/// Sharing again with a different permission updates the existing grant. Sharing again with the
/// same permission is rejected.
#[utoipa::path(
    post,
    path = "/lists/{id}/share",
    tag = "sharing",
    request_body = ShareListRequest,
    params(("id" = i64, Path, description = "List ID")),
    responses(
        (status = 200, description = "List shared", body = ShareListResponse),
        (status = 400, description = "Duplicate grant or invalid target"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "List or target user not found"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn share_list(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ListId>,
    Json(request): Json<ShareListRequest>,
) -> Result<Json<ShareListResponse>, Error> {
    let email = normalize_email(&request.email);
    if email.is_empty() {
        return Err(Error::BadRequest {
            message: "Email is required".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    authorize_list(&mut tx, current_user.id, id, Action::ManageCollaborators, &AccessPolicy::from(&state.config)).await?;

    let target = Users::new(&mut tx)
        .get_user_by_email(&email)
        .await?
        .ok_or_else(|| Error::UnknownRecipient { email: email.clone() })?;
    if target.id == current_user.id {
        return Err(Error::BadRequest {
            message: "You cannot share a list with yourself".to_string(),
        });
    }

    let (collaborator, outcome) = Collaborators::new(&mut tx).grant(id, target.id, request.permission).await?;
    let message = match outcome {
        GrantOutcome::Unchanged => {
            return Err(Error::Conflict {
                message: format!("This user already has {} access to the list", request.permission),
            });
        }
        GrantOutcome::Created => "List shared successfully",
        GrantOutcome::Updated => "Collaborator permission updated",
    };

    Lists::new(&mut tx).mark_shared(id).await?;
    audit(
        &mut tx,
        current_user.id,
        "list.share",
        "list",
        id,
        json!({ "user_id": target.id, "permission": request.permission, "updated": outcome == GrantOutcome::Updated }),
    )
    .await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let mut collaborator = CollaboratorResponse::from(collaborator);
    collaborator.name = Some(target.name);
    collaborator.email = Some(target.email);

    Ok(Json(ShareListResponse {
        message: message.to_string(),
        collaborator,
    }))
}

/// List collaborators of a list (owner only)
#[utoipa::path(
    get,
    path = "/lists/{id}/collaborators",
    tag = "sharing",
    params(("id" = i64, Path, description = "List ID")),
    responses(
        (status = 200, description = "Collaborators, oldest first", body = [CollaboratorResponse]),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "List not found"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_collaborators(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<ListId>,
) -> Result<Json<Vec<CollaboratorResponse>>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    authorize_list(&mut conn, current_user.id, id, Action::ManageCollaborators, &AccessPolicy::from(&state.config)).await?;

    let collaborators = Collaborators::new(&mut conn).list_for_list(id).await?;
    Ok(Json(collaborators.into_iter().map(Into::into).collect()))
}

/// Revoke a collaborator's access (owner only)
///
/// The list keeps `is_shared = true` even when the last collaborator is removed.
#[utoipa::path(
    delete,
    path = "/lists/{id}/collaborators/{collab_id}",
    tag = "sharing",
    params(
        ("id" = i64, Path, description = "List ID"),
        ("collab_id" = i64, Path, description = "Collaborator row ID"),
    ),
    responses(
        (status = 200, description = "Collaborator removed", body = MessageResponse),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "List or collaborator not found"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_collaborator(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((id, collab_id)): Path<(ListId, CollaboratorId)>,
) -> Result<Json<MessageResponse>, Error> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    authorize_list(&mut tx, current_user.id, id, Action::ManageCollaborators, &AccessPolicy::from(&state.config)).await?;

    if !Collaborators::new(&mut tx).remove(id, collab_id).await? {
        return Err(Error::NotFound {
            resource: "Collaborator".to_string(),
            id: collab_id.to_string(),
        });
    }
    audit(&mut tx, current_user.id, "list.unshare", "list", id, json!({ "collaborator_id": collab_id })).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(MessageResponse::new("Collaborator removed successfully")))
}
