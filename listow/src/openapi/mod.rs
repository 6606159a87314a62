//! OpenAPI documentation for the HTTP API served under `/api`.
//!
//! The generated document is served by Scalar at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

use crate::{api, types};

/// Registers the `bearer` scheme referenced by the authenticated endpoints.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "bearer".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Session token returned by the register, login and Google sign in endpoints:\n\n\
                            ```\nAuthorization: Bearer YOUR_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api", description = "Listow API")
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::health::health,
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::google_login,
        api::handlers::auth::get_user,
        api::handlers::auth::me,
        api::handlers::auth::update_profile,
        api::handlers::auth::change_password,
        api::handlers::auth::save_push_token,
        api::handlers::auth::forgot_password,
        api::handlers::auth::reset_password,
        api::handlers::lists::list_lists,
        api::handlers::lists::create_list,
        api::handlers::lists::update_list,
        api::handlers::lists::delete_list,
        api::handlers::lists::share_list,
        api::handlers::lists::list_collaborators,
        api::handlers::lists::remove_collaborator,
        api::handlers::items::list_items,
        api::handlers::items::create_item,
        api::handlers::items::update_item,
        api::handlers::items::delete_item,
        api::handlers::items::toggle_item,
    ),
    components(
        schemas(
            types::CollaboratorPermission,
            api::models::MessageResponse,
            api::models::HealthResponse,
            api::models::auth::RegisterRequest,
            api::models::auth::LoginRequest,
            api::models::auth::GoogleLoginRequest,
            api::models::auth::AuthResponse,
            api::models::auth::ChangePasswordRequest,
            api::models::auth::ForgotPasswordRequest,
            api::models::auth::ResetPasswordRequest,
            api::models::auth::SaveTokenRequest,
            api::models::auth::ProfileUpdateForm,
            api::models::users::UserResponse,
            api::models::users::UserEnvelope,
            api::models::lists::ListCreate,
            api::models::lists::ListUpdate,
            api::models::lists::ListResponse,
            api::models::lists::ListSummaryResponse,
            api::models::lists::ShareListRequest,
            api::models::lists::ShareListResponse,
            api::models::lists::CollaboratorResponse,
            api::models::items::ItemCreate,
            api::models::items::ItemUpdate,
            api::models::items::ItemResponse,
        )
    ),
    tags(
        (name = "health", description = "Service liveness."),
        (name = "authentication", description = "Accounts, sessions, profiles, push tokens and password resets.

Sign in with email and password or with a Google ID token. Both return a session token that the other endpoints expect in the `Authorization` header."),
        (name = "users", description = "User profiles."),
        (name = "notifications", description = "Expo push token registration."),
        (name = "lists", description = "Shopping lists and their collaborators.

A list has one owner. The owner can share it with other registered users with `read` or `write` permission. Writers can edit the list and its items; only the owner can delete the list or manage collaborators."),
        (name = "sharing", description = "Share a list with another user by email, list its collaborators and revoke access."),
        (name = "items", description = "Items on a shopping list. Adding an item notifies the other members of the list."),
    ),
    info(
        title = "Listow API",
        version = "1.0.0",
        description = "Shared shopping lists.

## Errors

Failures return a JSON body with an `error` message. Lists and items you have no access to are reported as not found.",
    ),
)]
pub struct ApiDoc;
