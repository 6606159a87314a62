use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{HeaderMap, header},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AppState,
    api::models::{
        MessageResponse,
        auth::{
            AuthResponse, ChangePasswordRequest, CreatedAuthResponse, ForgotPasswordRequest, GoogleLoginRequest, LoginRequest,
            ProfileUpdateForm, RegisterRequest, ResetPasswordRequest, SaveTokenRequest,
        },
        users::{CurrentUser, UserEnvelope, UserResponse},
    },
    auth::{password, session},
    config::Config,
    db::{
        handlers::{PasswordResets, PushTokens, Repository, Users},
        models::users::{User, UserCreateDBRequest, UserUpdateDBRequest},
    },
    email::EmailService,
    errors::Error,
    types::{UserId, normalize_email, trim_optional},
};

const NAME_MIN_CHARS: usize = 2;
const NAME_MAX_CHARS: usize = 255;

fn validate_name(name: &str) -> Result<String, Error> {
    let name = name.trim();
    let chars = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&chars) {
        return Err(Error::BadRequest {
            message: format!("Name must be between {NAME_MIN_CHARS} and {NAME_MAX_CHARS} characters"),
        });
    }
    Ok(name.to_string())
}

/// Loose shape check: one `@`, something before it, a dotted domain after it, no whitespace.
fn validate_email(email: &str) -> Result<String, Error> {
    let email = normalize_email(email);
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(Error::BadRequest {
            message: "Invalid email address".to_string(),
        });
    }
    Ok(email)
}

fn validate_password(password: &str, config: &Config) -> Result<(), Error> {
    let password_config = &config.auth.native.password;
    let length = password.chars().count();
    if length < password_config.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters", password_config.min_length),
        });
    }
    if length > password_config.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be no more than {} characters", password_config.max_length),
        });
    }
    Ok(())
}

fn ensure_native_enabled(config: &Config) -> Result<(), Error> {
    if !config.auth.native.enabled {
        return Err(Error::BadRequest {
            message: "Native authentication is disabled".to_string(),
        });
    }
    Ok(())
}

fn auth_response(user: User, config: &Config) -> Result<AuthResponse, Error> {
    let user = UserResponse::from(user);
    let token = session::create_session_token(&CurrentUser::from(&user), config)?;
    Ok(AuthResponse { user, token })
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input or email already registered"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(request): Json<RegisterRequest>) -> Result<CreatedAuthResponse, Error> {
    ensure_native_enabled(&state.config)?;

    if !state.config.auth.native.allow_registration {
        return Err(Error::BadRequest {
            message: "User registration is disabled".to_string(),
        });
    }

    let name = validate_name(&request.name)?;
    let email = validate_email(&request.email)?;
    validate_password(&request.password, &state.config)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let mut user_repo = Users::new(&mut tx);
    if user_repo.get_user_by_email(&email).await?.is_some() {
        return Err(Error::Conflict {
            message: "An account with this email address already exists".to_string(),
        });
    }

    let password_hash = password::hash_blocking(request.password, state.config.auth.native.password.argon2_params()).await?;

    let created_user = user_repo
        .create(&UserCreateDBRequest {
            name,
            email,
            password_hash: Some(password_hash),
            google_id: None,
            photo_url: None,
        })
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    info!(user_id = created_user.id, "Registered new user");

    Ok(CreatedAuthResponse(auth_response(created_user, &state.config)?))
}

/// Login with email and password
///
/// Failed logins report `userExists`, so the app can offer registration for unknown emails.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<AuthResponse>, Error> {
    ensure_native_enabled(&state.config)?;

    if request.password.is_empty() {
        return Err(Error::BadRequest {
            message: "Password is required".to_string(),
        });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_user_by_email(&request.email)
        .await?
        .ok_or_else(|| Error::InvalidCredentials {
            message: "Invalid email or password".to_string(),
            user_exists: false,
        })?;

    let Some(password_hash) = user.password_hash.clone() else {
        return Err(Error::InvalidCredentials {
            message: "This account was created with Google. Use Google sign in.".to_string(),
            user_exists: true,
        });
    };

    if !password::verify_blocking(request.password, password_hash).await? {
        return Err(Error::InvalidCredentials {
            message: "Invalid email or password".to_string(),
            user_exists: true,
        });
    }

    Ok(Json(auth_response(user, &state.config)?))
}

/// Sign in with a Google ID token
///
/// Finds the user by Google account, then by email (linking the Google account), and otherwise
/// creates a passwordless user.
#[utoipa::path(
    post,
    path = "/auth/google",
    request_body = GoogleLoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Google sign in is disabled"),
        (status = 401, description = "Invalid Google token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn google_login(State(state): State<AppState>, Json(request): Json<GoogleLoginRequest>) -> Result<Json<AuthResponse>, Error> {
    if !state.google.enabled() {
        return Err(Error::BadRequest {
            message: "Google sign in is disabled".to_string(),
        });
    }

    let identity = state.google.verify(&request.google_token, &request.google_id, &request.email).await?;
    let photo_url = trim_optional(request.photo_url.as_deref()).or(identity.picture.clone());

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut tx);

    let user = if let Some(user) = user_repo.get_user_by_google_id(&identity.sub).await? {
        user
    } else if let Some(existing) = user_repo.get_user_by_email(&identity.email).await? {
        info!(user_id = existing.id, "Linking Google account to existing user");
        let update = UserUpdateDBRequest {
            google_id: Some(identity.sub.clone()),
            photo_url: if existing.photo_url.is_none() { photo_url } else { None },
            ..Default::default()
        };
        user_repo.update(existing.id, &update).await?
    } else {
        let name = trim_optional(Some(request.name.as_str()))
            .or(identity.name.clone())
            .unwrap_or_else(|| identity.email.clone());
        let user = user_repo
            .create(&UserCreateDBRequest {
                name,
                email: identity.email.clone(),
                password_hash: None,
                google_id: Some(identity.sub.clone()),
                photo_url,
            })
            .await?;
        info!(user_id = user.id, "Created user from Google sign in");
        user
    };

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(auth_response(user, &state.config)?))
}

/// Get a user's public profile
#[utoipa::path(
    get,
    path = "/auth/user/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserEnvelope),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "User not found"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(State(state): State<AppState>, _current_user: CurrentUser, Path(id): Path<UserId>) -> Result<Json<UserEnvelope>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: id.to_string(),
    })?;

    Ok(Json(UserEnvelope { user: user.into() }))
}

/// Get the current user's profile
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "users",
    responses(
        (status = 200, description = "Current user", body = UserEnvelope),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn me(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserEnvelope>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "User".to_string(),
            id: current_user.id.to_string(),
        })?;

    Ok(Json(UserEnvelope { user: user.into() }))
}

/// Public base URL for uploaded files, derived from the request's Host header.
fn public_base_url(headers: &HeaderMap, config: &Config) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| config.bind_address());
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .filter(|p| *p == "https" || *p == "http")
        .unwrap_or("http");

    format!("{scheme}://{host}{}", config.uploads.public_path.trim_end_matches('/'))
}

/// Write an uploaded photo to the uploads directory under a generated name.
async fn store_photo(config: &Config, content_type: &str, file_name: Option<&str>, bytes: &[u8]) -> Result<String, Error> {
    let extension = file_name
        .and_then(|f| std::path::Path::new(f).extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .filter(|e| mime_guess::from_ext(e).first().is_some_and(|m| m.type_() == mime_guess::mime::IMAGE))
        .or_else(|| mime_guess::get_mime_extensions_str(content_type).and_then(|exts| exts.first()).map(|e| e.to_string()))
        .unwrap_or_else(|| "img".to_string());

    let stored_name = format!("photo-{}.{extension}", Uuid::new_v4().simple());

    tokio::fs::create_dir_all(&config.uploads.dir).await.map_err(|e| Error::Internal {
        operation: format!("create uploads directory: {e}"),
    })?;
    tokio::fs::write(config.uploads.dir.join(&stored_name), bytes)
        .await
        .map_err(|e| Error::Internal {
            operation: format!("store uploaded photo: {e}"),
        })?;

    Ok(stored_name)
}

/// Update name and/or profile photo
#[utoipa::path(
    put,
    path = "/auth/profile",
    tag = "users",
    request_body(content = ProfileUpdateForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Profile updated", body = UserEnvelope),
        (status = 400, description = "Invalid name or photo"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    current_user: CurrentUser,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UserEnvelope>, Error> {
    let mut update = UserUpdateDBRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Invalid multipart data: {e}"),
    })? {
        match field.name() {
            Some("name") => {
                let value = field.text().await.map_err(|e| Error::BadRequest {
                    message: format!("Invalid name field: {e}"),
                })?;
                if let Some(name) = trim_optional(Some(value.as_str())) {
                    update.name = Some(validate_name(&name)?);
                }
            }
            Some("photo") => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                if !content_type.starts_with("image/") {
                    return Err(Error::BadRequest {
                        message: "Only image uploads are allowed".to_string(),
                    });
                }
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| Error::BadRequest {
                    message: format!("Invalid photo upload: {e}"),
                })?;
                if bytes.is_empty() {
                    continue;
                }
                if bytes.len() > state.config.uploads.max_bytes {
                    return Err(Error::BadRequest {
                        message: format!("Photo must be at most {} bytes", state.config.uploads.max_bytes),
                    });
                }

                let stored = store_photo(&state.config, &content_type, file_name.as_deref(), &bytes).await?;
                update.photo_url = Some(format!("{}/{stored}", public_base_url(&headers, &state.config)));
            }
            other => {
                warn!(field = ?other, "Ignoring unexpected profile field");
            }
        }
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn).update(current_user.id, &update).await?;

    Ok(Json(UserEnvelope { user: user.into() }))
}

/// Change password for the current user
#[utoipa::path(
    put,
    path = "/auth/change-password",
    request_body = ChangePasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid new password, or account has no password"),
        (status = 401, description = "Current password is incorrect"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, Error> {
    if request.current_password.is_empty() {
        return Err(Error::BadRequest {
            message: "Current password is required".to_string(),
        });
    }
    validate_password(&request.new_password, &state.config)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut user_repo = Users::new(&mut tx);

    let user = user_repo.get_by_id(current_user.id).await?.ok_or_else(|| Error::NotFound {
        resource: "User".to_string(),
        id: current_user.id.to_string(),
    })?;

    let Some(password_hash) = user.password_hash else {
        return Err(Error::BadRequest {
            message: "This account uses Google sign in and has no password to change".to_string(),
        });
    };

    if !password::verify_blocking(request.current_password, password_hash).await? {
        return Err(Error::Unauthenticated {
            message: Some("Current password is incorrect".to_string()),
        });
    }

    let new_hash = password::hash_blocking(request.new_password, state.config.auth.native.password.argon2_params()).await?;
    user_repo
        .update(
            user.id,
            &UserUpdateDBRequest {
                password_hash: Some(new_hash),
                ..Default::default()
            },
        )
        .await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// Register an Expo push token for the current user's device
#[utoipa::path(
    post,
    path = "/auth/save-token",
    request_body = SaveTokenRequest,
    tag = "notifications",
    responses(
        (status = 200, description = "Token saved", body = MessageResponse),
        (status = 400, description = "Token missing"),
    ),
    security(("bearer" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn save_push_token(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<SaveTokenRequest>,
) -> Result<Json<MessageResponse>, Error> {
    let token = request.token.trim();
    if token.is_empty() {
        return Err(Error::BadRequest {
            message: "Token is required".to_string(),
        });
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    PushTokens::new(&mut tx).save(current_user.id, token).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(MessageResponse::new("Token saved successfully")))
}

const FORGOT_PASSWORD_MESSAGE: &str = "If an account with that email exists, a reset code has been sent.";

/// Request a password reset code
///
/// Always answers with the same message, so it cannot be used to probe for accounts.
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Request accepted", body = MessageResponse),
        (status = 400, description = "Invalid email"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn forgot_password(State(state): State<AppState>, Json(request): Json<ForgotPasswordRequest>) -> Result<Json<MessageResponse>, Error> {
    ensure_native_enabled(&state.config)?;
    let email = validate_email(&request.email)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let Some(user) = Users::new(&mut tx).get_user_by_email(&email).await? else {
        return Ok(Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE)));
    };

    let (code, _reset) = PasswordResets::new(&mut tx).create_for_email(&user.email, &state.config).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    let delivery = match EmailService::new(&state.config) {
        Ok(email_service) => {
            email_service
                .send_password_reset_code(&user.email, Some(&user.name), &code, state.config.auth.native.password_reset_code_duration)
                .await
        }
        Err(e) => Err(e),
    };
    if let Err(e) = delivery {
        tracing::error!(user_id = user.id, "Failed to send password reset email: {}", e);
    }

    Ok(Json(MessageResponse::new(FORGOT_PASSWORD_MESSAGE)))
}

/// Reset a password with an emailed code
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body = ResetPasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired code, or invalid password"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn reset_password(State(state): State<AppState>, Json(request): Json<ResetPasswordRequest>) -> Result<Json<MessageResponse>, Error> {
    ensure_native_enabled(&state.config)?;
    let email = validate_email(&request.email)?;

    let code = request.code.trim();
    if !password::is_reset_code(code) {
        return Err(Error::BadRequest {
            message: format!("Code must be {} digits", password::RESET_CODE_LENGTH),
        });
    }
    validate_password(&request.new_password, &state.config)?;

    let invalid_code = || Error::BadRequest {
        message: "Invalid or expired code".to_string(),
    };

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let reset = PasswordResets::new(&mut tx)
        .find_valid_code(&email, code)
        .await?
        .ok_or_else(invalid_code)?;
    let user = Users::new(&mut tx).get_user_by_email(&email).await?.ok_or_else(invalid_code)?;

    let new_hash = password::hash_blocking(request.new_password, state.config.auth.native.password.argon2_params()).await?;
    Users::new(&mut tx)
        .update(
            user.id,
            &UserUpdateDBRequest {
                password_hash: Some(new_hash),
                ..Default::default()
            },
        )
        .await?;
    PasswordResets::new(&mut tx).mark_used(reset.id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    info!(user_id = user.id, "Password reset with emailed code");

    Ok(Json(MessageResponse::new("Password has been reset successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{add_auth_headers, create_test_config, create_test_state, create_test_user, create_test_user_with_password};
    use axum::routing::{get, post, put};
    use axum_test::TestServer;
    use axum_test::multipart::{MultipartForm, Part};
    use sqlx::PgPool;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn auth_router(state: AppState) -> axum::Router {
        axum::Router::new()
            .route("/auth/register", post(register))
            .route("/auth/login", post(login))
            .route("/auth/google", post(google_login))
            .route("/auth/user/{id}", get(get_user))
            .route("/auth/me", get(me))
            .route("/auth/profile", put(update_profile))
            .route("/auth/change-password", put(change_password))
            .route("/auth/save-token", post(save_push_token))
            .route("/auth/forgot-password", post(forgot_password))
            .route("/auth/reset-password", post(reset_password))
            .with_state(state)
    }

    fn server(pool: PgPool, config: Config) -> TestServer {
        TestServer::new(auth_router(create_test_state(pool, config))).unwrap()
    }

    fn register_request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ana Souza".to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email(" A@X.com ").unwrap(), "a@x.com");
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@x.com").is_err());
        assert!(validate_email("a@localhost").is_err());
        assert!(validate_email("a b@x.com").is_err());
        assert!(validate_email("a@@x.com").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Jo ").unwrap(), "Jo");
        assert!(validate_name("J").is_err());
        assert!(validate_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn test_public_base_url() {
        let config = create_test_config();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "api.listow.app".parse().unwrap());
        assert_eq!(public_base_url(&headers, &config), "http://api.listow.app/uploads");

        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        assert_eq!(public_base_url(&headers, &config), "https://api.listow.app/uploads");
    }

    #[sqlx::test]
    async fn test_register_then_login(pool: PgPool) {
        let server = server(pool, create_test_config());

        let response = server.post("/auth/register").json(&register_request("a@x.com", "secret1")).await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body: AuthResponse = response.json();
        assert_eq!(body.user.email, "a@x.com");
        assert!(!body.token.is_empty());

        let response = server
            .post("/auth/login")
            .json(&LoginRequest {
                email: "a@x.com".to_string(),
                password: "secret1".to_string(),
            })
            .await;
        response.assert_status_ok();
        let body: AuthResponse = response.json();
        assert_eq!(body.user.email, "a@x.com");
        assert!(!body.token.is_empty());
    }

    #[sqlx::test]
    async fn test_login_failures_report_user_exists(pool: PgPool) {
        let server = server(pool, create_test_config());
        server
            .post("/auth/register")
            .json(&register_request("a@x.com", "secret1"))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let wrong_password = server
            .post("/auth/login")
            .json(&LoginRequest {
                email: "a@x.com".to_string(),
                password: "wrong-password".to_string(),
            })
            .await;
        wrong_password.assert_status_unauthorized();
        let body: serde_json::Value = wrong_password.json();
        assert_eq!(body["userExists"], true);

        let unknown = server
            .post("/auth/login")
            .json(&LoginRequest {
                email: "nobody@x.com".to_string(),
                password: "secret1".to_string(),
            })
            .await;
        unknown.assert_status_unauthorized();
        let body: serde_json::Value = unknown.json();
        assert_eq!(body["userExists"], false);
    }

    #[sqlx::test]
    async fn test_login_google_only_account(pool: PgPool) {
        create_test_user(&pool, "g@x.com").await;
        let server = server(pool, create_test_config());

        let response = server
            .post("/auth/login")
            .json(&LoginRequest {
                email: "g@x.com".to_string(),
                password: "whatever".to_string(),
            })
            .await;
        response.assert_status_unauthorized();
        let body: serde_json::Value = response.json();
        assert_eq!(body["userExists"], true);
        assert!(body["error"].as_str().unwrap().contains("Google"));
    }

    #[sqlx::test]
    async fn test_register_validation(pool: PgPool) {
        let server = server(pool, create_test_config());

        let short_password = server.post("/auth/register").json(&register_request("a@x.com", "12345")).await;
        short_password.assert_status_bad_request();
        let body: serde_json::Value = short_password.json();
        assert_eq!(body["error"], "Password must be at least 6 characters");

        server
            .post("/auth/register")
            .json(&register_request("not-an-email", "secret1"))
            .await
            .assert_status_bad_request();

        server
            .post("/auth/register")
            .json(&RegisterRequest {
                name: " A ".to_string(),
                email: "a@x.com".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .assert_status_bad_request();

        server
            .post("/auth/register")
            .json(&register_request("a@x.com", "secret1"))
            .await
            .assert_status(axum::http::StatusCode::CREATED);
        // Emails are case-insensitive
        let duplicate = server.post("/auth/register").json(&register_request("A@X.COM", "secret1")).await;
        duplicate.assert_status_bad_request();
        let body: serde_json::Value = duplicate.json();
        assert_eq!(body["error"], "An account with this email address already exists");
    }

    #[sqlx::test]
    async fn test_register_disabled(pool: PgPool) {
        let mut config = create_test_config();
        config.auth.native.allow_registration = false;
        let server = server(pool, config);

        server
            .post("/auth/register")
            .json(&register_request("a@x.com", "secret1"))
            .await
            .assert_status_bad_request();
    }

    #[sqlx::test]
    async fn test_get_user_requires_token_and_hides_hash(pool: PgPool) {
        let config = create_test_config();
        let user = create_test_user_with_password(&pool, "a@x.com", "secret1", &config).await;
        let other = create_test_user(&pool, "b@x.com").await;
        let headers = add_auth_headers(&user, &config);
        let server = server(pool, config);

        server.get(&format!("/auth/user/{}", other.id)).await.assert_status_unauthorized();

        let response = server
            .get(&format!("/auth/user/{}", other.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["user"]["email"], "b@x.com");
        assert!(body["user"].get("password_hash").is_none());

        server
            .get("/auth/user/999999")
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .assert_status_not_found();

        let response = server.get("/auth/me").add_header(&headers[0].0, &headers[0].1).await;
        response.assert_status_ok();
        let body: UserEnvelope = response.json();
        assert_eq!(body.user.id, user.id);
    }

    #[sqlx::test]
    async fn test_update_profile_with_photo(pool: PgPool) {
        let config = create_test_config();
        let uploads_dir = config.uploads.dir.clone();
        let user = create_test_user(&pool, "a@x.com").await;
        let headers = add_auth_headers(&user, &config);
        let server = server(pool, config);

        let photo = Part::bytes(vec![0x89, b'P', b'N', b'G']).file_name("me.png").mime_type("image/png");
        let response = server
            .put("/auth/profile")
            .add_header(&headers[0].0, &headers[0].1)
            .add_header("host", "api.listow.test")
            .multipart(MultipartForm::new().add_text("name", "  New Name ").add_part("photo", photo))
            .await;
        response.assert_status_ok();

        let body: UserEnvelope = response.json();
        assert_eq!(body.user.name, "New Name");
        let photo_url = body.user.photo_url.unwrap();
        assert!(photo_url.starts_with("http://api.listow.test/uploads/photo-"), "{photo_url}");
        assert!(photo_url.ends_with(".png"));

        let file_name = photo_url.rsplit('/').next().unwrap();
        assert!(uploads_dir.join(file_name).exists());
    }

    #[sqlx::test]
    async fn test_update_profile_rejects_non_images(pool: PgPool) {
        let config = create_test_config();
        let user = create_test_user(&pool, "a@x.com").await;
        let headers = add_auth_headers(&user, &config);
        let server = server(pool, config);

        let file = Part::bytes(b"#!/bin/sh".to_vec()).file_name("run.sh").mime_type("text/x-shellscript");
        server
            .put("/auth/profile")
            .add_header(&headers[0].0, &headers[0].1)
            .multipart(MultipartForm::new().add_part("photo", file))
            .await
            .assert_status_bad_request();
    }

    #[sqlx::test]
    async fn test_change_password(pool: PgPool) {
        let config = create_test_config();
        let user = create_test_user_with_password(&pool, "a@x.com", "secret1", &config).await;
        let google_user = create_test_user(&pool, "g@x.com").await;
        let headers = add_auth_headers(&user, &config);
        let google_headers = add_auth_headers(&google_user, &config);
        let server = server(pool, config);

        let wrong = server
            .put("/auth/change-password")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&ChangePasswordRequest {
                current_password: "nope-nope".to_string(),
                new_password: "secret2".to_string(),
            })
            .await;
        wrong.assert_status_unauthorized();

        server
            .put("/auth/change-password")
            .add_header(&google_headers[0].0, &google_headers[0].1)
            .json(&ChangePasswordRequest {
                current_password: "anything".to_string(),
                new_password: "secret2".to_string(),
            })
            .await
            .assert_status_bad_request();

        server
            .put("/auth/change-password")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&ChangePasswordRequest {
                current_password: "secret1".to_string(),
                new_password: "secret2".to_string(),
            })
            .await
            .assert_status_ok();

        server
            .post("/auth/login")
            .json(&LoginRequest {
                email: "a@x.com".to_string(),
                password: "secret2".to_string(),
            })
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    async fn test_save_push_token(pool: PgPool) {
        let config = create_test_config();
        let user = create_test_user(&pool, "a@x.com").await;
        let headers = add_auth_headers(&user, &config);
        let server = server(pool.clone(), config);

        server
            .post("/auth/save-token")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&SaveTokenRequest { token: "  ".to_string() })
            .await
            .assert_status_bad_request();

        server
            .post("/auth/save-token")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&SaveTokenRequest {
                token: "ExponentPushToken[abc]".to_string(),
            })
            .await
            .assert_status_ok();

        let mut conn = pool.acquire().await.unwrap();
        let tokens = PushTokens::new(&mut conn).for_users(&[user.id]).await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].token, "ExponentPushToken[abc]");
    }

    /// Latest reset code from the file transport's output.
    fn last_mailed_code(config: &Config) -> String {
        let crate::config::EmailTransportConfig::File { path } = &config.email.transport else {
            panic!("tests use the file transport");
        };
        let newest = std::fs::read_dir(path)
            .unwrap()
            .filter_map(|e| e.ok())
            .max_by_key(|e| e.metadata().unwrap().modified().unwrap())
            .unwrap();
        let contents = std::fs::read_to_string(newest.path()).unwrap();
        let start = contents.find("class=3D\"code\">").map(|i| i + "class=3D\"code\">".len()).or_else(|| {
            contents.find("class=\"code\">").map(|i| i + "class=\"code\">".len())
        });
        contents[start.unwrap()..].chars().take(password::RESET_CODE_LENGTH).collect()
    }

    #[sqlx::test]
    async fn test_forgot_password_does_not_reveal_accounts(pool: PgPool) {
        let server = server(pool, create_test_config());

        let response = server
            .post("/auth/forgot-password")
            .json(&ForgotPasswordRequest {
                email: "nobody@x.com".to_string(),
            })
            .await;
        response.assert_status_ok();
        let body: MessageResponse = response.json();
        assert_eq!(body.message, FORGOT_PASSWORD_MESSAGE);
    }

    #[sqlx::test]
    async fn test_password_reset_flow(pool: PgPool) {
        let mut config = create_test_config();
        let mail_dir = tempfile::tempdir().unwrap();
        config.email.transport = crate::config::EmailTransportConfig::File {
            path: mail_dir.path().to_string_lossy().into_owned(),
        };
        create_test_user_with_password(&pool, "a@x.com", "secret1", &config).await;
        let server = server(pool.clone(), config.clone());

        server
            .post("/auth/forgot-password")
            .json(&ForgotPasswordRequest {
                email: "a@x.com".to_string(),
            })
            .await
            .assert_status_ok();
        let first_code = last_mailed_code(&config);
        assert!(password::is_reset_code(&first_code), "{first_code}");

        // A second request invalidates the first code
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        server
            .post("/auth/forgot-password")
            .json(&ForgotPasswordRequest {
                email: "a@x.com".to_string(),
            })
            .await
            .assert_status_ok();
        let second_code = last_mailed_code(&config);

        if first_code != second_code {
            let stale = server
                .post("/auth/reset-password")
                .json(&ResetPasswordRequest {
                    email: "a@x.com".to_string(),
                    code: first_code,
                    new_password: "newsecret".to_string(),
                })
                .await;
            stale.assert_status_bad_request();
            let body: serde_json::Value = stale.json();
            assert_eq!(body["error"], "Invalid or expired code");
        }

        server
            .post("/auth/reset-password")
            .json(&ResetPasswordRequest {
                email: "a@x.com".to_string(),
                code: second_code.clone(),
                new_password: "newsecret".to_string(),
            })
            .await
            .assert_status_ok();

        // Codes are single use
        server
            .post("/auth/reset-password")
            .json(&ResetPasswordRequest {
                email: "a@x.com".to_string(),
                code: second_code,
                new_password: "another1".to_string(),
            })
            .await
            .assert_status_bad_request();

        server
            .post("/auth/login")
            .json(&LoginRequest {
                email: "a@x.com".to_string(),
                password: "newsecret".to_string(),
            })
            .await
            .assert_status_ok();
    }

    #[sqlx::test]
    async fn test_reset_code_expires(pool: PgPool) {
        let mut config = create_test_config();
        let mail_dir = tempfile::tempdir().unwrap();
        config.email.transport = crate::config::EmailTransportConfig::File {
            path: mail_dir.path().to_string_lossy().into_owned(),
        };
        create_test_user_with_password(&pool, "a@x.com", "secret1", &config).await;
        let server = server(pool.clone(), config.clone());

        server
            .post("/auth/forgot-password")
            .json(&ForgotPasswordRequest {
                email: "a@x.com".to_string(),
            })
            .await
            .assert_status_ok();
        let code = last_mailed_code(&config);

        // Issued 15 minutes and one second ago
        sqlx::query("UPDATE password_resets SET expires_at = NOW() - INTERVAL '1 second' WHERE email = $1")
            .bind("a@x.com")
            .execute(&pool)
            .await
            .unwrap();

        let response = server
            .post("/auth/reset-password")
            .json(&ResetPasswordRequest {
                email: "a@x.com".to_string(),
                code,
                new_password: "newsecret".to_string(),
            })
            .await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Invalid or expired code");
    }

    #[sqlx::test]
    async fn test_reset_password_rejects_malformed_code(pool: PgPool) {
        let server = server(pool, create_test_config());

        let response = server
            .post("/auth/reset-password")
            .json(&ResetPasswordRequest {
                email: "a@x.com".to_string(),
                code: "12ab".to_string(),
                new_password: "newsecret".to_string(),
            })
            .await;
        response.assert_status_bad_request();
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "Code must be 6 digits");
    }

    async fn google_config(server: &MockServer) -> Config {
        let mut config = create_test_config();
        config.auth.google.enabled = true;
        config.auth.google.client_ids = vec!["web-client".to_string()];
        config.auth.google.tokeninfo_url = format!("{}/tokeninfo", server.uri()).parse().unwrap();
        config
    }

    #[sqlx::test]
    async fn test_google_login_links_existing_account(pool: PgPool) {
        let google = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .and(query_param("id_token", "good-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "aud": "web-client",
                "sub": "google-123",
                "email": "a@x.com",
                "name": "Ana",
                "picture": "https://lh3.example/photo.jpg"
            })))
            .mount(&google)
            .await;

        let config = google_config(&google).await;
        let existing = create_test_user_with_password(&pool, "a@x.com", "secret1", &config).await;
        let server = server(pool, config);

        let request = GoogleLoginRequest {
            google_token: "good-token".to_string(),
            google_id: "google-123".to_string(),
            email: "A@x.com".to_string(),
            name: "Ana".to_string(),
            photo_url: None,
        };
        let response = server.post("/auth/google").json(&request).await;
        response.assert_status_ok();
        let body: AuthResponse = response.json();
        assert_eq!(body.user.id, existing.id);
        assert_eq!(body.user.google_id.as_deref(), Some("google-123"));
        assert_eq!(body.user.photo_url.as_deref(), Some("https://lh3.example/photo.jpg"));

        // Second login finds the user by Google id
        let response = server.post("/auth/google").json(&request).await;
        response.assert_status_ok();
        let body: AuthResponse = response.json();
        assert_eq!(body.user.id, existing.id);
    }

    #[sqlx::test]
    async fn test_google_login_creates_user_and_rejects_mismatch(pool: PgPool) {
        let google = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "aud": "web-client",
                "sub": "google-999",
                "email": "new@x.com"
            })))
            .mount(&google)
            .await;

        let server = server(pool, google_config(&google).await);

        let response = server
            .post("/auth/google")
            .json(&GoogleLoginRequest {
                google_token: "token".to_string(),
                google_id: "google-999".to_string(),
                email: "new@x.com".to_string(),
                name: "New Person".to_string(),
                photo_url: None,
            })
            .await;
        response.assert_status_ok();
        let body: AuthResponse = response.json();
        assert_eq!(body.user.name, "New Person");
        assert_eq!(body.user.email, "new@x.com");

        server
            .post("/auth/google")
            .json(&GoogleLoginRequest {
                google_token: "token".to_string(),
                google_id: "someone-else".to_string(),
                email: "new@x.com".to_string(),
                name: "New Person".to_string(),
                photo_url: None,
            })
            .await
            .assert_status_unauthorized();
    }

    #[sqlx::test]
    async fn test_google_login_disabled(pool: PgPool) {
        let server = server(pool, create_test_config());

        server
            .post("/auth/google")
            .json(&GoogleLoginRequest {
                google_token: "t".to_string(),
                google_id: "g".to_string(),
                email: "a@x.com".to_string(),
                name: "A".to_string(),
                photo_url: None,
            })
            .await
            .assert_status_bad_request();
    }
}
