//! API request/response models for authentication.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::models::users::UserResponse;

/// Request body for user registration
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Ana Souza")]
    pub name: String,
    #[schema(example = "ana@example.com")]
    pub email: String,
    pub password: String,
}

/// Request body for email/password login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Google sign in. The ID token is verified server side; the other fields must agree with it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginRequest {
    pub google_token: String,
    pub google_id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Successful authentication: the user and a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

/// Registration returns 201, everything else 200.
pub struct CreatedAuthResponse(pub AuthResponse);

impl IntoResponse for CreatedAuthResponse {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self.0)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    /// Six digit code from the reset email
    #[schema(example = "042817")]
    pub code: String,
    pub new_password: String,
}

/// Expo push token registration
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveTokenRequest {
    #[schema(example = "ExponentPushToken[xxxxxxxxxxxxxxxxxxxxxx]")]
    pub token: String,
}

/// Documentation-only shape of the multipart profile update.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct ProfileUpdateForm {
    /// New display name
    pub name: Option<String>,
    /// Image file (jpeg, png, webp, gif, heic)
    #[schema(value_type = Option<String>, format = Binary)]
    pub photo: Option<Vec<u8>>,
}
