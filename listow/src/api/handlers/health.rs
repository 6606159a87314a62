use axum::{Json, extract::State, http::StatusCode};
use tracing::warn;

use crate::{AppState, api::models::HealthResponse};

/// Report whether the service and its database are reachable.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service and database are up", body = HealthResponse),
        (status = 503, description = "Database is unreachable", body = HealthResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "OK".to_string(),
                message: "Listow is running".to_string(),
                database: "up".to_string(),
            }),
        ),
        Err(e) => {
            warn!("Health check failed to reach the database: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "ERROR".to_string(),
                    message: "Database is unreachable".to_string(),
                    database: "down".to_string(),
                }),
            )
        }
    }
}
