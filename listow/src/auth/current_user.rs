//! Bearer token extractor for authenticated handlers.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{instrument, trace};

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    errors::{Error, Result},
};

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// Returns:
/// - None: no Authorization header
/// - Some(Ok(token)): a bearer token was found
/// - Some(Err(error)): the header is present but malformed
fn bearer_token(parts: &Parts) -> Option<Result<&str>> {
    let header = parts.headers.get(AUTHORIZATION)?;

    let value = match header.to_str() {
        Ok(v) => v.trim(),
        Err(_) => {
            return Some(Err(Error::Unauthenticated {
                message: Some("Invalid authorization header".to_string()),
            }));
        }
    };

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => Some(Ok(token.trim())),
        _ => Some(Err(Error::Unauthenticated {
            message: Some("Invalid authorization header".to_string()),
        })),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = match bearer_token(parts) {
            Some(token) => token?,
            None => {
                trace!("No bearer token in request");
                return Err(Error::Unauthenticated {
                    message: Some("Access token not provided".to_string()),
                });
            }
        };

        let user = session::verify_session_token(token, &state.config)?;
        trace!(user_id = user.id, "Authenticated bearer token");
        Ok(user)
    }
}
