//! API request and response models.
//!
//! These are the JSON shapes of the HTTP API. They are kept separate from the database models
//! in [`crate::db::models`] so the wire format can differ from the storage format, for example
//! to drop password hashes or to rename count columns.

pub mod auth;
pub mod items;
pub mod lists;
pub mod users;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Plain acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Liveness report for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `OK` or `ERROR`
    pub status: String,
    pub message: String,
    /// `up` or `down`
    pub database: String,
}
