//! Database record models matching table schemas.
//!
//! Models derive `sqlx::FromRow` and are kept separate from the API models in
//! [`crate::api::models`] so storage and wire representations can evolve independently.
//!
//! - [`users`]: accounts, both password and Google based
//! - [`lists`]: shopping lists, per-user summaries and access rows
//! - [`items`]: shopping items
//! - [`collaborators`]: read/write grants on shared lists
//! - [`password_resets`]: hashed one-time recovery codes
//! - [`push_tokens`]: Expo push tokens
//! - [`audit_logs`]: append-only mutation trail

pub mod audit_logs;
pub mod collaborators;
pub mod items;
pub mod lists;
pub mod password_resets;
pub mod push_tokens;
pub mod users;
