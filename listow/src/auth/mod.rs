//! Authentication and authorization.
//!
//! Clients authenticate with a JWT passed as `Authorization: Bearer <token>`. Tokens are issued
//! by the register, login and Google endpoints and carry `{userId, email}`.
//!
//! # Modules
//!
//! - [`current_user`]: extractor resolving the bearer token into a [`CurrentUser`](crate::api::models::users::CurrentUser)
//! - [`google`]: Google ID token verification
//! - [`password`]: Argon2 hashing for passwords and reset codes
//! - [`permissions`]: owner / collaborator access rules for lists and items
//! - [`session`]: JWT creation and verification

pub mod current_user;
pub mod google;
pub mod password;
pub mod permissions;
pub mod session;
