//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! Every route is nested under `/api`:
//!
//! - **Authentication** (`/api/auth/*`): register, login, Google sign in, profile, push tokens,
//!   password change and reset
//! - **Lists** (`/api/lists/*`): list CRUD, sharing and collaborators
//! - **Items** (`/api/items/*`): item CRUD and completion toggling
//! - **Health** (`/api/health`)
//!
//! Uploaded profile photos are served outside `/api`, at `uploads.public_path`.
//!
//! # OpenAPI Documentation
//!
//! All endpoints are annotated with `utoipa`. The rendered reference is at `/docs`.

pub mod handlers;
pub mod models;
