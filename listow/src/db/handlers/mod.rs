//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `PgConnection` (usually a transaction), so a handler can
//! run several of them atomically:
//!
//! ```ignore
//! use listow::db::handlers::{Items, Lists, Repository};
//!
//! let mut tx = pool.begin().await?;
//! let item = Items::new(&mut tx).create(&request).await?;
//! Lists::new(&mut tx).touch(item.list_id).await?;
//! tx.commit().await?;
//! ```
//!
//! - [`Users`], [`Lists`], [`Items`]: implement [`Repository`]
//! - [`Collaborators`]: sharing grants
//! - [`PasswordResets`]: one-time recovery codes
//! - [`PushTokens`]: Expo device tokens
//! - [`AuditLogs`]: mutation trail

pub mod audit_logs;
pub mod collaborators;
pub mod items;
pub mod lists;
pub mod password_resets;
pub mod push_tokens;
pub mod repository;
pub mod users;

pub use audit_logs::AuditLogs;
pub use collaborators::Collaborators;
pub use items::Items;
pub use lists::Lists;
pub use password_resets::PasswordResets;
pub use push_tokens::PushTokens;
pub use repository::Repository;
pub use users::Users;
