//! Access control for lists and the items inside them.
//!
//! Every list has exactly one owner; other users reach it through a collaborator grant of
//! `read` or `write`. A user's [`AccessLevel`] on a list is derived from those two facts alone,
//! and [`AccessLevel::permits`] decides which [`Action`]s it allows:
//!
//! | action                | owner | write | read          |
//! |-----------------------|-------|-------|---------------|
//! | view list / items     | yes   | yes   | yes           |
//! | edit list             | yes   | yes   | no            |
//! | create/edit/del items | yes   | yes   | no            |
//! | toggle item           | yes   | yes   | configurable  |
//! | delete list           | yes   | no    | no            |
//! | manage collaborators  | yes   | no    | no            |
//!
//! Users with no access at all get a 404, so the existence of a list is never revealed to
//! them. Users that hold some access but not enough get a 403.

use std::fmt;

use sqlx::PgConnection;
use tracing::{instrument, trace};

use crate::{
    db::handlers::{Items, Lists},
    errors::{Error, Result},
    types::{CollaboratorPermission, ItemId, ListId, UserId},
};

/// What a user may do on a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Owner,
    Write,
    Read,
    None,
}

impl AccessLevel {
    /// Derive the level from the list's owner and the requester's collaborator grant.
    pub fn resolve(requester: UserId, owner_id: UserId, grant: Option<CollaboratorPermission>) -> Self {
        if requester == owner_id {
            return AccessLevel::Owner;
        }
        match grant {
            Some(CollaboratorPermission::Write) => AccessLevel::Write,
            Some(CollaboratorPermission::Read) => AccessLevel::Read,
            None => AccessLevel::None,
        }
    }

    /// Role string reported to clients (`owner`, `write`, `read`).
    pub fn as_role(&self) -> Option<&'static str> {
        match self {
            AccessLevel::Owner => Some("owner"),
            AccessLevel::Write => Some("write"),
            AccessLevel::Read => Some("read"),
            AccessLevel::None => None,
        }
    }

    pub fn permits(&self, action: Action, policy: &AccessPolicy) -> bool {
        match (self, action) {
            (AccessLevel::None, _) => false,
            (AccessLevel::Owner, _) => true,
            (_, Action::DeleteList | Action::ManageCollaborators) => false,
            (AccessLevel::Write, _) => true,
            (AccessLevel::Read, Action::ViewList) => true,
            (AccessLevel::Read, Action::ToggleItem) => policy.read_collaborators_can_toggle,
            (AccessLevel::Read, _) => false,
        }
    }
}

/// Something a user attempts on a list or its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewList,
    UpdateList,
    DeleteList,
    ManageCollaborators,
    CreateItem,
    UpdateItem,
    DeleteItem,
    ToggleItem,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phrase = match self {
            Action::ViewList => "view this list",
            Action::UpdateList => "edit this list",
            Action::DeleteList => "delete this list",
            Action::ManageCollaborators => "manage collaborators of this list",
            Action::CreateItem => "add items to this list",
            Action::UpdateItem => "edit items in this list",
            Action::DeleteItem => "delete items from this list",
            Action::ToggleItem => "mark items in this list as completed",
        };
        f.write_str(phrase)
    }
}

/// Tunable parts of the rules above.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy {
    pub read_collaborators_can_toggle: bool,
}

impl From<&crate::config::Config> for AccessPolicy {
    fn from(config: &crate::config::Config) -> Self {
        Self {
            read_collaborators_can_toggle: config.auth.read_collaborators_can_toggle,
        }
    }
}

/// Resolve the user's access to a list and check it allows `action`.
///
/// Missing lists and lists the user cannot see both produce the same 404.
#[instrument(skip(conn, policy), err)]
pub async fn authorize_list(
    conn: &mut PgConnection,
    user_id: UserId,
    list_id: ListId,
    action: Action,
    policy: &AccessPolicy,
) -> Result<AccessLevel> {
    let row = Lists::new(conn).access_row(list_id, user_id).await?;
    let level = row
        .map(|r| AccessLevel::resolve(user_id, r.owner_id, r.permission))
        .unwrap_or(AccessLevel::None);

    trace!(?level, "Resolved list access");

    if level == AccessLevel::None {
        return Err(Error::NotFound {
            resource: "List".to_string(),
            id: list_id.to_string(),
        });
    }
    if !level.permits(action, policy) {
        return Err(Error::InsufficientPermissions {
            action,
            resource: format!("list {list_id}"),
        });
    }

    Ok(level)
}

/// Like [`authorize_list`], for the list owning `item_id`. Returns that list's id.
#[instrument(skip(conn, policy), err)]
pub async fn authorize_item(
    conn: &mut PgConnection,
    user_id: UserId,
    item_id: ItemId,
    action: Action,
    policy: &AccessPolicy,
) -> Result<ListId> {
    let not_found = || Error::NotFound {
        resource: "Item".to_string(),
        id: item_id.to_string(),
    };

    let list_id = Items::new(conn).list_id_of(item_id).await?.ok_or_else(not_found)?;

    match authorize_list(conn, user_id, list_id, action, policy).await {
        Ok(_) => Ok(list_id),
        Err(Error::NotFound { .. }) => Err(not_found()),
        Err(e) => Err(e),
    }
}
