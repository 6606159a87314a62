//! Database repository for list collaborators (sharing grants).

use sqlx::{FromRow, PgConnection};
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        models::collaborators::{Collaborator, CollaboratorWithUser, GrantOutcome},
    },
    types::{CollaboratorId, CollaboratorPermission, ListId, UserId},
};

const COLLABORATOR_COLUMNS: &str = "id, list_id, user_id, permission, added_at";

#[derive(FromRow)]
struct GrantRow {
    #[sqlx(flatten)]
    collaborator: Collaborator,
    inserted: bool,
}

pub struct Collaborators<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Collaborators<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Grant `permission` to `user_id` on a list.
    ///
    /// At most one row exists per (list, user): a second grant with a different permission
    /// updates the row in place, one with the same permission changes nothing.
    #[instrument(skip(self), err)]
    pub async fn grant(
        &mut self,
        list_id: ListId,
        user_id: UserId,
        permission: CollaboratorPermission,
    ) -> Result<(Collaborator, GrantOutcome)> {
        let row = sqlx::query_as::<_, GrantRow>(&format!(
            r#"
            INSERT INTO list_collaborators (list_id, user_id, permission)
            VALUES ($1, $2, $3)
            ON CONFLICT (list_id, user_id) DO UPDATE SET permission = EXCLUDED.permission
            WHERE list_collaborators.permission IS DISTINCT FROM EXCLUDED.permission
            RETURNING {COLLABORATOR_COLUMNS}, (xmax = 0) AS inserted
            "#
        ))
        .bind(list_id)
        .bind(user_id)
        .bind(permission)
        .fetch_optional(&mut *self.db)
        .await?;

        match row {
            Some(GrantRow { collaborator, inserted: true }) => Ok((collaborator, GrantOutcome::Created)),
            Some(GrantRow { collaborator, inserted: false }) => Ok((collaborator, GrantOutcome::Updated)),
            None => {
                // Conflict with an identical grant: the row was left alone
                let existing = sqlx::query_as::<_, Collaborator>(&format!(
                    "SELECT {COLLABORATOR_COLUMNS} FROM list_collaborators WHERE list_id = $1 AND user_id = $2"
                ))
                .bind(list_id)
                .bind(user_id)
                .fetch_one(&mut *self.db)
                .await?;
                Ok((existing, GrantOutcome::Unchanged))
            }
        }
    }

    /// Collaborators of a list with their names and emails, oldest grant first.
    #[instrument(skip(self), err)]
    pub async fn list_for_list(&mut self, list_id: ListId) -> Result<Vec<CollaboratorWithUser>> {
        let collaborators = sqlx::query_as::<_, CollaboratorWithUser>(
            r#"
            SELECT c.id, c.list_id, c.user_id, c.permission, c.added_at, u.name, u.email
            FROM list_collaborators c
            JOIN users u ON u.id = c.user_id
            WHERE c.list_id = $1
            ORDER BY c.added_at ASC, c.id ASC
            "#,
        )
        .bind(list_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(collaborators)
    }

    /// Remove a grant. Returns `false` if the row does not exist or belongs to another list.
    #[instrument(skip(self), err)]
    pub async fn remove(&mut self, list_id: ListId, collaborator_id: CollaboratorId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM list_collaborators WHERE id = $1 AND list_id = $2")
            .bind(collaborator_id)
            .bind(list_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Everyone with access to the list (owner and collaborators) except `exclude`.
    #[instrument(skip(self), err)]
    pub async fn members_except(&mut self, list_id: ListId, exclude: UserId) -> Result<Vec<UserId>> {
        let members = sqlx::query_scalar::<_, UserId>(
            r#"
            SELECT owner_id FROM shopping_lists WHERE id = $1 AND owner_id <> $2
            UNION
            SELECT user_id FROM list_collaborators WHERE list_id = $1 AND user_id <> $2
            "#,
        )
        .bind(list_id)
        .bind(exclude)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(members)
    }
}
