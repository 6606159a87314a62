//! Database repository for shopping lists.

use std::collections::HashMap;

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::lists::{
            ListAccessRow, ListCreateDBRequest, ListDBResponse, ListFilter, ListSummary, ListUpdateDBRequest, ShoppingList,
        },
    },
    types::{ListId, UserId},
};

const LIST_COLUMNS: &str = "id, name, description, owner_id, is_shared, created_at, updated_at";

pub struct Lists<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Lists<'c> {
    type CreateRequest = ListCreateDBRequest;
    type UpdateRequest = ListUpdateDBRequest;
    type Response = ListDBResponse;
    type Id = ListId;
    type Filter = ListFilter;

    #[instrument(skip(self, request), fields(owner_id = request.owner_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let list = sqlx::query_as::<_, ShoppingList>(&format!(
            "INSERT INTO shopping_lists (name, description, owner_id) VALUES ($1, $2, $3) RETURNING {LIST_COLUMNS}"
        ))
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.owner_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(list)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let list = sqlx::query_as::<_, ShoppingList>(&format!("SELECT {LIST_COLUMNS} FROM shopping_lists WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(list)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let lists = sqlx::query_as::<_, ShoppingList>(&format!("SELECT {LIST_COLUMNS} FROM shopping_lists WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(lists.into_iter().map(|l| (l.id, l)).collect())
    }

    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let lists = sqlx::query_as::<_, ShoppingList>(&format!(
            "SELECT {LIST_COLUMNS} FROM shopping_lists WHERE ($1::BIGINT IS NULL OR owner_id = $1) ORDER BY created_at ASC, id ASC"
        ))
        .bind(filter.owner_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(lists)
    }

    /// Hard delete. Items and collaborator grants go with it through `ON DELETE CASCADE`.
    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM shopping_lists WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let list = sqlx::query_as::<_, ShoppingList>(&format!(
            r#"
            UPDATE shopping_lists SET
                name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {LIST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .bind(request.description.is_some())
        .bind(request.description.clone().flatten())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(list)
    }
}

impl<'c> Lists<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Every list the user owns or collaborates on, annotated from that user's point of view and
    /// ordered by most recent activity first.
    #[instrument(skip(self), err)]
    pub async fn summaries_for_user(&mut self, user_id: UserId) -> Result<Vec<ListSummary>> {
        let summaries = sqlx::query_as::<_, ListSummary>(
            r#"
            SELECT
                l.id, l.name, l.description, l.owner_id, l.is_shared, l.created_at, l.updated_at,
                COUNT(i.id) AS item_count,
                COUNT(i.id) FILTER (WHERE NOT i.is_completed) AS pending_count,
                COUNT(i.id) FILTER (WHERE i.is_completed) AS completed_count,
                (SELECT COUNT(*) FROM list_collaborators lc WHERE lc.list_id = l.id) AS collaborator_count,
                CASE WHEN l.owner_id = $1 THEN 'owner' ELSE c.permission::TEXT END AS user_role,
                (l.owner_id = $1) AS is_owner,
                GREATEST(l.updated_at, COALESCE(MAX(i.created_at), l.updated_at)) AS last_activity
            FROM shopping_lists l
            LEFT JOIN list_collaborators c ON c.list_id = l.id AND c.user_id = $1
            LEFT JOIN shopping_items i ON i.list_id = l.id
            WHERE l.owner_id = $1 OR c.user_id IS NOT NULL
            GROUP BY l.id, c.permission
            ORDER BY last_activity DESC, l.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(summaries)
    }

    /// Owner of the list plus the user's collaborator grant, if any. `None` when the list does
    /// not exist.
    #[instrument(skip(self), err)]
    pub async fn access_row(&mut self, list_id: ListId, user_id: UserId) -> Result<Option<ListAccessRow>> {
        let row = sqlx::query_as::<_, ListAccessRow>(
            r#"
            SELECT l.owner_id, c.permission
            FROM shopping_lists l
            LEFT JOIN list_collaborators c ON c.list_id = l.id AND c.user_id = $2
            WHERE l.id = $1
            "#,
        )
        .bind(list_id)
        .bind(user_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(row)
    }

    /// Bump the freshness marker used for "last activity" ordering.
    #[instrument(skip(self), err)]
    pub async fn touch(&mut self, list_id: ListId) -> Result<()> {
        sqlx::query("UPDATE shopping_lists SET updated_at = NOW() WHERE id = $1")
            .bind(list_id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// Flag the list as shared. The flag is never cleared again, it means "has been shared".
    #[instrument(skip(self), err)]
    pub async fn mark_shared(&mut self, list_id: ListId) -> Result<()> {
        sqlx::query("UPDATE shopping_lists SET is_shared = TRUE WHERE id = $1 AND NOT is_shared")
            .bind(list_id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Collaborators, Items};
    use crate::db::models::items::{ItemCreateDBRequest, ItemFilter};
    use crate::test_utils::create_test_user;
    use crate::types::CollaboratorPermission;
    use sqlx::PgPool;

    fn new_list(owner_id: UserId, name: &str) -> ListCreateDBRequest {
        ListCreateDBRequest {
            name: name.to_string(),
            description: None,
            owner_id,
        }
    }

    #[sqlx::test]
    async fn test_update_description_can_be_cleared(pool: PgPool) {
        let owner = create_test_user(&pool, "owner@x.com").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Lists::new(&mut conn);

        let list = repo
            .create(&ListCreateDBRequest {
                name: "Groceries".to_string(),
                description: Some("weekly".to_string()),
                owner_id: owner.id,
            })
            .await
            .unwrap();

        let renamed = repo
            .update(
                list.id,
                &ListUpdateDBRequest {
                    name: Some("Market".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Market");
        assert_eq!(renamed.description.as_deref(), Some("weekly"));

        let cleared = repo
            .update(
                list.id,
                &ListUpdateDBRequest {
                    name: None,
                    description: Some(None),
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.name, "Market");
        assert_eq!(cleared.description, None);
        assert_eq!(cleared.owner_id, owner.id);
    }

    #[sqlx::test]
    async fn test_summaries_annotate_role_and_counts(pool: PgPool) {
        let owner = create_test_user(&pool, "owner@x.com").await;
        let reader = create_test_user(&pool, "reader@x.com").await;
        let stranger = create_test_user(&pool, "stranger@x.com").await;

        let mut conn = pool.acquire().await.unwrap();
        let list = Lists::new(&mut conn).create(&new_list(owner.id, "Groceries")).await.unwrap();
        Collaborators::new(&mut conn)
            .grant(list.id, reader.id, CollaboratorPermission::Read)
            .await
            .unwrap();

        let mut items = Items::new(&mut conn);
        for name in ["milk", "eggs"] {
            items
                .create(&ItemCreateDBRequest {
                    list_id: list.id,
                    name: name.to_string(),
                    quantity: None,
                    unit: None,
                    price: None,
                })
                .await
                .unwrap();
        }
        let first = items.list(&ItemFilter { list_id: list.id }).await.unwrap()[0].clone();
        items.toggle(first.id).await.unwrap();

        let mut repo = Lists::new(&mut conn);
        let owner_view = repo.summaries_for_user(owner.id).await.unwrap();
        assert_eq!(owner_view.len(), 1);
        let summary = &owner_view[0];
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.pending_count, 1);
        assert_eq!(summary.completed_count, 1);
        assert_eq!(summary.collaborator_count, 1);
        assert_eq!(summary.user_role, "owner");
        assert!(summary.is_owner);

        let reader_view = repo.summaries_for_user(reader.id).await.unwrap();
        assert_eq!(reader_view.len(), 1);
        assert_eq!(reader_view[0].user_role, "read");
        assert!(!reader_view[0].is_owner);

        assert!(repo.summaries_for_user(stranger.id).await.unwrap().is_empty());
    }

    #[sqlx::test]
    async fn test_summaries_ordered_by_last_activity(pool: PgPool) {
        let owner = create_test_user(&pool, "owner@x.com").await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Lists::new(&mut conn);

        let older = repo.create(&new_list(owner.id, "Older")).await.unwrap();
        let newer = repo.create(&new_list(owner.id, "Newer")).await.unwrap();

        // Newest list first
        let ids: Vec<_> = repo.summaries_for_user(owner.id).await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        // Activity on the older list moves it to the top
        repo.touch(older.id).await.unwrap();
        let ids: Vec<_> = repo.summaries_for_user(owner.id).await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![older.id, newer.id]);
    }

    #[sqlx::test]
    async fn test_access_row(pool: PgPool) {
        let owner = create_test_user(&pool, "owner@x.com").await;
        let writer = create_test_user(&pool, "writer@x.com").await;
        let mut conn = pool.acquire().await.unwrap();
        let list = Lists::new(&mut conn).create(&new_list(owner.id, "Hardware")).await.unwrap();
        Collaborators::new(&mut conn)
            .grant(list.id, writer.id, CollaboratorPermission::Write)
            .await
            .unwrap();

        let mut repo = Lists::new(&mut conn);
        let row = repo.access_row(list.id, writer.id).await.unwrap().unwrap();
        assert_eq!(row.owner_id, owner.id);
        assert_eq!(row.permission, Some(CollaboratorPermission::Write));

        let row = repo.access_row(list.id, owner.id).await.unwrap().unwrap();
        assert_eq!(row.permission, None);

        assert!(repo.access_row(list.id + 1000, owner.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    async fn test_delete_cascades(pool: PgPool) {
        let owner = create_test_user(&pool, "owner@x.com").await;
        let mut conn = pool.acquire().await.unwrap();
        let list = Lists::new(&mut conn).create(&new_list(owner.id, "Party")).await.unwrap();
        let item = Items::new(&mut conn)
            .create(&ItemCreateDBRequest {
                list_id: list.id,
                name: "chips".to_string(),
                quantity: None,
                unit: None,
                price: None,
            })
            .await
            .unwrap();

        let mut repo = Lists::new(&mut conn);
        assert!(repo.delete(list.id).await.unwrap());
        assert!(repo.get_by_id(list.id).await.unwrap().is_none());
        assert!(repo.get_bulk(vec![list.id]).await.unwrap().is_empty());
        assert!(repo.list(&ListFilter { owner_id: Some(owner.id) }).await.unwrap().is_empty());
        assert!(Items::new(&mut conn).get_by_id(item.id).await.unwrap().is_none());
    }
}
