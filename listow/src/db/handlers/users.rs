//! Database repository for users.

use std::collections::HashMap;

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::users::{User, UserCreateDBRequest, UserDBResponse, UserFilter, UserUpdateDBRequest},
    },
    types::{UserId, normalize_email},
};

const USER_COLUMNS: &str = "id, name, email, password_hash, google_id, photo_url, created_at, updated_at";

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;
    type Filter = UserFilter;

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, google_id, photo_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(request.name.trim())
        .bind(normalize_email(&request.email))
        .bind(&request.password_hash)
        .bind(&request.google_id)
        .bind(&request.photo_url)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"))
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users.into_iter().map(|u| (u.id, u)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(users)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                photo_url = COALESCE($3, photo_url),
                password_hash = COALESCE($4, password_hash),
                google_id = COALESCE($5, google_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.name.as_deref().map(str::trim))
        .bind(&request.photo_url)
        .bind(&request.password_hash)
        .bind(&request.google_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Look up a user by email. The address is normalized first, so lookups are
    /// case-insensitive.
    #[instrument(skip(self, email), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(normalize_email(email))
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self, google_id), err)]
    pub async fn get_user_by_google_id(&mut self, google_id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE google_id = $1"))
            .bind(google_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use sqlx::PgPool;

    fn create_request(email: &str) -> UserCreateDBRequest {
        UserCreateDBRequest {
            name: " Ada Lovelace ".to_string(),
            email: email.to_string(),
            password_hash: Some("hash".to_string()),
            google_id: None,
            photo_url: None,
        }
    }

    #[sqlx::test]
    async fn test_create_normalizes_email_and_name(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&create_request("  Ada@Example.COM ")).await.unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.name, "Ada Lovelace");

        let found = repo.get_user_by_email("ADA@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[sqlx::test]
    async fn test_duplicate_email_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        repo.create(&create_request("ada@example.com")).await.unwrap();
        let err = repo.create(&create_request("Ada@example.com")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    async fn test_update_only_touches_supplied_fields(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&create_request("ada@example.com")).await.unwrap();
        let updated = repo
            .update(
                user.id,
                &UserUpdateDBRequest {
                    google_id: Some("google-123".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.google_id.as_deref(), Some("google-123"));
        assert_eq!(updated.password_hash.as_deref(), Some("hash"));
        assert_eq!(updated.name, "Ada Lovelace");

        let by_google = repo.get_user_by_google_id("google-123").await.unwrap();
        assert_eq!(by_google.map(|u| u.id), Some(user.id));
    }

    #[sqlx::test]
    async fn test_get_bulk_and_delete(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let a = repo.create(&create_request("a@x.com")).await.unwrap();
        let b = repo.create(&create_request("b@x.com")).await.unwrap();

        let bulk = repo.get_bulk(vec![a.id, b.id, 9999]).await.unwrap();
        assert_eq!(bulk.len(), 2);
        assert_eq!(bulk[&b.id].email, "b@x.com");

        assert!(repo.delete(a.id).await.unwrap());
        assert!(!repo.delete(a.id).await.unwrap());
        assert_eq!(repo.list(&UserFilter::default()).await.unwrap().len(), 1);
    }
}
