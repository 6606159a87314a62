//! Database repository for Expo push tokens.

use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    db::{errors::Result, models::push_tokens::PushToken},
    types::UserId,
};

pub struct PushTokens<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PushTokens<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Register `token` for `user_id`. A token belongs to one device, so any other user holding
    /// it loses it first.
    #[instrument(skip(self, token), err)]
    pub async fn save(&mut self, user_id: UserId, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM user_push_tokens WHERE token = $1 AND user_id <> $2")
            .bind(token)
            .bind(user_id)
            .execute(&mut *self.db)
            .await?;

        sqlx::query("INSERT INTO user_push_tokens (user_id, token) VALUES ($1, $2) ON CONFLICT (token) DO NOTHING")
            .bind(user_id)
            .bind(token)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    #[instrument(skip(self, user_ids), fields(count = user_ids.len()), err)]
    pub async fn for_users(&mut self, user_ids: &[UserId]) -> Result<Vec<PushToken>> {
        let tokens = sqlx::query_as::<_, PushToken>(
            "SELECT id, user_id, token, created_at FROM user_push_tokens WHERE user_id = ANY($1) ORDER BY id",
        )
        .bind(user_ids)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(tokens)
    }
}
