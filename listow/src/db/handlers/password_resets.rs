//! Database repository for password reset codes.

use chrono::Utc;
use sqlx::PgConnection;
use tracing::instrument;

use crate::{
    auth::password,
    config::Config,
    db::{
        errors::{DbError, Result},
        models::password_resets::PasswordReset,
    },
    types::normalize_email,
};

const RESET_COLUMNS: &str = "id, email, code_hash, expires_at, used, created_at";

pub struct PasswordResets<'c> {
    db: &'c mut PgConnection,
}

impl<'c> PasswordResets<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Issue a fresh six digit code for `email`, invalidating any code issued before it.
    ///
    /// Returns the raw code (to be mailed) together with the stored row, which only holds its hash.
    #[instrument(skip(self, email, config), err)]
    pub async fn create_for_email(&mut self, email: &str, config: &Config) -> Result<(String, PasswordReset)> {
        let email = normalize_email(email);
        let code = password::generate_reset_code();
        let code_hash = password::hash_string_with_params(&code, Some(config.auth.native.password.argon2_params()))
            .map_err(|e| DbError::Other(anyhow::anyhow!(e)))?;
        let expires_at = Utc::now()
            + chrono::Duration::from_std(config.auth.native.password_reset_code_duration).unwrap_or(chrono::Duration::minutes(15));

        self.invalidate_for_email(&email).await?;

        let reset = sqlx::query_as::<_, PasswordReset>(&format!(
            "INSERT INTO password_resets (email, code_hash, expires_at) VALUES ($1, $2, $3) RETURNING {RESET_COLUMNS}"
        ))
        .bind(&email)
        .bind(&code_hash)
        .bind(expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok((code, reset))
    }

    /// The live code for `email` if `code` matches it. Expired, used and mismatching codes all
    /// come back as `None`.
    #[instrument(skip(self, email, code), err)]
    pub async fn find_valid_code(&mut self, email: &str, code: &str) -> Result<Option<PasswordReset>> {
        let reset = sqlx::query_as::<_, PasswordReset>(&format!(
            r#"
            SELECT {RESET_COLUMNS} FROM password_resets
            WHERE email = $1 AND NOT used AND expires_at > NOW()
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(normalize_email(email))
        .fetch_optional(&mut *self.db)
        .await?;

        let Some(reset) = reset else {
            return Ok(None);
        };
        if reset.used || Utc::now() > reset.expires_at {
            return Ok(None);
        }

        match password::verify_string(code, &reset.code_hash) {
            Ok(true) => Ok(Some(reset)),
            Ok(false) => Ok(None),
            Err(e) => {
                tracing::error!("Reset code verification error for reset {}: {:?}", reset.id, e);
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), err)]
    pub async fn mark_used(&mut self, id: i64) -> Result<()> {
        sqlx::query("UPDATE password_resets SET used = TRUE WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(())
    }

    /// Mark every outstanding code for `email` as used.
    #[instrument(skip(self, email), err)]
    pub async fn invalidate_for_email(&mut self, email: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE password_resets SET used = TRUE WHERE email = $1 AND NOT used")
            .bind(normalize_email(email))
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
