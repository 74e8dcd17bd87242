use super::Database;
use crate::{Credentials, HaulError, Result};
use chrono::Utc;
use tracing::debug;

impl Database {
    /// Stores sealed credentials for a user, replacing any previous set and
    /// marking them valid again.
    pub async fn upsert_credentials(&self, credentials: &Credentials) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO credentials (
                user_id, email_enc, session_cookie_enc, csrf_token_enc,
                is_valid, last_validated_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                email_enc = excluded.email_enc,
                session_cookie_enc = excluded.session_cookie_enc,
                csrf_token_enc = excluded.csrf_token_enc,
                is_valid = excluded.is_valid,
                last_validated_at = excluded.last_validated_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&credentials.user_id)
        .bind(&credentials.email_enc)
        .bind(&credentials.session_cookie_enc)
        .bind(&credentials.csrf_token_enc)
        .bind(credentials.is_valid)
        .bind(credentials.last_validated_at)
        .bind(credentials.created_at)
        .bind(credentials.updated_at)
        .execute(&self.pool)
        .await?;

        debug!("Stored credentials for user {}", credentials.user_id);
        Ok(())
    }

    pub async fn get_credentials(&self, user_id: &str) -> Result<Option<Credentials>> {
        let credentials = sqlx::query_as::<_, Credentials>("SELECT * FROM credentials WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(credentials)
    }

    /// Records the outcome of a session check.
    pub async fn mark_credentials_validity(&self, user_id: &str, is_valid: bool) -> Result<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE credentials SET is_valid = ?, last_validated_at = ?, updated_at = ? WHERE user_id = ?",
        )
        .bind(is_valid)
        .bind(now)
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(HaulError::NotFound(format!("credentials for user {}", user_id)));
        }
        Ok(())
    }
}
