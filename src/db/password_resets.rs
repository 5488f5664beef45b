use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::Result;

/// Lifetime of a reset token, in hours
pub const TOKEN_TTL_HOURS: i64 = 1;

/// Stores a fresh token for `user_id`, clearing that user's spent or expired ones.
pub async fn create(pool: &PgPool, user_id: Uuid, token: &str) -> Result<DateTime<Utc>> {
    let expires_at = Utc::now() + Duration::hours(TOKEN_TTL_HOURS);
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1 AND (used OR expires_at < NOW())")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO password_reset_tokens (id, user_id, token, expires_at) VALUES ($1, $2, $3, $4)")
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(expires_at)
}

/// Locks an unused, unexpired token and returns (token id, user id).
pub async fn find_valid(conn: &mut PgConnection, token: &str) -> Result<Option<(Uuid, Uuid)>> {
    Ok(sqlx::query_as(
        "SELECT id, user_id FROM password_reset_tokens
            WHERE token = $1 AND NOT used AND expires_at > NOW()
            FOR UPDATE",
    )
    .bind(token)
    .fetch_optional(conn)
    .await?)
}

pub async fn mark_used(conn: &mut PgConnection, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE password_reset_tokens SET used = TRUE WHERE id = $1").bind(id).execute(conn).await?;
    Ok(())
}
