//! Opaque bearer tokens backed by the `api_tokens` table. Expiry is enforced
//! at lookup time, so stale rows cost nothing until cleaned up.

use anyhow::Result;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::user::UserRow;

pub async fn issue_token(pool: &PgPool, user_id: Uuid, ttl_hours: i64) -> Result<String> {
    let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    let expires_at = Utc::now() + Duration::hours(ttl_hours);

    sqlx::query("INSERT INTO api_tokens (user_id, token, expires_at) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(&token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(token)
}

/// Resolves a presented token to its user, or `None` when unknown or expired.
pub async fn lookup_user(pool: &PgPool, token: &str) -> Result<Option<UserRow>> {
    Ok(sqlx::query_as::<_, UserRow>(
        r#"
        SELECT u.*
        FROM users u
        JOIN api_tokens t ON t.user_id = u.id
        WHERE t.token = $1 AND t.expires_at > now()
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await?)
}
