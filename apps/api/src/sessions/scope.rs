//! Scope resolution: which session an operation applies to. An explicit id
//! must exist; otherwise the newest active, unlocked session is used. The
//! fallback is explicit here rather than ambient state so every caller gets
//! the same `ScopeNotFound` behavior.

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::session::SessionRow;

pub async fn resolve_scope(
    pool: &PgPool,
    explicit: Option<Uuid>,
) -> Result<SessionRow, AppError> {
    if let Some(id) = explicit {
        let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        return row.ok_or_else(|| AppError::ScopeNotFound(format!("Session {id} not found")));
    }

    sqlx::query_as::<_, SessionRow>(
        "SELECT * FROM sessions WHERE active AND NOT locked ORDER BY created_at DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        AppError::ScopeNotFound("No active session found. Please create a session.".to_string())
    })
}
