use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::allocation::tiebreak;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::allotment::AuditLogRow;
use crate::models::session::SessionRow;
use crate::models::user::{ROLE_ADMIN, ROLE_COORDINATOR};
use crate::sessions::scope::resolve_scope;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub tiebreak_rules: Option<Vec<String>>,
    #[serde(default)]
    pub starts_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub ends_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// POST /api/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionRow>), AppError> {
    user.require_role(&[ROLE_ADMIN])?;

    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }

    // validate rule keys up front so a bad config fails loudly here, not at
    // run time
    let rules = req.tiebreak_rules.unwrap_or_else(|| {
        tiebreak::default_rules()
            .iter()
            .map(|r| r.as_str().to_string())
            .collect()
    });
    for key in &rules {
        if tiebreak::TieBreakRule::parse(key).is_none() {
            return Err(AppError::Validation(format!(
                "Unknown tie-break rule '{key}' (expected percent, cgpa, dob or roll)"
            )));
        }
    }

    let session = sqlx::query_as::<_, SessionRow>(
        r#"
        INSERT INTO sessions (name, code, active, locked, tiebreak_rules, starts_at, ends_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(&name)
    .bind(req.code.as_deref().map(str::trim))
    .bind(req.active)
    .bind(req.locked)
    .bind(&rules)
    .bind(req.starts_at)
    .bind(req.ends_at)
    .fetch_one(&state.db)
    .await?;

    info!("Created session '{}' ({})", session.name, session.id);
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/sessions
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<SessionRow>>, AppError> {
    user.require_role(&[ROLE_ADMIN, ROLE_COORDINATOR])?;
    let sessions =
        sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(sessions))
}

#[derive(Debug, Deserialize)]
pub struct SessionFlagsRequest {
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub locked: Option<bool>,
}

/// PATCH /api/sessions/:id/flags
pub async fn handle_set_session_flags(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SessionFlagsRequest>,
) -> Result<Json<SessionRow>, AppError> {
    user.require_role(&[ROLE_ADMIN])?;

    let session = sqlx::query_as::<_, SessionRow>(
        r#"
        UPDATE sessions
        SET active = COALESCE($2, active), locked = COALESCE($3, locked)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.active)
    .bind(req.locked)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;

    info!(
        "Session {} flags set: active={}, locked={}",
        session.id, session.active, session.locked
    );
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
pub struct ScopeQuery {
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SubjectDistributionRow {
    pub subject_id: Uuid,
    pub code: String,
    pub title: String,
    pub capacity: i32,
    pub assigned: i64,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub session_id: Uuid,
    pub distribution: Vec<SubjectDistributionRow>,
}

/// GET /api/analytics — per-subject assignment counts versus capacity.
pub async fn handle_analytics(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ScopeQuery>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    user.require_role(&[ROLE_ADMIN, ROLE_COORDINATOR])?;
    let session = resolve_scope(&state.db, params.session_id).await?;

    let distribution = sqlx::query_as::<_, SubjectDistributionRow>(
        r#"
        SELECT s.id AS subject_id, s.code, s.title, s.capacity, COUNT(a.id) AS assigned
        FROM subjects s
        LEFT JOIN allotments a ON a.subject_id = s.id AND a.session_id = s.session_id
        WHERE s.session_id = $1
        GROUP BY s.id, s.code, s.title, s.capacity
        ORDER BY s.code
        "#,
    )
    .bind(session.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(AnalyticsResponse {
        session_id: session.id,
        distribution,
    }))
}

/// GET /api/audit — audit trail for a scope, newest first.
pub async fn handle_list_audit(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ScopeQuery>,
) -> Result<Json<Vec<AuditLogRow>>, AppError> {
    user.require_role(&[ROLE_ADMIN])?;
    let session = resolve_scope(&state.db, params.session_id).await?;

    let entries = sqlx::query_as::<_, AuditLogRow>(
        "SELECT * FROM audit_log WHERE session_id = $1 ORDER BY created_at DESC",
    )
    .bind(session.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(entries))
}
