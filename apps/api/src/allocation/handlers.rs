use std::collections::HashMap;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::allocation::eligibility::is_eligible;
use crate::allocation::engine::{self, RunInput, Strategy};
use crate::allocation::models::{Method, StudentSnapshot};
use crate::allocation::store::{
    load_preferences, load_subjects, subject_snapshot, PgRunRecorder, RunRecorder,
};
use crate::allocation::tiebreak;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::subject::SubjectRow;
use crate::models::user::{UserRow, ROLE_ADMIN, ROLE_COORDINATOR};
use crate::sessions::scope::resolve_scope;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub strategy: Option<Strategy>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub session_id: Uuid,
    pub strategy: Strategy,
    pub assigned: usize,
    pub waitlisted: usize,
    pub remaining: HashMap<Uuid, u32>,
}

/// POST /api/allocation/run
///
/// Loads the scope's inputs, runs the engine, then replaces the scope's
/// allotments and appends an audit entry. Nothing is persisted if any step
/// before the replace fails.
pub async fn handle_run(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunResponse>, AppError> {
    user.require_role(&[ROLE_COORDINATOR, ROLE_ADMIN])?;

    let session = resolve_scope(&state.db, req.session_id).await?;
    if session.locked {
        return Err(AppError::LockedScope(format!(
            "Session '{}' is locked",
            session.name
        )));
    }

    let subjects = load_subjects(&state.db, session.id)
        .await
        .map_err(AppError::Internal)?;
    let preferences = load_preferences(&state.db, session.id)
        .await
        .map_err(AppError::Internal)?;
    let rules = tiebreak::parse_rules(&session.tiebreak_rules);

    let strategy = req.strategy.unwrap_or_default();
    let input = RunInput {
        subjects,
        preferences,
        rules,
    };

    let outcome = engine::run(&input, strategy)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("capacity invariant violated: {e}")))?;

    let recorder = PgRunRecorder::new(state.db.clone());
    recorder
        .replace_assignments(session.id, &outcome.assigned)
        .await
        .map_err(AppError::Internal)?;
    recorder
        .append_audit(
            session.id,
            Some(user.0.id),
            "allocation_run",
            json!({
                "strategy": strategy,
                "assigned": outcome.assigned.len(),
                "waitlisted": outcome.waitlisted.len(),
                "remaining": &outcome.remaining,
            }),
        )
        .await
        .map_err(AppError::Internal)?;

    info!(
        "Allocation run for session {}: {} assigned, {} waitlisted",
        session.id,
        outcome.assigned.len(),
        outcome.waitlisted.len()
    );

    Ok(Json(RunResponse {
        session_id: session.id,
        strategy,
        assigned: outcome.assigned.len(),
        waitlisted: outcome.waitlisted.len(),
        remaining: outcome.remaining,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ReassignResponse {
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub method: Method,
}

/// POST /api/allocation/reassign
///
/// Manual override: re-validates eligibility but NOT capacity, so a
/// coordinator may oversubscribe a subject on purpose. The override replaces
/// any automatic assignment for that student in the scope.
pub async fn handle_reassign(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ReassignRequest>,
) -> Result<Json<ReassignResponse>, AppError> {
    user.require_role(&[ROLE_COORDINATOR, ROLE_ADMIN])?;

    let session = resolve_scope(&state.db, req.session_id).await?;

    let student = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(req.student_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

    let subject = sqlx::query_as::<_, SubjectRow>("SELECT * FROM subjects WHERE id = $1")
        .bind(req.subject_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Subject not found".to_string()))?;

    let snapshot = StudentSnapshot {
        id: student.id,
        roll: student.roll.unwrap_or_default(),
        branch: student.branch.unwrap_or_default(),
        previous_elective: student.previous_elective,
        percent: student.percent,
        cgpa: student.cgpa,
        dob: student.dob,
    };
    if !is_eligible(&snapshot, &subject_snapshot(subject)) {
        return Err(AppError::Validation(
            "Student not eligible for selected subject".to_string(),
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO allotments (session_id, student_id, subject_id, rank, method)
        VALUES ($1, $2, $3, NULL, 'manual')
        ON CONFLICT (session_id, student_id)
        DO UPDATE SET subject_id = EXCLUDED.subject_id, rank = NULL,
                      method = 'manual', updated_at = now()
        "#,
    )
    .bind(session.id)
    .bind(req.student_id)
    .bind(req.subject_id)
    .execute(&state.db)
    .await?;

    let recorder = PgRunRecorder::new(state.db.clone());
    recorder
        .append_audit(
            session.id,
            Some(user.0.id),
            "manual_reassign",
            json!({
                "student_id": req.student_id,
                "subject_id": req.subject_id,
            }),
        )
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(ReassignResponse {
        session_id: session.id,
        student_id: req.student_id,
        subject_id: req.subject_id,
        method: Method::Manual,
    }))
}
