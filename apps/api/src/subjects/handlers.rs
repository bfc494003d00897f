use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::allotment::AllotmentRow;
use crate::models::subject::SubjectRow;
use crate::models::user::{ROLE_ADMIN, ROLE_COORDINATOR};
use crate::sessions::scope::resolve_scope;
use crate::state::AppState;

/// Branch/elective lists arrive either as a JSON array or as a single
/// comma-separated string; both are normalized to trimmed uppercase codes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    Many(Vec<String>),
    Csv(String),
}

impl StringList {
    pub fn into_codes(self) -> Vec<String> {
        let raw = match self {
            StringList::Many(v) => v,
            StringList::Csv(s) => s.split(',').map(str::to_string).collect(),
        };
        raw.iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

fn validate_capacity(capacity: i32) -> Result<(), AppError> {
    if capacity < 1 {
        return Err(AppError::Validation(
            "capacity must be a positive number".to_string(),
        ));
    }
    Ok(())
}

fn validate_year(year: i32) -> Result<(), AppError> {
    if !(1..=4).contains(&year) {
        return Err(AppError::Validation("year must be between 1 and 4".to_string()));
    }
    Ok(())
}

fn validate_semester(semester: i32) -> Result<(), AppError> {
    if !(1..=8).contains(&semester) {
        return Err(AppError::Validation(
            "semester must be between 1 and 8".to_string(),
        ));
    }
    Ok(())
}

fn validate_min_percent(min_percent: f64) -> Result<(), AppError> {
    if !(0.0..=100.0).contains(&min_percent) {
        return Err(AppError::Validation(
            "min_percent must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ListSubjectsQuery {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub semester: Option<i32>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// GET /api/subjects
pub async fn handle_list_subjects(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ListSubjectsQuery>,
) -> Result<Json<Vec<SubjectRow>>, AppError> {
    user.require_role(&[ROLE_COORDINATOR, ROLE_ADMIN])?;
    let session = resolve_scope(&state.db, params.session_id).await?;

    let subjects = sqlx::query_as::<_, SubjectRow>(
        r#"
        SELECT * FROM subjects
        WHERE session_id = $1
          AND ($2::int IS NULL OR year = $2)
          AND ($3::int IS NULL OR semester = $3)
          AND ($4::bool IS NULL OR active = $4)
        ORDER BY year, semester, code
        "#,
    )
    .bind(session.id)
    .bind(params.year)
    .bind(params.semester)
    .bind(params.active)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(subjects))
}

#[derive(Debug, Deserialize)]
pub struct CreateSubjectRequest {
    pub code: String,
    pub title: String,
    pub capacity: i32,
    pub year: i32,
    pub semester: i32,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub eligible_branches: Option<StringList>,
    #[serde(default)]
    pub required_prior_electives: Option<StringList>,
    #[serde(default)]
    pub min_percent: Option<f64>,
}

/// POST /api/subjects
pub async fn handle_create_subject(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateSubjectRequest>,
) -> Result<(StatusCode, Json<SubjectRow>), AppError> {
    user.require_role(&[ROLE_COORDINATOR, ROLE_ADMIN])?;
    let session = resolve_scope(&state.db, req.session_id).await?;

    let code = req.code.trim().to_uppercase();
    let title = req.title.trim().to_string();
    if code.is_empty() || title.is_empty() {
        return Err(AppError::Validation("code and title are required".to_string()));
    }
    validate_capacity(req.capacity)?;
    validate_year(req.year)?;
    validate_semester(req.semester)?;
    let min_percent = req.min_percent.unwrap_or(0.0);
    validate_min_percent(min_percent)?;

    let branches = req.eligible_branches.map_or_else(Vec::new, StringList::into_codes);
    let priors = req
        .required_prior_electives
        .map_or_else(Vec::new, StringList::into_codes);

    let subject = sqlx::query_as::<_, SubjectRow>(
        r#"
        INSERT INTO subjects
            (session_id, code, title, capacity, year, semester,
             eligible_branches, required_prior_electives, min_percent, active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE)
        RETURNING *
        "#,
    )
    .bind(session.id)
    .bind(&code)
    .bind(&title)
    .bind(req.capacity)
    .bind(req.year)
    .bind(req.semester)
    .bind(&branches)
    .bind(&priors)
    .bind(min_percent)
    .fetch_one(&state.db)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(format!("Subject code '{code}' already exists in this session"))
        }
        _ => AppError::Database(e),
    })?;

    info!("Created subject {} in session {}", subject.code, session.id);
    Ok((StatusCode::CREATED, Json(subject)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubjectRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub capacity: Option<i32>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub semester: Option<i32>,
    #[serde(default)]
    pub eligible_branches: Option<StringList>,
    #[serde(default)]
    pub required_prior_electives: Option<StringList>,
    #[serde(default)]
    pub min_percent: Option<f64>,
    #[serde(default)]
    pub active: Option<bool>,
}

/// PATCH /api/subjects/:id
pub async fn handle_update_subject(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSubjectRequest>,
) -> Result<Json<SubjectRow>, AppError> {
    user.require_role(&[ROLE_COORDINATOR, ROLE_ADMIN])?;

    if let Some(title) = &req.title {
        if title.trim().is_empty() {
            return Err(AppError::Validation("title cannot be empty".to_string()));
        }
    }
    if let Some(capacity) = req.capacity {
        validate_capacity(capacity)?;
    }
    if let Some(year) = req.year {
        validate_year(year)?;
    }
    if let Some(semester) = req.semester {
        validate_semester(semester)?;
    }
    if let Some(min_percent) = req.min_percent {
        validate_min_percent(min_percent)?;
    }

    let branches = req.eligible_branches.map(StringList::into_codes);
    let priors = req.required_prior_electives.map(StringList::into_codes);

    let subject = sqlx::query_as::<_, SubjectRow>(
        r#"
        UPDATE subjects SET
            title = COALESCE($2, title),
            capacity = COALESCE($3, capacity),
            year = COALESCE($4, year),
            semester = COALESCE($5, semester),
            eligible_branches = COALESCE($6, eligible_branches),
            required_prior_electives = COALESCE($7, required_prior_electives),
            min_percent = COALESCE($8, min_percent),
            active = COALESCE($9, active)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.title.as_deref().map(str::trim))
    .bind(req.capacity)
    .bind(req.year)
    .bind(req.semester)
    .bind(branches)
    .bind(priors)
    .bind(req.min_percent)
    .bind(req.active)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Subject {id} not found")))?;

    Ok(Json(subject))
}

#[derive(Debug, Deserialize)]
pub struct AvailableQuery {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub semester: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct AvailableSubject {
    pub id: Uuid,
    pub code: String,
    pub title: String,
    pub capacity: i32,
    pub year: i32,
    pub semester: i32,
    pub min_percent: f64,
}

/// GET /api/subjects/available — the subjects the calling student may rank:
/// active, matching their year, and passing the branch and prior-elective
/// gates. The percent gate is deliberately not applied here; a student can
/// see a subject they would fail at allocation time.
pub async fn handle_available_subjects(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<AvailableQuery>,
) -> Result<Json<Vec<AvailableSubject>>, AppError> {
    let session = resolve_scope(&state.db, params.session_id).await?;

    let year = params
        .year
        .or(user.0.year)
        .ok_or_else(|| AppError::Validation("Student year not set".to_string()))?;
    let branch = user.0.branch.clone().unwrap_or_default();
    let prev = user.0.previous_elective.clone().unwrap_or_default();

    let subjects = sqlx::query_as::<_, SubjectRow>(
        r#"
        SELECT * FROM subjects
        WHERE session_id = $1 AND active AND year = $2
          AND ($3::int IS NULL OR semester = $3)
        ORDER BY code
        "#,
    )
    .bind(session.id)
    .bind(year)
    .bind(params.semester)
    .fetch_all(&state.db)
    .await?;

    let available = subjects
        .into_iter()
        .filter(|s| {
            let branch_ok = s.eligible_branches.is_empty()
                || s.eligible_branches
                    .iter()
                    .any(|b| b.eq_ignore_ascii_case(branch.trim()));
            let prior_ok = s.required_prior_electives.is_empty()
                || (!prev.trim().is_empty()
                    && s.required_prior_electives
                        .iter()
                        .any(|r| r.eq_ignore_ascii_case(prev.trim())));
            branch_ok && prior_ok
        })
        .map(|s| AvailableSubject {
            id: s.id,
            code: s.code,
            title: s.title,
            capacity: s.capacity,
            year: s.year,
            semester: s.semester,
            min_percent: s.min_percent,
        })
        .collect();

    Ok(Json(available))
}

#[derive(Debug, Serialize)]
pub struct RosterResponse {
    pub subject_id: Uuid,
    pub code: String,
    pub capacity: i32,
    pub filled: usize,
    pub allotments: Vec<AllotmentRow>,
}

/// GET /api/subjects/:id/roster — who currently holds a seat in a subject.
pub async fn handle_subject_roster(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RosterResponse>, AppError> {
    user.require_role(&[ROLE_COORDINATOR, ROLE_ADMIN])?;

    let subject = sqlx::query_as::<_, SubjectRow>("SELECT * FROM subjects WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Subject {id} not found")))?;

    let allotments = sqlx::query_as::<_, AllotmentRow>(
        "SELECT * FROM allotments WHERE subject_id = $1 ORDER BY updated_at",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(RosterResponse {
        subject_id: subject.id,
        code: subject.code,
        capacity: subject.capacity,
        filled: allotments.len(),
        allotments,
    }))
}
