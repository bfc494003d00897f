use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::allocation::models::Choice;
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::preference::PreferenceRow;
use crate::models::user::{UserRow, ROLE_ADMIN, ROLE_COORDINATOR, ROLE_STUDENT};
use crate::sessions::scope::resolve_scope;
use crate::state::AppState;
use crate::students::import::parse_roster_csv;
use crate::students::prefs::validate_choices;

#[derive(Debug, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub role: String,
    pub name: String,
    pub roll: Option<String>,
    pub email: Option<String>,
    pub branch: Option<String>,
    pub year: Option<i32>,
    pub semester: Option<i32>,
    pub percent: Option<f64>,
    pub cgpa: Option<f64>,
    pub previous_elective: Option<String>,
}

impl From<UserRow> for Profile {
    fn from(u: UserRow) -> Self {
        Profile {
            id: u.id,
            role: u.role,
            name: u.name,
            roll: u.roll,
            email: u.email,
            branch: u.branch,
            year: u.year,
            semester: u.semester,
            percent: u.percent,
            cgpa: u.cgpa,
            previous_elective: u.previous_elective,
        }
    }
}

/// GET /api/me
pub async fn handle_me(user: AuthUser) -> Json<Profile> {
    Json(user.0.into())
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roll: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub semester: Option<i32>,
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub cgpa: Option<f64>,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub previous_elective: Option<String>,
}

/// PUT /api/me
pub async fn handle_update_me(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpdateMeRequest>,
) -> Result<Json<Profile>, AppError> {
    let updated = sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users SET
            name = COALESCE($2, name),
            roll = COALESCE($3, roll),
            branch = COALESCE($4, branch),
            year = COALESCE($5, year),
            semester = COALESCE($6, semester),
            percent = COALESCE($7, percent),
            cgpa = COALESCE($8, cgpa),
            dob = COALESCE($9, dob),
            previous_elective = COALESCE($10, previous_elective)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user.0.id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(req.roll.as_deref().map(str::trim))
    .bind(req.branch.as_deref().map(|s| s.trim().to_uppercase()))
    .bind(req.year)
    .bind(req.semester)
    .bind(req.percent)
    .bind(req.cgpa)
    .bind(req.dob)
    .bind(req.previous_elective.as_deref().map(|s| s.trim().to_uppercase()))
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(updated.into()))
}

#[derive(Debug, Deserialize)]
pub struct ScopeQuery {
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub session_id: Uuid,
    pub choices: Vec<ChoiceView>,
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ChoiceView {
    pub subject_id: Uuid,
    pub rank: u32,
    pub label: String,
}

/// GET /api/me/preferences
pub async fn handle_get_my_preferences(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ScopeQuery>,
) -> Result<Json<PreferencesResponse>, AppError> {
    let session = resolve_scope(&state.db, params.session_id).await?;

    let row = sqlx::query_as::<_, PreferenceRow>(
        "SELECT * FROM preferences WHERE student_id = $1 AND session_id = $2",
    )
    .bind(user.0.id)
    .bind(session.id)
    .fetch_optional(&state.db)
    .await?;

    let Some(row) = row else {
        return Ok(Json(PreferencesResponse {
            session_id: session.id,
            choices: vec![],
            submitted_at: None,
        }));
    };

    let choices: Vec<Choice> = serde_json::from_value(row.choices)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("stored choices malformed: {e}")))?;

    #[derive(sqlx::FromRow)]
    struct Label {
        id: Uuid,
        code: String,
        title: String,
    }
    let labels = sqlx::query_as::<_, Label>(
        "SELECT id, code, title FROM subjects WHERE session_id = $1",
    )
    .bind(session.id)
    .fetch_all(&state.db)
    .await?;

    let views = choices
        .iter()
        .map(|c| {
            let label = labels
                .iter()
                .find(|l| l.id == c.subject_id)
                .map(|l| format!("{}: {}", l.code, l.title))
                .unwrap_or_default();
            ChoiceView {
                subject_id: c.subject_id,
                rank: c.rank,
                label,
            }
        })
        .collect();

    Ok(Json(PreferencesResponse {
        session_id: session.id,
        choices: views,
        submitted_at: Some(row.submitted_at),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpsertPreferencesRequest {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub choices: Vec<ChoiceInput>,
}

/// A choice referencing a subject either by id or by code.
#[derive(Debug, Deserialize)]
pub struct ChoiceInput {
    pub subject: String,
    pub rank: u32,
}

/// POST /api/me/preferences
pub async fn handle_upsert_preferences(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<UpsertPreferencesRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = resolve_scope(&state.db, req.session_id).await?;
    if session.locked {
        return Err(AppError::LockedScope(format!(
            "Session '{}' is locked",
            session.name
        )));
    }

    let mut choices: Vec<Choice> = Vec::with_capacity(req.choices.len());
    for input in &req.choices {
        let subject_id = match Uuid::parse_str(input.subject.trim()) {
            Ok(id) => {
                let known: Option<Uuid> =
                    sqlx::query_scalar("SELECT id FROM subjects WHERE id = $1 AND session_id = $2")
                        .bind(id)
                        .bind(session.id)
                        .fetch_optional(&state.db)
                        .await?;
                known.ok_or_else(|| {
                    AppError::Validation(format!("Subject not found: {id}"))
                })?
            }
            Err(_) => {
                let code = input.subject.trim().to_uppercase();
                if code.is_empty() {
                    return Err(AppError::Validation("Invalid subject".to_string()));
                }
                sqlx::query_scalar(
                    "SELECT id FROM subjects WHERE session_id = $1 AND code = $2",
                )
                .bind(session.id)
                .bind(&code)
                .fetch_optional(&state.db)
                .await?
                .ok_or_else(|| {
                    AppError::Validation(format!("Subject not found for code: {code}"))
                })?
            }
        };
        choices.push(Choice {
            subject_id,
            rank: input.rank,
        });
    }

    validate_choices(&choices).map_err(AppError::Validation)?;

    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO preferences (student_id, session_id, choices, submitted_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (student_id, session_id)
        DO UPDATE SET choices = EXCLUDED.choices, submitted_at = now()
        RETURNING id
        "#,
    )
    .bind(user.0.id)
    .bind(session.id)
    .bind(serde_json::to_value(&choices).map_err(|e| AppError::Internal(e.into()))?)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({ "ok": true, "id": id })))
}

#[derive(Debug, Serialize)]
pub struct MyAllotmentResponse {
    pub assigned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<AllottedSubject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AllottedSubject {
    pub id: Uuid,
    pub code: String,
    pub title: String,
}

/// GET /api/me/allotment
pub async fn handle_my_allotment(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<ScopeQuery>,
) -> Result<Json<MyAllotmentResponse>, AppError> {
    let session = resolve_scope(&state.db, params.session_id).await?;

    #[derive(sqlx::FromRow)]
    struct Row {
        subject_id: Uuid,
        code: String,
        title: String,
        rank: Option<i32>,
        method: String,
    }
    let row = sqlx::query_as::<_, Row>(
        r#"
        SELECT a.subject_id, s.code, s.title, a.rank, a.method
        FROM allotments a
        JOIN subjects s ON s.id = a.subject_id
        WHERE a.student_id = $1 AND a.session_id = $2
        "#,
    )
    .bind(user.0.id)
    .bind(session.id)
    .fetch_optional(&state.db)
    .await?;

    Ok(Json(match row {
        Some(r) => MyAllotmentResponse {
            assigned: true,
            subject: Some(AllottedSubject {
                id: r.subject_id,
                code: r.code,
                title: r.title,
            }),
            rank: r.rank,
            method: Some(r.method),
        },
        None => MyAllotmentResponse {
            assigned: false,
            subject: None,
            rank: None,
            method: None,
        },
    }))
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: usize,
    pub skipped: usize,
}

/// POST /api/students/import — multipart CSV upload (roll, name, email).
/// Existing emails are left untouched; imported students log in after an
/// admin issues credentials.
pub async fn handle_import_students(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<ImportResponse>, AppError> {
    user.require_role(&[ROLE_COORDINATOR, ROLE_ADMIN])?;

    let mut csv_text: Option<String> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Unreadable upload: {e}")))?;
            csv_text = Some(text);
        }
    }
    let csv_text =
        csv_text.ok_or_else(|| AppError::Validation("CSV file is required".to_string()))?;

    let parse = parse_roster_csv(&csv_text).map_err(AppError::Validation)?;
    if parse.rows.is_empty() {
        return Err(AppError::Validation("CSV contained no valid rows".to_string()));
    }

    let mut imported = 0usize;
    for row in &parse.rows {
        let result = sqlx::query(
            r#"
            INSERT INTO users (roll, name, email, role, active)
            VALUES ($1, $2, $3, $4, TRUE)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(&row.roll)
        .bind(&row.name)
        .bind(&row.email)
        .bind(ROLE_STUDENT)
        .execute(&state.db)
        .await?;
        imported += result.rows_affected() as usize;
    }

    info!(
        "Roster import by {}: {imported} inserted, {} skipped rows, {} duplicates",
        user.0.id,
        parse.skipped,
        parse.rows.len() - imported
    );

    Ok(Json(ImportResponse {
        imported,
        skipped: parse.skipped,
    }))
}
