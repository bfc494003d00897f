//! Boundary between the pure engine and Postgres: snapshot loaders that feed
//! a run, and the `RunRecorder` collaborator that persists its outcome.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::allocation::models::{Assignment, Choice, PreferenceRecord, StudentSnapshot, SubjectSnapshot};
use crate::models::subject::SubjectRow;

/// Loads the active subjects of a scope as engine snapshots.
pub async fn load_subjects(pool: &PgPool, session_id: Uuid) -> Result<Vec<SubjectSnapshot>> {
    let rows = sqlx::query_as::<_, SubjectRow>(
        "SELECT * FROM subjects WHERE session_id = $1 AND active ORDER BY code",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(subject_snapshot).collect())
}

pub fn subject_snapshot(row: SubjectRow) -> SubjectSnapshot {
    SubjectSnapshot {
        id: row.id,
        code: row.code,
        capacity: row.capacity.max(0) as u32,
        eligible_branches: row.eligible_branches,
        required_prior_electives: row.required_prior_electives,
        min_percent: row.min_percent,
    }
}

#[derive(sqlx::FromRow)]
struct PreferenceJoinRow {
    student_id: Uuid,
    choices: Value,
    roll: Option<String>,
    branch: Option<String>,
    previous_elective: Option<String>,
    percent: Option<f64>,
    cgpa: Option<f64>,
    dob: Option<chrono::NaiveDate>,
}

/// Loads each participating student's snapshot together with their choice
/// list. Records whose stored choices fail to decode are skipped with a
/// warning; a malformed record never aborts the run.
pub async fn load_preferences(pool: &PgPool, session_id: Uuid) -> Result<Vec<PreferenceRecord>> {
    let rows = sqlx::query_as::<_, PreferenceJoinRow>(
        r#"
        SELECT p.student_id, p.choices,
               u.roll, u.branch, u.previous_elective, u.percent, u.cgpa, u.dob
        FROM preferences p
        JOIN users u ON u.id = p.student_id
        WHERE p.session_id = $1
        ORDER BY p.submitted_at ASC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let choices: Vec<Choice> = match serde_json::from_value(row.choices) {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "Skipping malformed preference record for student {}: {e}",
                    row.student_id
                );
                continue;
            }
        };
        records.push(PreferenceRecord {
            student: StudentSnapshot {
                id: row.student_id,
                roll: row.roll.unwrap_or_default(),
                branch: row.branch.unwrap_or_default(),
                previous_elective: row.previous_elective,
                percent: row.percent,
                cgpa: row.cgpa,
                dob: row.dob,
            },
            choices,
        });
    }
    Ok(records)
}

/// Persists run results. Kept behind a trait so the engine's callers can be
/// exercised against a fake recorder; `PgRunRecorder` is the real one.
#[async_trait]
pub trait RunRecorder: Send + Sync {
    /// Replaces all assignments for the scope: delete-then-insert, atomic
    /// from the caller's point of view.
    async fn replace_assignments(&self, scope: Uuid, assignments: &[Assignment]) -> Result<()>;

    /// Appends one audit entry for the scope.
    async fn append_audit(
        &self,
        scope: Uuid,
        actor: Option<Uuid>,
        action: &str,
        payload: Value,
    ) -> Result<()>;
}

pub struct PgRunRecorder {
    pool: PgPool,
}

impl PgRunRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunRecorder for PgRunRecorder {
    async fn replace_assignments(&self, scope: Uuid, assignments: &[Assignment]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM allotments WHERE session_id = $1")
            .bind(scope)
            .execute(&mut *tx)
            .await?;

        for a in assignments {
            sqlx::query(
                r#"
                INSERT INTO allotments (session_id, student_id, subject_id, rank, method)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(scope)
            .bind(a.student_id)
            .bind(a.subject_id)
            .bind(a.rank as i32)
            .bind(a.method.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            "Replaced allotments for session {scope}: {} rows",
            assignments.len()
        );
        Ok(())
    }

    async fn append_audit(
        &self,
        scope: Uuid,
        actor: Option<Uuid>,
        action: &str,
        payload: Value,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_log (session_id, actor, action, payload) VALUES ($1, $2, $3, $4)",
        )
        .bind(scope)
        .bind(actor)
        .bind(action)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
