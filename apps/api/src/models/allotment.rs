use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted assignment. One row per (session, student); reallocation
/// replaces the row rather than appending.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AllotmentRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub rank: Option<i32>,
    /// "auto" (engine) or "manual" (coordinator override).
    pub method: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogRow {
    pub id: Uuid,
    pub session_id: Option<Uuid>,
    pub actor: Option<Uuid>,
    pub action: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}
