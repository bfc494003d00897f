use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PreferenceRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub session_id: Uuid,
    /// Ordered choice list: `[{"subject_id": uuid, "rank": int}]`.
    pub choices: Value,
    pub submitted_at: DateTime<Utc>,
}
