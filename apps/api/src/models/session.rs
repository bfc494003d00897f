use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One allocation scope: partitions subjects, preferences and results.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionRow {
    pub id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub active: bool,
    pub locked: bool,
    /// Tie-break rule keys in descending priority, e.g. {percent,cgpa,dob,roll}.
    pub tiebreak_rules: Vec<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
