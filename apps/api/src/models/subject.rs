use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubjectRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub code: String,
    pub title: String,
    pub capacity: i32,
    pub year: i32,
    pub semester: i32,
    /// Empty = open to all branches.
    pub eligible_branches: Vec<String>,
    /// Empty = no prior-elective requirement.
    pub required_prior_electives: Vec<String>,
    pub min_percent: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
