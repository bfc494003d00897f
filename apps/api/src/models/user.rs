use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const ROLE_STUDENT: &str = "student";
pub const ROLE_COORDINATOR: &str = "coordinator";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub roll: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub percent: Option<f64>,
    pub cgpa: Option<f64>,
    pub dob: Option<NaiveDate>,
    pub branch: Option<String>,
    pub year: Option<i32>,
    pub semester: Option<i32>,
    pub previous_elective: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}
