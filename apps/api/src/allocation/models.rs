//! Input and output types of the allocation engine. All of these are plain
//! values: the engine never touches the database, so a run can be replayed
//! from the same snapshots and produce the same result.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable view of one student for a single run. Used only for eligibility
/// and tie-breaking; the engine never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentSnapshot {
    pub id: Uuid,
    pub roll: String,
    pub branch: String,
    pub previous_elective: Option<String>,
    pub percent: Option<f64>,
    pub cgpa: Option<f64>,
    pub dob: Option<NaiveDate>,
}

/// Subject as the engine sees it: static seat count plus eligibility gates.
/// Capacity is an input; the engine never writes it back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectSnapshot {
    pub id: Uuid,
    pub code: String,
    pub capacity: u32,
    /// Empty = open to all branches.
    pub eligible_branches: Vec<String>,
    /// Empty = no prior-elective requirement.
    pub required_prior_electives: Vec<String>,
    pub min_percent: f64,
}

/// One ranked choice within a student's preference list. Lower rank = higher
/// preference; ranks are unique within a list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Choice {
    pub subject_id: Uuid,
    pub rank: u32,
}

/// A student's full preference record for the run.
#[derive(Debug, Clone)]
pub struct PreferenceRecord {
    pub student: StudentSnapshot,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Auto,
    Manual,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Auto => "auto",
            Method::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub student_id: Uuid,
    pub subject_id: Uuid,
    pub rank: u32,
    pub method: Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitlistReason {
    NoEligibleChoiceWithCapacity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    pub student_id: Uuid,
    pub reason: WaitlistReason,
}

/// Result of one automatic allocation pass.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub assigned: Vec<Assignment>,
    pub waitlisted: Vec<WaitlistEntry>,
    /// Final remaining seats per subject after the pass.
    pub remaining: HashMap<Uuid, u32>,
}
