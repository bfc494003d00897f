//! Eligibility Evaluator — pure admissibility predicate for a (student,
//! subject) pair. Reproducible: same snapshots, same answer.
//!
//! A student is eligible when all three gates pass:
//! - branch: subject's eligible-branch set is empty, or contains the
//!   student's branch (case-insensitive)
//! - prior elective: subject's required set is empty, or the student has a
//!   prior elective contained in it
//! - percent: student's percent >= subject's minimum (default 0 disables)

use crate::allocation::models::{StudentSnapshot, SubjectSnapshot};

pub fn is_eligible(student: &StudentSnapshot, subject: &SubjectSnapshot) -> bool {
    branch_ok(student, subject) && prior_elective_ok(student, subject) && percent_ok(student, subject)
}

fn branch_ok(student: &StudentSnapshot, subject: &SubjectSnapshot) -> bool {
    if subject.eligible_branches.is_empty() {
        return true;
    }
    let branch = student.branch.trim();
    subject
        .eligible_branches
        .iter()
        .any(|b| b.trim().eq_ignore_ascii_case(branch))
}

fn prior_elective_ok(student: &StudentSnapshot, subject: &SubjectSnapshot) -> bool {
    if subject.required_prior_electives.is_empty() {
        return true;
    }
    let prev = match student.previous_elective.as_deref() {
        Some(p) if !p.trim().is_empty() => p.trim(),
        _ => return false,
    };
    subject
        .required_prior_electives
        .iter()
        .any(|r| r.trim().eq_ignore_ascii_case(prev))
}

fn percent_ok(student: &StudentSnapshot, subject: &SubjectSnapshot) -> bool {
    student.percent.unwrap_or(0.0) >= subject.min_percent
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn student(branch: &str, prev: Option<&str>, percent: Option<f64>) -> StudentSnapshot {
        StudentSnapshot {
            id: Uuid::new_v4(),
            roll: "21CS001".to_string(),
            branch: branch.to_string(),
            previous_elective: prev.map(str::to_string),
            percent,
            cgpa: None,
            dob: None,
        }
    }

    fn subject(branches: &[&str], prior: &[&str], min_percent: f64) -> SubjectSnapshot {
        SubjectSnapshot {
            id: Uuid::new_v4(),
            code: "ML".to_string(),
            capacity: 30,
            eligible_branches: branches.iter().map(|s| s.to_string()).collect(),
            required_prior_electives: prior.iter().map(|s| s.to_string()).collect(),
            min_percent,
        }
    }

    #[test]
    fn test_unrestricted_subject_accepts_anyone() {
        let s = subject(&[], &[], 0.0);
        assert!(is_eligible(&student("CSE", None, None), &s));
    }

    #[test]
    fn test_branch_membership_is_case_insensitive() {
        let s = subject(&["CSE", "IT"], &[], 0.0);
        assert!(is_eligible(&student("cse", None, Some(80.0)), &s));
        assert!(!is_eligible(&student("ECE", None, Some(80.0)), &s));
    }

    #[test]
    fn test_prior_elective_required_but_missing() {
        let s = subject(&[], &["DBMS"], 0.0);
        assert!(!is_eligible(&student("CSE", None, Some(90.0)), &s));
        assert!(!is_eligible(&student("CSE", Some(""), Some(90.0)), &s));
    }

    #[test]
    fn test_prior_elective_must_be_in_required_set() {
        let s = subject(&[], &["DBMS"], 0.0);
        assert!(!is_eligible(&student("CSE", Some("NONE"), Some(90.0)), &s));
        assert!(is_eligible(&student("CSE", Some("dbms"), Some(90.0)), &s));
    }

    #[test]
    fn test_percent_threshold() {
        let s = subject(&[], &[], 75.0);
        assert!(is_eligible(&student("CSE", None, Some(75.0)), &s));
        assert!(!is_eligible(&student("CSE", None, Some(74.9)), &s));
        // missing percent is treated as 0
        assert!(!is_eligible(&student("CSE", None, None), &s));
    }

    #[test]
    fn test_all_gates_must_pass() {
        let s = subject(&["CSE"], &["DBMS"], 70.0);
        assert!(is_eligible(&student("CSE", Some("DBMS"), Some(80.0)), &s));
        assert!(!is_eligible(&student("IT", Some("DBMS"), Some(80.0)), &s));
        assert!(!is_eligible(&student("CSE", Some("OS"), Some(80.0)), &s));
        assert!(!is_eligible(&student("CSE", Some("DBMS"), Some(60.0)), &s));
    }
}
