//! Tie-Break Comparator — deterministic ordering over students when demand
//! exceeds supply. Rules are evaluated in sequence; the first non-equal
//! comparison decides. Callers must use a stable sort so that ties keep
//! their input order.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::allocation::models::StudentSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreakRule {
    /// Higher academic percent ranks first (missing treated as 0).
    Percent,
    /// Higher cgpa ranks first (missing treated as 0).
    Cgpa,
    /// Earlier date of birth ranks first (missing treated as the epoch).
    Dob,
    /// Lexicographically smaller roll string ranks first.
    Roll,
}

impl TieBreakRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            TieBreakRule::Percent => "percent",
            TieBreakRule::Cgpa => "cgpa",
            TieBreakRule::Dob => "dob",
            TieBreakRule::Roll => "roll",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "percent" => Some(TieBreakRule::Percent),
            "cgpa" => Some(TieBreakRule::Cgpa),
            "dob" => Some(TieBreakRule::Dob),
            "roll" => Some(TieBreakRule::Roll),
            _ => None,
        }
    }
}

/// Default rule sequence when a session does not configure one.
pub fn default_rules() -> Vec<TieBreakRule> {
    vec![
        TieBreakRule::Percent,
        TieBreakRule::Cgpa,
        TieBreakRule::Dob,
        TieBreakRule::Roll,
    ]
}

/// Parses a stored rule-key list. Unknown keys are dropped with a warning;
/// an empty result falls back to the default sequence.
pub fn parse_rules(keys: &[String]) -> Vec<TieBreakRule> {
    let rules: Vec<TieBreakRule> = keys
        .iter()
        .filter_map(|k| {
            let rule = TieBreakRule::parse(k);
            if rule.is_none() {
                warn!("Ignoring unknown tie-break rule key '{k}'");
            }
            rule
        })
        .collect();
    if rules.is_empty() {
        default_rules()
    } else {
        rules
    }
}

/// Compares two students under a rule sequence. `Ordering::Less` means `a`
/// is served before `b`.
pub fn compare(a: &StudentSnapshot, b: &StudentSnapshot, rules: &[TieBreakRule]) -> Ordering {
    for rule in rules {
        let ord = match rule {
            TieBreakRule::Percent => b
                .percent
                .unwrap_or(0.0)
                .total_cmp(&a.percent.unwrap_or(0.0)),
            TieBreakRule::Cgpa => b.cgpa.unwrap_or(0.0).total_cmp(&a.cgpa.unwrap_or(0.0)),
            TieBreakRule::Dob => a
                .dob
                .unwrap_or_default()
                .cmp(&b.dob.unwrap_or_default()),
            TieBreakRule::Roll => a.roll.cmp(&b.roll),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn student(roll: &str, percent: f64, cgpa: f64, dob: Option<NaiveDate>) -> StudentSnapshot {
        StudentSnapshot {
            id: Uuid::new_v4(),
            roll: roll.to_string(),
            branch: "CSE".to_string(),
            previous_elective: None,
            percent: Some(percent),
            cgpa: Some(cgpa),
            dob,
        }
    }

    #[test]
    fn test_higher_percent_ranks_first() {
        let a = student("A1", 90.0, 8.0, None);
        let b = student("B1", 70.0, 9.5, None);
        assert_eq!(compare(&a, &b, &default_rules()), Ordering::Less);
        assert_eq!(compare(&b, &a, &default_rules()), Ordering::Greater);
    }

    #[test]
    fn test_cgpa_breaks_percent_tie() {
        let a = student("A1", 85.0, 9.1, None);
        let b = student("B1", 85.0, 8.9, None);
        assert_eq!(compare(&a, &b, &default_rules()), Ordering::Less);
    }

    #[test]
    fn test_earlier_dob_ranks_first() {
        let a = student("A1", 85.0, 9.0, NaiveDate::from_ymd_opt(2003, 1, 15));
        let b = student("B1", 85.0, 9.0, NaiveDate::from_ymd_opt(2004, 6, 2));
        assert_eq!(compare(&a, &b, &default_rules()), Ordering::Less);
    }

    #[test]
    fn test_roll_is_final_fallback() {
        let a = student("21CS002", 85.0, 9.0, None);
        let b = student("21CS001", 85.0, 9.0, None);
        assert_eq!(compare(&a, &b, &default_rules()), Ordering::Greater);
    }

    #[test]
    fn test_identical_students_are_equal() {
        let a = student("21CS001", 85.0, 9.0, None);
        let b = student("21CS001", 85.0, 9.0, None);
        assert_eq!(compare(&a, &b, &default_rules()), Ordering::Equal);
    }

    #[test]
    fn test_missing_percent_treated_as_zero() {
        let mut a = student("A1", 0.0, 0.0, None);
        a.percent = None;
        let b = student("B1", 50.0, 0.0, None);
        assert_eq!(compare(&a, &b, &[TieBreakRule::Percent]), Ordering::Greater);
    }

    #[test]
    fn test_rule_order_matters() {
        let a = student("A1", 70.0, 9.9, None);
        let b = student("B1", 90.0, 8.0, None);
        assert_eq!(compare(&a, &b, &[TieBreakRule::Cgpa]), Ordering::Less);
        assert_eq!(compare(&a, &b, &[TieBreakRule::Percent]), Ordering::Greater);
    }

    #[test]
    fn test_parse_rules_drops_unknown_keys() {
        let keys = vec!["cgpa".to_string(), "height".to_string(), "roll".to_string()];
        assert_eq!(
            parse_rules(&keys),
            vec![TieBreakRule::Cgpa, TieBreakRule::Roll]
        );
    }

    #[test]
    fn test_parse_rules_empty_falls_back_to_default() {
        assert_eq!(parse_rules(&[]), default_rules());
        assert_eq!(parse_rules(&["unknown".to_string()]), default_rules());
    }
}
