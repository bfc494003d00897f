//! Allocation Engine — converts ranked preferences plus capacity constraints
//! into a conflict-free assignment set.
//!
//! Two strategies are supported and both are load-bearing:
//!
//! - `RankSweep`: legacy behavior. For rank level r = 1 upward, walk the
//!   preference records in input order and assign each unassigned student's
//!   rank-r choice when it is eligible and has seats. Within a rank level
//!   this favors order of arrival, not merit.
//! - `MeritOrdered`: default. Students are stably sorted by the tie-break
//!   comparator, then each takes their best eligible choice with seats in a
//!   single greedy pass.
//!
//! The engine is pure and synchronous: inputs are snapshots, output is a
//! `RunOutcome`. All I/O happens at the boundary before and after.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::allocation::eligibility::is_eligible;
use crate::allocation::ledger::{CapacityError, CapacityLedger};
use crate::allocation::models::{
    Assignment, Method, PreferenceRecord, RunOutcome, SubjectSnapshot, WaitlistEntry,
    WaitlistReason,
};
use crate::allocation::tiebreak::{self, TieBreakRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    RankSweep,
    MeritOrdered,
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::MeritOrdered
    }
}

/// Everything one run needs, loaded fresh at its start.
#[derive(Debug, Clone)]
pub struct RunInput {
    pub subjects: Vec<SubjectSnapshot>,
    pub preferences: Vec<PreferenceRecord>,
    pub rules: Vec<TieBreakRule>,
}

/// Runs one allocation pass. `CapacityError` is unreachable as long as the
/// remaining-seats check precedes every decrement; it is propagated rather
/// than swallowed so a bug cannot silently oversubscribe.
pub fn run(input: &RunInput, strategy: Strategy) -> Result<RunOutcome, CapacityError> {
    let by_id: HashMap<Uuid, &SubjectSnapshot> =
        input.subjects.iter().map(|s| (s.id, s)).collect();
    let mut ledger = CapacityLedger::new(&input.subjects);
    let mut assigned: Vec<Assignment> = Vec::new();
    let mut taken: HashSet<Uuid> = HashSet::new();

    match strategy {
        Strategy::MeritOrdered => {
            let mut ordered: Vec<&PreferenceRecord> = input.preferences.iter().collect();
            // stable: ties keep input order
            ordered.sort_by(|x, y| tiebreak::compare(&x.student, &y.student, &input.rules));

            for record in ordered {
                if taken.contains(&record.student.id) {
                    continue;
                }
                let mut choices = record.choices.clone();
                choices.sort_by_key(|c| c.rank);
                for choice in &choices {
                    if try_assign(record, choice.subject_id, choice.rank, &by_id, &mut ledger)? {
                        taken.insert(record.student.id);
                        assigned.push(Assignment {
                            student_id: record.student.id,
                            subject_id: choice.subject_id,
                            rank: choice.rank,
                            method: Method::Auto,
                        });
                        break;
                    }
                }
            }
        }
        Strategy::RankSweep => {
            // Only the rank levels that actually occur are visited. A dense
            // 1..=max range would let a single absurd rank value (ranks are
            // unbounded above) stall the run on billions of empty levels.
            let levels: BTreeSet<u32> = input
                .preferences
                .iter()
                .flat_map(|p| p.choices.iter().map(|c| c.rank))
                .filter(|&r| r >= 1)
                .collect();

            for rank in levels {
                for record in &input.preferences {
                    if taken.contains(&record.student.id) {
                        continue;
                    }
                    let Some(choice) = record.choices.iter().find(|c| c.rank == rank) else {
                        continue;
                    };
                    if try_assign(record, choice.subject_id, rank, &by_id, &mut ledger)? {
                        taken.insert(record.student.id);
                        assigned.push(Assignment {
                            student_id: record.student.id,
                            subject_id: choice.subject_id,
                            rank,
                            method: Method::Auto,
                        });
                    }
                }
            }
        }
    }

    let mut waitlisted = Vec::new();
    let mut seen = HashSet::new();
    for record in &input.preferences {
        if !taken.contains(&record.student.id) && seen.insert(record.student.id) {
            waitlisted.push(WaitlistEntry {
                student_id: record.student.id,
                reason: WaitlistReason::NoEligibleChoiceWithCapacity,
            });
        }
    }

    Ok(RunOutcome {
        assigned,
        waitlisted,
        remaining: ledger.into_remaining(),
    })
}

/// Attempts one (student, subject) assignment. Unknown subject references are
/// skipped per-record; they never abort the run.
fn try_assign(
    record: &PreferenceRecord,
    subject_id: Uuid,
    rank: u32,
    by_id: &HashMap<Uuid, &SubjectSnapshot>,
    ledger: &mut CapacityLedger,
) -> Result<bool, CapacityError> {
    let Some(subject) = by_id.get(&subject_id) else {
        debug!(
            "Skipping unknown subject {subject_id} (rank {rank}) for student {}",
            record.student.id
        );
        return Ok(false);
    };
    if !is_eligible(&record.student, subject) {
        return Ok(false);
    }
    if ledger.remaining(subject_id) == 0 {
        return Ok(false);
    }
    ledger.decrement(subject_id)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::models::{Choice, StudentSnapshot};
    use crate::allocation::tiebreak::default_rules;

    fn student(id: u128, roll: &str, percent: f64) -> StudentSnapshot {
        StudentSnapshot {
            id: Uuid::from_u128(id),
            roll: roll.to_string(),
            branch: "CSE".to_string(),
            previous_elective: None,
            percent: Some(percent),
            cgpa: Some(8.0),
            dob: None,
        }
    }

    fn subject(id: u128, code: &str, capacity: u32) -> SubjectSnapshot {
        SubjectSnapshot {
            id: Uuid::from_u128(id),
            code: code.to_string(),
            capacity,
            eligible_branches: vec![],
            required_prior_electives: vec![],
            min_percent: 0.0,
        }
    }

    fn record(student: StudentSnapshot, choices: &[(u128, u32)]) -> PreferenceRecord {
        PreferenceRecord {
            student,
            choices: choices
                .iter()
                .map(|&(sid, rank)| Choice {
                    subject_id: Uuid::from_u128(sid),
                    rank,
                })
                .collect(),
        }
    }

    fn input(subjects: Vec<SubjectSnapshot>, preferences: Vec<PreferenceRecord>) -> RunInput {
        RunInput {
            subjects,
            preferences,
            rules: default_rules(),
        }
    }

    #[test]
    fn test_merit_assigns_contested_seat_to_higher_percent() {
        // subject X has one seat; A (90%) and B (70%) both rank it first
        let inp = input(
            vec![subject(1, "X", 1)],
            vec![
                record(student(10, "B1", 70.0), &[(1, 1)]),
                record(student(11, "A1", 90.0), &[(1, 1)]),
            ],
        );
        let out = run(&inp, Strategy::MeritOrdered).unwrap();
        assert_eq!(out.assigned.len(), 1);
        assert_eq!(out.assigned[0].student_id, Uuid::from_u128(11));
        assert_eq!(out.waitlisted.len(), 1);
        assert_eq!(out.waitlisted[0].student_id, Uuid::from_u128(10));
        assert_eq!(
            out.waitlisted[0].reason,
            WaitlistReason::NoEligibleChoiceWithCapacity
        );
    }

    #[test]
    fn test_merit_falls_through_to_lower_ranked_choice() {
        let inp = input(
            vec![subject(1, "X", 1), subject(2, "Y", 1)],
            vec![
                record(student(10, "A1", 90.0), &[(1, 1), (2, 2)]),
                record(student(11, "B1", 80.0), &[(1, 1), (2, 2)]),
            ],
        );
        let out = run(&inp, Strategy::MeritOrdered).unwrap();
        assert_eq!(out.assigned.len(), 2);
        let by_student: HashMap<Uuid, &Assignment> =
            out.assigned.iter().map(|a| (a.student_id, a)).collect();
        assert_eq!(by_student[&Uuid::from_u128(10)].subject_id, Uuid::from_u128(1));
        assert_eq!(by_student[&Uuid::from_u128(10)].rank, 1);
        assert_eq!(by_student[&Uuid::from_u128(11)].subject_id, Uuid::from_u128(2));
        assert_eq!(by_student[&Uuid::from_u128(11)].rank, 2);
    }

    #[test]
    fn test_rank_sweep_favors_input_order_within_rank() {
        // same contested seat, but the legacy sweep serves whoever comes
        // first in the input, ignoring merit
        let inp = input(
            vec![subject(1, "X", 1)],
            vec![
                record(student(10, "B1", 70.0), &[(1, 1)]),
                record(student(11, "A1", 90.0), &[(1, 1)]),
            ],
        );
        let out = run(&inp, Strategy::RankSweep).unwrap();
        assert_eq!(out.assigned.len(), 1);
        assert_eq!(out.assigned[0].student_id, Uuid::from_u128(10));
    }

    #[test]
    fn test_rank_sweep_completes_rank_level_before_descending() {
        // A's rank-1 choice has no seats; B ranks Y first. Even though A
        // precedes B in the input, the whole rank-1 level is served before
        // A's rank-2 fallback is tried, so Y's only seat goes to B.
        let inp = input(
            vec![subject(1, "X", 0), subject(2, "Y", 1)],
            vec![
                record(student(10, "A1", 90.0), &[(1, 1), (2, 2)]),
                record(student(11, "B1", 70.0), &[(2, 1)]),
            ],
        );
        let out = run(&inp, Strategy::RankSweep).unwrap();
        assert_eq!(out.assigned.len(), 1);
        assert_eq!(out.assigned[0].student_id, Uuid::from_u128(11));
        assert_eq!(out.assigned[0].subject_id, Uuid::from_u128(2));
        assert_eq!(out.waitlisted.len(), 1);
        assert_eq!(out.waitlisted[0].student_id, Uuid::from_u128(10));
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let inp = input(
            vec![subject(1, "X", 2)],
            (0..10)
                .map(|i| record(student(100 + i, &format!("R{i:02}"), 50.0 + i as f64), &[(1, 1)]))
                .collect(),
        );
        for strategy in [Strategy::MeritOrdered, Strategy::RankSweep] {
            let out = run(&inp, strategy).unwrap();
            assert_eq!(out.assigned.len(), 2);
            assert_eq!(out.waitlisted.len(), 8);
            assert_eq!(out.remaining[&Uuid::from_u128(1)], 0);
        }
    }

    #[test]
    fn test_no_student_both_assigned_and_waitlisted() {
        let inp = input(
            vec![subject(1, "X", 1), subject(2, "Y", 1)],
            vec![
                record(student(10, "A1", 90.0), &[(1, 1)]),
                record(student(11, "B1", 85.0), &[(1, 1)]),
                record(student(12, "C1", 80.0), &[(2, 1)]),
            ],
        );
        let out = run(&inp, Strategy::MeritOrdered).unwrap();
        let assigned: HashSet<Uuid> = out.assigned.iter().map(|a| a.student_id).collect();
        for w in &out.waitlisted {
            assert!(!assigned.contains(&w.student_id));
        }
        assert_eq!(assigned.len() + out.waitlisted.len(), 3);
    }

    #[test]
    fn test_every_assignment_satisfies_eligibility() {
        let mut restricted = subject(1, "X", 5);
        restricted.eligible_branches = vec!["IT".to_string()];
        let open = subject(2, "Y", 5);
        let inp = input(
            vec![restricted.clone(), open.clone()],
            vec![
                record(student(10, "A1", 90.0), &[(1, 1), (2, 2)]),
                record(student(11, "B1", 85.0), &[(1, 1), (2, 2)]),
            ],
        );
        let out = run(&inp, Strategy::MeritOrdered).unwrap();
        let subjects: HashMap<Uuid, &SubjectSnapshot> =
            [(restricted.id, &restricted), (open.id, &open)].into();
        for a in &out.assigned {
            let rec = inp
                .preferences
                .iter()
                .find(|p| p.student.id == a.student_id)
                .unwrap();
            assert!(is_eligible(&rec.student, subjects[&a.subject_id]));
            // CSE students can only land in the open subject
            assert_eq!(a.subject_id, Uuid::from_u128(2));
        }
    }

    #[test]
    fn test_ineligible_prior_elective_never_assigned() {
        let mut y = subject(1, "Y", 10);
        y.required_prior_electives = vec!["DBMS".to_string()];
        let mut c = student(10, "C1", 95.0);
        c.previous_elective = Some("NONE".to_string());
        let inp = input(vec![y], vec![record(c, &[(1, 1)])]);
        for strategy in [Strategy::MeritOrdered, Strategy::RankSweep] {
            let out = run(&inp, strategy).unwrap();
            assert!(out.assigned.is_empty());
            assert_eq!(out.waitlisted.len(), 1);
        }
    }

    #[test]
    fn test_merit_run_is_idempotent() {
        let inp = input(
            vec![subject(1, "X", 2), subject(2, "Y", 1)],
            vec![
                record(student(10, "A1", 91.0), &[(1, 1), (2, 2)]),
                record(student(11, "B1", 88.0), &[(2, 1), (1, 2)]),
                record(student(12, "C1", 84.0), &[(1, 1)]),
                record(student(13, "D1", 80.0), &[(2, 1)]),
            ],
        );
        let first = run(&inp, Strategy::MeritOrdered).unwrap();
        let second = run(&inp, Strategy::MeritOrdered).unwrap();
        let key = |o: &RunOutcome| {
            let mut v: Vec<(Uuid, Uuid, u32)> = o
                .assigned
                .iter()
                .map(|a| (a.student_id, a.subject_id, a.rank))
                .collect();
            v.sort();
            v
        };
        assert_eq!(key(&first), key(&second));
    }

    #[test]
    fn test_tiebreak_determinism_under_input_swap() {
        // identical percent/cgpa/dob: roll decides, so swapping input order
        // must not change who wins the seat
        let a = student(10, "21CS001", 85.0);
        let b = student(11, "21CS002", 85.0);
        let subjects = vec![subject(1, "X", 1)];

        let fwd = input(
            subjects.clone(),
            vec![record(a.clone(), &[(1, 1)]), record(b.clone(), &[(1, 1)])],
        );
        let rev = input(subjects, vec![record(b, &[(1, 1)]), record(a, &[(1, 1)])]);

        let out_fwd = run(&fwd, Strategy::MeritOrdered).unwrap();
        let out_rev = run(&rev, Strategy::MeritOrdered).unwrap();
        assert_eq!(out_fwd.assigned[0].student_id, Uuid::from_u128(10));
        assert_eq!(out_rev.assigned[0].student_id, Uuid::from_u128(10));
    }

    #[test]
    fn test_duplicate_record_for_assigned_student_is_skipped() {
        let a = student(10, "A1", 90.0);
        let inp = input(
            vec![subject(1, "X", 5)],
            vec![record(a.clone(), &[(1, 1)]), record(a, &[(1, 1)])],
        );
        for strategy in [Strategy::MeritOrdered, Strategy::RankSweep] {
            let out = run(&inp, strategy).unwrap();
            assert_eq!(out.assigned.len(), 1);
            assert_eq!(out.remaining[&Uuid::from_u128(1)], 4);
        }
    }

    #[test]
    fn test_unknown_subject_reference_is_skipped_not_fatal() {
        let inp = input(
            vec![subject(1, "X", 1)],
            vec![record(student(10, "A1", 90.0), &[(99, 1), (1, 2)])],
        );
        let out = run(&inp, Strategy::MeritOrdered).unwrap();
        assert_eq!(out.assigned.len(), 1);
        assert_eq!(out.assigned[0].subject_id, Uuid::from_u128(1));
        assert_eq!(out.assigned[0].rank, 2);
    }

    #[test]
    fn test_gaps_in_rank_numbering_are_tolerated() {
        // ranks 2 and 5 only; the sweep must still reach rank 5
        let inp = input(
            vec![subject(1, "X", 1), subject(2, "Y", 1)],
            vec![record(student(10, "A1", 90.0), &[(1, 2), (2, 5)])],
        );
        let out = run(&inp, Strategy::RankSweep).unwrap();
        assert_eq!(out.assigned.len(), 1);
        assert_eq!(out.assigned[0].rank, 2);
    }

    #[test]
    fn test_rank_sweep_visits_only_observed_levels() {
        // an absurd rank value must cost one sweep level, not billions of
        // empty ones; the run still terminates and seats both students
        let inp = input(
            vec![subject(1, "X", 1), subject(2, "Y", 1)],
            vec![
                record(student(10, "A1", 90.0), &[(2, u32::MAX)]),
                record(student(11, "B1", 70.0), &[(1, 2_000_000_000)]),
            ],
        );
        let out = run(&inp, Strategy::RankSweep).unwrap();
        assert_eq!(out.assigned.len(), 2);
        let by_student: HashMap<Uuid, &Assignment> =
            out.assigned.iter().map(|a| (a.student_id, a)).collect();
        assert_eq!(by_student[&Uuid::from_u128(11)].subject_id, Uuid::from_u128(1));
        assert_eq!(by_student[&Uuid::from_u128(10)].subject_id, Uuid::from_u128(2));
    }

    #[test]
    fn test_empty_inputs_produce_empty_outcome() {
        let inp = input(vec![], vec![]);
        for strategy in [Strategy::MeritOrdered, Strategy::RankSweep] {
            let out = run(&inp, strategy).unwrap();
            assert!(out.assigned.is_empty());
            assert!(out.waitlisted.is_empty());
            assert!(out.remaining.is_empty());
        }
    }

    #[test]
    fn test_remaining_counts_reported_for_untouched_subjects() {
        let inp = input(
            vec![subject(1, "X", 3), subject(2, "Y", 7)],
            vec![record(student(10, "A1", 90.0), &[(1, 1)])],
        );
        let out = run(&inp, Strategy::MeritOrdered).unwrap();
        assert_eq!(out.remaining[&Uuid::from_u128(1)], 2);
        assert_eq!(out.remaining[&Uuid::from_u128(2)], 7);
    }
}
