//! Capacity Ledger — remaining seats per subject for the duration of one
//! allocation run. Built fresh from static subject capacity at the start of
//! a run and discarded afterwards; it is never reconciled with persisted
//! allotments.

use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

use crate::allocation::models::SubjectSnapshot;

/// Internal invariant violation: a decrement was attempted on a subject with
/// no remaining seats. Callers must check `remaining() > 0` first, so hitting
/// this is a programming bug, not a user-facing condition.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("no remaining capacity for subject {subject_id}")]
pub struct CapacityError {
    pub subject_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct CapacityLedger {
    seats: HashMap<Uuid, u32>,
}

impl CapacityLedger {
    pub fn new(subjects: &[SubjectSnapshot]) -> Self {
        Self {
            seats: subjects.iter().map(|s| (s.id, s.capacity)).collect(),
        }
    }

    /// Remaining seats for a subject; 0 for subjects outside the run scope.
    pub fn remaining(&self, subject_id: Uuid) -> u32 {
        self.seats.get(&subject_id).copied().unwrap_or(0)
    }

    pub fn decrement(&mut self, subject_id: Uuid) -> Result<(), CapacityError> {
        match self.seats.get_mut(&subject_id) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Ok(())
            }
            _ => Err(CapacityError { subject_id }),
        }
    }

    /// Consumes the ledger, yielding the final remaining counts for reporting.
    pub fn into_remaining(self) -> HashMap<Uuid, u32> {
        self.seats
    }
}
