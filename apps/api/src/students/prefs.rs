//! Preference-list validation: ranks are unique positive integers and no
//! subject may appear twice. Pure so the rules are testable apart from the
//! upsert path.

use uuid::Uuid;

use crate::allocation::models::Choice;

/// Gaps in rank numbering are fine, but the values themselves stay small.
/// No session offers anywhere near this many subjects.
pub const MAX_RANK: u32 = 100;

pub fn validate_choices(choices: &[Choice]) -> Result<(), String> {
    let mut ranks: Vec<u32> = Vec::with_capacity(choices.len());
    let mut subjects: Vec<Uuid> = Vec::with_capacity(choices.len());

    for choice in choices {
        if choice.rank < 1 {
            return Err("Invalid rank: ranks start at 1".to_string());
        }
        if choice.rank > MAX_RANK {
            return Err(format!("Invalid rank: maximum is {MAX_RANK}"));
        }
        if ranks.contains(&choice.rank) {
            return Err(format!("Duplicate rank {}", choice.rank));
        }
        if subjects.contains(&choice.subject_id) {
            return Err("Duplicate subject in choice list".to_string());
        }
        ranks.push(choice.rank);
        subjects.push(choice.subject_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(subject: u128, rank: u32) -> Choice {
        Choice {
            subject_id: Uuid::from_u128(subject),
            rank,
        }
    }

    #[test]
    fn test_valid_list_passes() {
        assert!(validate_choices(&[choice(1, 1), choice(2, 2), choice(3, 5)]).is_ok());
        assert!(validate_choices(&[]).is_ok());
    }

    #[test]
    fn test_zero_rank_rejected() {
        assert!(validate_choices(&[choice(1, 0)]).is_err());
    }

    #[test]
    fn test_oversized_rank_rejected() {
        assert!(validate_choices(&[choice(1, MAX_RANK)]).is_ok());
        let err = validate_choices(&[choice(1, 2_000_000_000)]).unwrap_err();
        assert!(err.contains("maximum"));
    }

    #[test]
    fn test_duplicate_rank_rejected() {
        let err = validate_choices(&[choice(1, 1), choice(2, 1)]).unwrap_err();
        assert!(err.contains("Duplicate rank"));
    }

    #[test]
    fn test_duplicate_subject_rejected() {
        let err = validate_choices(&[choice(1, 1), choice(1, 2)]).unwrap_err();
        assert!(err.contains("Duplicate subject"));
    }
}
