//! Allocation validator - the gate every share mutation passes through
//!
//! Pure functions, no state. The rules:
//! - each percentage is an integer in 1..=100 (a zero share is "no share")
//! - at most one share per heir per asset
//! - the per-asset total never exceeds 100
//!
//! Both incremental edits and bulk replaces go through here before anything
//! touches the store or the backend.

use std::collections::HashSet;

use crate::error::AllocationFault;
use crate::types::Share;

/// An asset is fully allocated at exactly this total
pub const FULL_ALLOCATION: u32 = 100;

/// Sum of percentages for one asset's shares
pub fn share_total(shares: &[Share]) -> u32 {
    shares.iter().map(|s| u32::from(s.percentage)).sum()
}

fn check_range(share: &Share) -> Result<(), AllocationFault> {
    if share.percentage == 0 || share.percentage > 100 {
        return Err(AllocationFault::PercentageOutOfRange {
            heir_id: share.heir_id.clone(),
            percentage: share.percentage,
        });
    }
    Ok(())
}

/// Validate a whole proposed share set for one asset (bulk replace).
///
/// The empty set is valid: it is the "fully cleared" endpoint.
pub fn validate_share_set(shares: &[Share]) -> Result<(), AllocationFault> {
    let mut seen = HashSet::new();
    let mut total: u32 = 0;
    for share in shares {
        check_range(share)?;
        if !seen.insert(share.heir_id.as_str()) {
            return Err(AllocationFault::DuplicateHeir {
                heir_id: share.heir_id.clone(),
            });
        }
        total += u32::from(share.percentage);
    }
    if total > FULL_ALLOCATION {
        return Err(AllocationFault::TotalExceeds100 { total });
    }
    Ok(())
}

/// Validate adding one new row to an existing set. The heir must not already
/// hold a share of the asset.
pub fn validate_added_row(existing: &[Share], candidate: &Share) -> Result<(), AllocationFault> {
    check_range(candidate)?;
    if existing.iter().any(|s| s.heir_id == candidate.heir_id) {
        return Err(AllocationFault::DuplicateHeir {
            heir_id: candidate.heir_id.clone(),
        });
    }
    let total = share_total(existing) + u32::from(candidate.percentage);
    if total > FULL_ALLOCATION {
        return Err(AllocationFault::TotalExceeds100 { total });
    }
    Ok(())
}

/// Validate replacing the candidate heir's existing row with a new
/// percentage. The heir's old row is excluded from the total.
pub fn validate_updated_row(existing: &[Share], candidate: &Share) -> Result<(), AllocationFault> {
    check_range(candidate)?;
    let total: u32 = existing
        .iter()
        .filter(|s| s.heir_id != candidate.heir_id)
        .map(|s| u32::from(s.percentage))
        .sum::<u32>()
        + u32::from(candidate.percentage);
    if total > FULL_ALLOCATION {
        return Err(AllocationFault::TotalExceeds100 { total });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(heir: &str, pct: u8) -> Share {
        Share::new("A1", heir, pct)
    }

    #[test]
    fn accepts_empty_set() {
        assert!(validate_share_set(&[]).is_ok());
    }

    #[test]
    fn accepts_single_full_share() {
        assert!(validate_share_set(&[share("H1", 100)]).is_ok());
    }

    #[test]
    fn rejects_zero_percentage() {
        let err = validate_share_set(&[share("H1", 0)]).unwrap_err();
        assert!(matches!(err, AllocationFault::PercentageOutOfRange { percentage: 0, .. }));
    }

    #[test]
    fn rejects_over_100_percentage() {
        let err = validate_share_set(&[share("H1", 101)]).unwrap_err();
        assert!(matches!(err, AllocationFault::PercentageOutOfRange { percentage: 101, .. }));
    }

    #[test]
    fn rejects_duplicate_heir() {
        let err = validate_share_set(&[share("H1", 40), share("H1", 30)]).unwrap_err();
        assert!(matches!(err, AllocationFault::DuplicateHeir { .. }));
    }

    #[test]
    fn rejects_total_over_100() {
        let err = validate_share_set(&[share("H1", 60), share("H2", 50)]).unwrap_err();
        assert_eq!(err, AllocationFault::TotalExceeds100 { total: 110 });
    }

    #[test]
    fn added_row_checks_against_existing_total() {
        let existing = [share("H1", 60)];
        assert!(validate_added_row(&existing, &share("H2", 40)).is_ok());
        let err = validate_added_row(&existing, &share("H2", 50)).unwrap_err();
        assert_eq!(err, AllocationFault::TotalExceeds100 { total: 110 });
    }

    #[test]
    fn added_row_rejects_existing_heir() {
        let existing = [share("H1", 60)];
        let err = validate_added_row(&existing, &share("H1", 10)).unwrap_err();
        assert!(matches!(err, AllocationFault::DuplicateHeir { .. }));
    }

    #[test]
    fn updated_row_excludes_own_old_entry() {
        let existing = [share("H1", 60), share("H2", 40)];
        // H1: 60 -> 50 leaves total at 90
        assert!(validate_updated_row(&existing, &share("H1", 50)).is_ok());
        // H1: 60 -> 70 would push the total to 110
        let err = validate_updated_row(&existing, &share("H1", 70)).unwrap_err();
        assert_eq!(err, AllocationFault::TotalExceeds100 { total: 110 });
    }

    #[test]
    fn share_total_sums_percentages() {
        assert_eq!(share_total(&[]), 0);
        assert_eq!(share_total(&[share("H1", 60), share("H2", 40)]), 100);
    }
}
