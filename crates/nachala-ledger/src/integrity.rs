//! Integrity reporter - on-demand classification of the whole portfolio
//!
//! Recomputed fully on every call from committed state only; staged edits
//! are invisible here (the session reports those separately as "partial -
//! not saved"). This is a low-frequency diagnostic, not a hot path, so there
//! is no incremental caching to invalidate.

use std::collections::{BTreeSet, HashSet};

use crate::store::PortfolioStore;
use crate::types::IntegrityReport;
use crate::validate::{share_total, FULL_ALLOCATION};

/// Classify every asset and surface structural anomalies.
///
/// Each asset lands in exactly one of the four classification sets. Anything
/// in `over_allocated` or `issues` means a gate was bypassed somewhere;
/// violations are surfaced as data so callers can display them without
/// crashing.
pub fn check_integrity(store: &PortfolioStore) -> IntegrityReport {
    let mut over_allocated = BTreeSet::new();
    let mut fully_allocated = BTreeSet::new();
    let mut partially_allocated = BTreeSet::new();
    let mut unallocated = BTreeSet::new();
    let mut issues = Vec::new();

    for asset in store.assets() {
        let shares = store.get_shares(&asset.id);
        let total = share_total(shares);
        match total {
            0 => {
                unallocated.insert(asset.id.clone());
            }
            t if t == FULL_ALLOCATION => {
                fully_allocated.insert(asset.id.clone());
            }
            t if t < FULL_ALLOCATION => {
                partially_allocated.insert(asset.id.clone());
            }
            t => {
                over_allocated.insert(asset.id.clone());
                issues.push(format!("asset {} is over-allocated at {}%", asset.id, t));
            }
        }

        let mut seen = HashSet::new();
        for share in shares {
            if !seen.insert(share.heir_id.as_str()) {
                issues.push(format!(
                    "asset {} holds duplicate shares for heir {}",
                    asset.id, share.heir_id
                ));
            }
            if share.percentage == 0 {
                issues.push(format!(
                    "asset {} holds a zero-percentage share for heir {}",
                    asset.id, share.heir_id
                ));
            }
            if store.heir(&share.heir_id).is_none() {
                issues.push(format!(
                    "asset {} has a share for unknown heir {}",
                    asset.id, share.heir_id
                ));
            }
        }
    }

    // Committed shares referencing assets the registry no longer knows.
    // Sorted so repeated calls produce identical reports.
    let mut orphaned: Vec<&str> = store
        .share_asset_ids()
        .into_iter()
        .filter(|id| store.asset(id).is_none())
        .collect();
    orphaned.sort_unstable();
    for asset_id in orphaned {
        issues.push(format!("distributions exist for unknown asset {asset_id}"));
    }

    IntegrityReport {
        asset_count: store.asset_count() as u32,
        distribution_count: store.distribution_count() as u32,
        over_allocated,
        fully_allocated,
        partially_allocated,
        unallocated,
        issues,
    }
}
