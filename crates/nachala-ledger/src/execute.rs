//! Execution trigger - release planning and dispatcher handoff
//!
//! "Distribute now": every asset whose committed shares total exactly 100
//! yields one release operation per share; every other asset yields a
//! diagnostic and nothing is released for it (no partial releases, ever).
//! Operations are handed to an external at-least-once dispatcher; the
//! handoff, not eventual delivery, is what this module guarantees. Guarding
//! against re-execution within an epoch belongs to the surrounding session
//! logic, not here.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::store::PortfolioStore;
use crate::types::{ExecutionPlan, ReleaseOperation, TransferMethod};
use crate::validate::{share_total, FULL_ALLOCATION};

/// Delivery seam for release operations
#[async_trait]
pub trait ReleaseDispatcher: Send + Sync {
    /// Hand one release operation to the delivery mechanism. Delivery
    /// retries and backoff live behind this seam, not in the ledger.
    async fn dispatch(&self, op: ReleaseOperation) -> Result<()>;
}

/// Dispatcher that collects operations in memory. Dry runs and tests.
#[derive(Debug, Default)]
pub struct CollectingDispatcher {
    operations: Mutex<Vec<ReleaseOperation>>,
}

impl CollectingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn operations(&self) -> Vec<ReleaseOperation> {
        self.operations.lock().await.clone()
    }
}

#[async_trait]
impl ReleaseDispatcher for CollectingDispatcher {
    async fn dispatch(&self, op: ReleaseOperation) -> Result<()> {
        self.operations.lock().await.push(op);
        Ok(())
    }
}

/// Heir entitlement in smallest currency units, floor division
fn entitlement(asset_value: u64, percentage: u8) -> u64 {
    (u128::from(asset_value) * u128::from(percentage) / 100) as u64
}

/// Plan a release run over committed state
pub fn plan_release(store: &PortfolioStore) -> ExecutionPlan {
    let mut operations = Vec::new();
    let mut diagnostics = Vec::new();

    for asset in store.assets() {
        let shares = store.get_shares(&asset.id);
        let total = share_total(shares);
        if total != FULL_ALLOCATION {
            diagnostics.push(format!(
                "no complete distribution for asset {} (total {}%)",
                asset.id, total
            ));
            continue;
        }
        let method = TransferMethod::for_custody(asset.custody);
        for share in shares {
            operations.push(ReleaseOperation {
                asset_id: share.asset_id.clone(),
                heir_id: share.heir_id.clone(),
                percentage: share.percentage,
                method,
                amount: entitlement(asset.value, share.percentage),
            });
        }
    }

    ExecutionPlan {
        operations,
        diagnostics,
    }
}

/// Plan, then hand every operation to the dispatcher
pub async fn execute_release(
    store: &PortfolioStore,
    dispatcher: &dyn ReleaseDispatcher,
) -> Result<ExecutionPlan> {
    let plan = plan_release(store);
    for op in &plan.operations {
        debug!(
            asset_id = %op.asset_id,
            heir_id = %op.heir_id,
            percentage = op.percentage,
            method = ?op.method,
            "dispatching release operation"
        );
        dispatcher.dispatch(op.clone()).await?;
    }
    info!(
        operations = plan.operations.len(),
        skipped = plan.diagnostics.len(),
        "release run handed off"
    );
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Asset, CustodyMode, Heir, Share};

    fn portfolio() -> PortfolioStore {
        let mut store = PortfolioStore::new();
        store
            .add_asset(Asset::new("A1", "House", 500_000, "property", CustodyMode::ApprovalRequired))
            .unwrap();
        store
            .add_asset(Asset::new("A2", "Car", 20_000, "vehicle", CustodyMode::Direct))
            .unwrap();
        store.add_heir(Heir::new("H1", "Miriam", "daughter")).unwrap();
        store.add_heir(Heir::new("H2", "Ruth", "spouse")).unwrap();
        store
            .replace_shares("A1", vec![Share::new("A1", "H1", 60), Share::new("A1", "H2", 40)])
            .unwrap();
        store
    }

    #[test]
    fn complete_assets_release_one_operation_per_share() {
        let store = portfolio();
        let plan = plan_release(&store);
        assert_eq!(plan.operations.len(), 2);
        assert_eq!(plan.diagnostics.len(), 1);
        assert!(plan.diagnostics[0].contains("A2"));

        let to_h1 = &plan.operations[0];
        assert_eq!(to_h1.heir_id, "H1");
        assert_eq!(to_h1.method, TransferMethod::StagedApproval);
        assert_eq!(to_h1.amount, 300_000);
    }

    #[test]
    fn partial_assets_are_never_released() {
        let mut store = portfolio();
        store.adopt_shares("A2", vec![Share::new("A2", "H1", 45)]);
        let plan = plan_release(&store);
        assert!(plan.operations.iter().all(|op| op.asset_id == "A1"));
        assert!(plan.diagnostics.iter().any(|d| d.contains("A2") && d.contains("45%")));
    }

    #[test]
    fn entitlement_floors_and_never_overflows() {
        assert_eq!(entitlement(1_000, 40), 400);
        assert_eq!(entitlement(999, 33), 329);
        assert_eq!(entitlement(u64::MAX, 100), u64::MAX);
    }

    #[tokio::test]
    async fn execute_hands_every_operation_to_the_dispatcher() {
        let store = portfolio();
        let dispatcher = CollectingDispatcher::new();
        let plan = execute_release(&store, &dispatcher).await.unwrap();
        assert_eq!(dispatcher.operations().await, plan.operations);
    }
}
