//! Backend actor interface
//!
//! The persistence actor (a canister in production) is consumed through this
//! trait. Each call is its own request/response round trip: `set` is an
//! atomic full replace for one asset, never a partial write.
//!
//! Capabilities are reported once and negotiated at session start; there is
//! no per-call probing for optional methods. A backend that cannot perform
//! atomic replace cannot host a ledger session at all.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{LedgerError, Result};
use crate::types::Share;

/// What a connected backend can do, resolved once per session
#[derive(Debug, Clone, Copy)]
pub struct BackendCapabilities {
    /// Supports `set_asset_distributions` as an atomic full replace.
    /// Mandatory; a session refuses to connect without it.
    pub atomic_replace: bool,
    /// Supports `delete_distribution` for single (asset, heir) rows.
    /// Optional; removal falls back to read-modify-write without it.
    pub fine_grained_delete: bool,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            atomic_replace: true,
            fine_grained_delete: false,
        }
    }
}

/// Persistence actor for committed distributions
#[async_trait]
pub trait DistributionBackend: Send + Sync {
    /// Capability report used for session negotiation
    fn capabilities(&self) -> BackendCapabilities;

    /// Committed shares for one asset. Query, no side effects.
    async fn get_asset_distributions(&self, asset_id: &str) -> Result<Vec<Share>>;

    /// Atomic full replace of one asset's committed shares. An empty set
    /// clears the asset.
    async fn set_asset_distributions(&self, asset_id: &str, shares: Vec<Share>) -> Result<()>;

    /// Remove one (asset, heir) row. Backends without the capability keep
    /// this default; callers emulate via read-modify-write.
    async fn delete_distribution(&self, asset_id: &str, heir_id: &str) -> Result<()> {
        let _ = (asset_id, heir_id);
        Err(LedgerError::Unsupported {
            capability: "delete_distribution",
        })
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// In-memory stand-in for the production canister.
///
/// Used by tests and the CLI. Write faults are injected deterministically:
/// [`MemoryBackend::fail_next_writes`] makes the next n mutating calls fail
/// with a persistence error, which is how the fail-closed commit path is
/// exercised without randomness.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    distributions: RwLock<HashMap<String, Vec<Share>>>,
    pending_write_faults: AtomicU32,
    fine_grained_delete: bool,
}

impl MemoryBackend {
    /// Backend with the full capability set
    pub fn new() -> Self {
        Self {
            distributions: RwLock::new(HashMap::new()),
            pending_write_faults: AtomicU32::new(0),
            fine_grained_delete: true,
        }
    }

    /// Backend that only offers the two mandatory calls; removals must be
    /// emulated via read-modify-write
    pub fn without_fine_grained_delete() -> Self {
        Self {
            fine_grained_delete: false,
            ..Self::new()
        }
    }

    /// Arm n write faults: the next n mutating calls fail
    pub fn fail_next_writes(&self, n: u32) {
        self.pending_write_faults.store(n, Ordering::SeqCst);
    }

    /// Plant raw state directly, bypassing every gate. Test hook for
    /// exercising defensive paths (e.g. an over-allocated backend).
    pub async fn seed_raw(&self, asset_id: &str, shares: Vec<Share>) {
        self.distributions
            .write()
            .await
            .insert(asset_id.to_string(), shares);
    }

    fn take_write_fault(&self) -> bool {
        self.pending_write_faults
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DistributionBackend for MemoryBackend {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            atomic_replace: true,
            fine_grained_delete: self.fine_grained_delete,
        }
    }

    async fn get_asset_distributions(&self, asset_id: &str) -> Result<Vec<Share>> {
        Ok(self
            .distributions
            .read()
            .await
            .get(asset_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_asset_distributions(&self, asset_id: &str, shares: Vec<Share>) -> Result<()> {
        if self.take_write_fault() {
            return Err(LedgerError::Persistence(format!(
                "injected write fault for asset {asset_id}"
            )));
        }
        let mut distributions = self.distributions.write().await;
        if shares.is_empty() {
            distributions.remove(asset_id);
        } else {
            distributions.insert(asset_id.to_string(), shares);
        }
        Ok(())
    }

    async fn delete_distribution(&self, asset_id: &str, heir_id: &str) -> Result<()> {
        if !self.fine_grained_delete {
            return Err(LedgerError::Unsupported {
                capability: "delete_distribution",
            });
        }
        if self.take_write_fault() {
            return Err(LedgerError::Persistence(format!(
                "injected write fault for asset {asset_id}"
            )));
        }
        let mut distributions = self.distributions.write().await;
        if let Some(shares) = distributions.get_mut(asset_id) {
            shares.retain(|s| s.heir_id != heir_id);
            if shares.is_empty() {
                distributions.remove(asset_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let backend = MemoryBackend::new();
        let shares = vec![Share::new("A1", "H1", 60), Share::new("A1", "H2", 40)];
        backend.set_asset_distributions("A1", shares.clone()).await.unwrap();
        assert_eq!(backend.get_asset_distributions("A1").await.unwrap(), shares);
    }

    #[tokio::test]
    async fn empty_set_clears_the_asset() {
        let backend = MemoryBackend::new();
        backend
            .set_asset_distributions("A1", vec![Share::new("A1", "H1", 100)])
            .await
            .unwrap();
        backend.set_asset_distributions("A1", Vec::new()).await.unwrap();
        assert!(backend.get_asset_distributions("A1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_faults_fire_once_each() {
        let backend = MemoryBackend::new();
        backend.fail_next_writes(1);
        assert!(backend
            .set_asset_distributions("A1", vec![Share::new("A1", "H1", 100)])
            .await
            .is_err());
        assert!(backend
            .set_asset_distributions("A1", vec![Share::new("A1", "H1", 100)])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn delete_distribution_is_gated_by_capability() {
        let backend = MemoryBackend::without_fine_grained_delete();
        let err = backend.delete_distribution("A1", "H1").await.unwrap_err();
        assert!(matches!(err, LedgerError::Unsupported { capability: "delete_distribution" }));
    }

    #[tokio::test]
    async fn delete_distribution_removes_one_row() {
        let backend = MemoryBackend::new();
        backend
            .set_asset_distributions(
                "A1",
                vec![Share::new("A1", "H1", 60), Share::new("A1", "H2", 40)],
            )
            .await
            .unwrap();
        backend.delete_distribution("A1", "H1").await.unwrap();
        let remaining = backend.get_asset_distributions("A1").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].heir_id, "H2");
    }
}
