//! Ledger session - staged edits and the atomic commit protocol
//!
//! A session owns one user's portfolio: the committed mirror
//! ([`PortfolioStore`]), the per-asset staged share sets, and the backend
//! handle. Edits are staged locally and pushed to the backend only when the
//! staged set for their asset totals exactly 0 (fully cleared) or exactly
//! 100 (fully allocated); anything in between stays local and the asset
//! reads as "partial - not saved". The backend's replace is atomic but not
//! partial, and committing only at the two endpoints keeps every observer
//! (integrity reporter, execution trigger) agreed on what "done" means.
//!
//! Commit failure is fail-closed: the local edit is discarded, authoritative
//! state is re-fetched from the backend, and the error surfaces. There is no
//! optimistic-and-silent local apply, for add, remove, and percentage edits
//! alike.
//!
//! Mutation entry points serialize on one write lock (last write wins across
//! concurrent sessions is accepted, per the product's single-owner model);
//! reads take the read lock and may observe a snapshot one mutation stale.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::{BackendCapabilities, DistributionBackend};
use crate::error::{LedgerError, Result};
use crate::execute::{self, ReleaseDispatcher};
use crate::identity;
use crate::integrity;
use crate::retry::RetryPolicy;
use crate::signals::{LedgerSignal, SignalHub};
use crate::store::PortfolioStore;
use crate::types::{Asset, ExecutionPlan, Heir, IntegrityReport, Share, ShareInput, UpdateAssetInput};
use crate::validate::{self, share_total, FULL_ALLOCATION};

/// The commit gate: staged totals are safe to persist only at the endpoints
pub fn commit_eligible(total: u32) -> bool {
    total == 0 || total == FULL_ALLOCATION
}

/// What happened to an edit after the commit gate looked at it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Edit is staged locally; the asset total is not at an endpoint yet
    Staged { total: u32 },
    /// Edit reached the backend as an atomic replace
    Committed { total: u32 },
}

impl CommitOutcome {
    pub fn total(&self) -> u32 {
        match self {
            CommitOutcome::Staged { total } | CommitOutcome::Committed { total } => *total,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed { .. })
    }
}

#[derive(Default)]
struct SessionState {
    store: PortfolioStore,
    /// Per-asset staged share sets, present only while they differ from the
    /// committed mirror
    staged: HashMap<String, Vec<Share>>,
}

/// One user's ledger session against one backend
pub struct LedgerSession {
    backend: Arc<dyn DistributionBackend>,
    caps: BackendCapabilities,
    retry: RetryPolicy,
    signals: SignalHub,
    state: RwLock<SessionState>,
}

impl std::fmt::Debug for LedgerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerSession")
            .field("caps", &self.caps)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl LedgerSession {
    /// Connect to a backend, negotiating capabilities once.
    ///
    /// A backend without atomic replace cannot honor the commit protocol at
    /// all, so that is refused here rather than discovered mid-edit.
    pub fn connect(backend: Arc<dyn DistributionBackend>, retry: RetryPolicy) -> Result<Self> {
        let caps = backend.capabilities();
        if !caps.atomic_replace {
            return Err(LedgerError::Unsupported {
                capability: "set_asset_distributions",
            });
        }
        info!(
            fine_grained_delete = caps.fine_grained_delete,
            "ledger session connected"
        );
        Ok(Self {
            backend,
            caps,
            retry,
            signals: SignalHub::new(),
            state: RwLock::new(SessionState::default()),
        })
    }

    /// Hub for "integrity changed" and commit notifications
    pub fn signals(&self) -> &SignalHub {
        &self.signals
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        self.caps
    }

    // ========================================================================
    // Registry: assets
    // ========================================================================

    pub async fn add_asset(&self, asset: Asset) -> Result<()> {
        self.state.write().await.store.add_asset(asset)
    }

    pub async fn update_asset(&self, asset_id: &str, input: &UpdateAssetInput) -> Result<Asset> {
        self.state.write().await.store.update_asset(asset_id, input)
    }

    /// Remove an asset. The backend is cleared first (atomic empty replace);
    /// only then do the registry entry, its shares, and any staged edit go.
    pub async fn remove_asset(&self, asset_id: &str) -> Result<Asset> {
        let mut state = self.state.write().await;
        if state.store.asset(asset_id).is_none() {
            return Err(LedgerError::AssetNotFound(asset_id.to_string()));
        }
        self.commit_shares(&mut state, asset_id, Vec::new()).await?;
        state.store.remove_asset(asset_id)
    }

    pub async fn asset(&self, asset_id: &str) -> Option<Asset> {
        self.state.read().await.store.asset(asset_id).cloned()
    }

    pub async fn assets(&self) -> Vec<Asset> {
        self.state.read().await.store.assets().into_iter().cloned().collect()
    }

    // ========================================================================
    // Registry: heirs
    // ========================================================================

    pub async fn add_heir(&self, heir: Heir) -> Result<()> {
        self.state.write().await.store.add_heir(heir)
    }

    /// Remove a heir; rejected while they still hold shares anywhere
    pub async fn remove_heir(&self, heir_id: &str) -> Result<Heir> {
        self.state.write().await.store.remove_heir(heir_id)
    }

    pub async fn heirs(&self) -> Vec<Heir> {
        self.state.read().await.store.heirs().into_iter().cloned().collect()
    }

    /// Derive and store a verification hash for a heir's claim secret. The
    /// secret itself is never retained.
    pub async fn set_heir_verification(
        &self,
        heir_id: &str,
        secret: &str,
        salt: &str,
    ) -> Result<Heir> {
        let hash = identity::derive_verification_hash(secret, salt);
        self.state
            .write()
            .await
            .store
            .set_heir_verification_hash(heir_id, hash)
    }

    /// Check a presented claim secret against the heir's stored hash.
    /// `Ok(false)` also covers heirs with no hash on record.
    pub async fn verify_heir(&self, heir_id: &str, secret: &str, salt: &str) -> Result<bool> {
        let state = self.state.read().await;
        let heir = state
            .store
            .heir(heir_id)
            .ok_or_else(|| LedgerError::HeirNotFound(heir_id.to_string()))?;
        Ok(heir
            .verification_hash
            .as_deref()
            .is_some_and(|hash| identity::verify_secret(secret, salt, hash)))
    }

    // ========================================================================
    // Shares: staged edits through the commit gate
    // ========================================================================

    /// Committed shares for one asset (what the backend has accepted)
    pub async fn get_shares(&self, asset_id: &str) -> Result<Vec<Share>> {
        let state = self.state.read().await;
        if state.store.asset(asset_id).is_none() {
            return Err(LedgerError::AssetNotFound(asset_id.to_string()));
        }
        Ok(state.store.get_shares(asset_id).to_vec())
    }

    /// The share set an edit would apply to: staged if present, else
    /// committed
    pub async fn staged_shares(&self, asset_id: &str) -> Result<Vec<Share>> {
        let state = self.state.read().await;
        if state.store.asset(asset_id).is_none() {
            return Err(LedgerError::AssetNotFound(asset_id.to_string()));
        }
        Ok(working_set(&state, asset_id))
    }

    /// Asset ids with a staged edit that has not reached the backend
    /// ("partial - not saved"), sorted for stable display
    pub async fn partial_assets(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut ids: Vec<String> = state.staged.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Drop a staged edit, keeping committed state as-is
    pub async fn discard_staged(&self, asset_id: &str) {
        self.state.write().await.staged.remove(asset_id);
    }

    /// Add one share. Commits when the staged total reaches 100, otherwise
    /// stages.
    pub async fn add_share(
        &self,
        asset_id: &str,
        heir_id: &str,
        percentage: u8,
    ) -> Result<CommitOutcome> {
        let mut state = self.state.write().await;
        self.check_refs(&state, asset_id, Some(heir_id))?;

        let mut working = working_set(&state, asset_id);
        let candidate = Share::new(asset_id, heir_id, percentage);
        validate::validate_added_row(&working, &candidate)?;
        working.push(candidate);

        self.settle(&mut state, asset_id, working).await
    }

    /// Change an existing share's percentage
    pub async fn update_share(
        &self,
        asset_id: &str,
        heir_id: &str,
        percentage: u8,
    ) -> Result<CommitOutcome> {
        let mut state = self.state.write().await;
        self.check_refs(&state, asset_id, Some(heir_id))?;

        let mut working = working_set(&state, asset_id);
        if !working.iter().any(|s| s.heir_id == heir_id) {
            return Err(LedgerError::ShareNotFound {
                asset_id: asset_id.to_string(),
                heir_id: heir_id.to_string(),
            });
        }
        let candidate = Share::new(asset_id, heir_id, percentage);
        validate::validate_updated_row(&working, &candidate)?;
        for share in &mut working {
            if share.heir_id == heir_id {
                share.percentage = percentage;
            }
        }

        self.settle(&mut state, asset_id, working).await
    }

    /// Remove one share. Removing the last share zeroes the asset out and
    /// commits the empty set.
    pub async fn remove_share(&self, asset_id: &str, heir_id: &str) -> Result<CommitOutcome> {
        let mut state = self.state.write().await;
        self.check_refs(&state, asset_id, None)?;

        let working = working_set(&state, asset_id);
        if !working.iter().any(|s| s.heir_id == heir_id) {
            return Err(LedgerError::ShareNotFound {
                asset_id: asset_id.to_string(),
                heir_id: heir_id.to_string(),
            });
        }

        // Single committed row with no staged divergence: use the backend's
        // fine-grained delete when it has one
        let direct_delete = self.caps.fine_grained_delete
            && !state.staged.contains_key(asset_id)
            && working.len() == 1;

        let mut remaining = working;
        remaining.retain(|s| s.heir_id != heir_id);

        if direct_delete && remaining.is_empty() {
            return self.commit_delete(&mut state, asset_id, heir_id).await;
        }
        self.settle(&mut state, asset_id, remaining).await
    }

    /// Replace the whole distribution for one asset in one step. A complete
    /// (100%) or empty set commits immediately; a partial set replaces the
    /// staged edit wholesale and stays local.
    pub async fn replace_distributions(
        &self,
        asset_id: &str,
        entries: Vec<ShareInput>,
    ) -> Result<CommitOutcome> {
        let mut state = self.state.write().await;
        self.check_refs(&state, asset_id, None)?;
        for entry in &entries {
            if state.store.heir(&entry.heir_id).is_none() {
                return Err(LedgerError::HeirNotFound(entry.heir_id.clone()));
            }
        }

        let proposed: Vec<Share> = entries
            .into_iter()
            .map(|e| Share::new(asset_id, e.heir_id, e.percentage))
            .collect();
        validate::validate_share_set(&proposed)?;

        self.settle(&mut state, asset_id, proposed).await
    }

    /// Re-fetch authoritative state for every asset, discarding staged edits
    pub async fn sync_from_backend(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let asset_ids: Vec<String> =
            state.store.assets().iter().map(|a| a.id.clone()).collect();
        state.staged.clear();
        for asset_id in asset_ids {
            let backend = Arc::clone(&self.backend);
            let authoritative = self
                .retry
                .run("get_asset_distributions", || {
                    let backend = Arc::clone(&backend);
                    let asset_id = asset_id.clone();
                    async move { backend.get_asset_distributions(&asset_id).await }
                })
                .await?;
            if state.store.get_shares(&asset_id) != authoritative.as_slice() {
                state.store.adopt_shares(&asset_id, authoritative);
                self.signals.emit(LedgerSignal::IntegrityChanged {
                    asset_id: asset_id.clone(),
                });
            }
        }
        Ok(())
    }

    // ========================================================================
    // Read models
    // ========================================================================

    /// Full integrity report over committed state
    pub async fn check_integrity(&self) -> IntegrityReport {
        let state = self.state.read().await;
        integrity::check_integrity(&state.store)
    }

    /// Plan and hand off a release run over committed state
    pub async fn execute_release(
        &self,
        dispatcher: &dyn ReleaseDispatcher,
    ) -> Result<ExecutionPlan> {
        let state = self.state.read().await;
        execute::execute_release(&state.store, dispatcher).await
    }

    // ========================================================================
    // Commit internals
    // ========================================================================

    fn check_refs(
        &self,
        state: &SessionState,
        asset_id: &str,
        heir_id: Option<&str>,
    ) -> Result<()> {
        if state.store.asset(asset_id).is_none() {
            return Err(LedgerError::AssetNotFound(asset_id.to_string()));
        }
        if let Some(heir_id) = heir_id {
            if state.store.heir(heir_id).is_none() {
                return Err(LedgerError::HeirNotFound(heir_id.to_string()));
            }
        }
        Ok(())
    }

    /// Apply the commit gate to a validated working set: commit at an
    /// endpoint, stage otherwise
    async fn settle(
        &self,
        state: &mut SessionState,
        asset_id: &str,
        working: Vec<Share>,
    ) -> Result<CommitOutcome> {
        let total = share_total(&working);
        if commit_eligible(total) {
            let total = self.commit_shares(state, asset_id, working).await?;
            return Ok(CommitOutcome::Committed { total });
        }
        debug!(asset_id, total, "edit staged; asset is partial - not saved");
        state.staged.insert(asset_id.to_string(), working);
        Ok(CommitOutcome::Staged { total })
    }

    /// Push one asset's share set to the backend as an atomic replace
    async fn commit_shares(
        &self,
        state: &mut SessionState,
        asset_id: &str,
        shares: Vec<Share>,
    ) -> Result<u32> {
        let total = share_total(&shares);
        debug_assert!(commit_eligible(total), "commit gate bypassed");

        let backend = Arc::clone(&self.backend);
        let push = self
            .retry
            .run("set_asset_distributions", || {
                let backend = Arc::clone(&backend);
                let asset_id = asset_id.to_string();
                let shares = shares.clone();
                async move { backend.set_asset_distributions(&asset_id, shares).await }
            })
            .await;

        match push {
            Ok(()) => {
                self.finish_commit(state, asset_id, shares, total);
                Ok(total)
            }
            Err(err) => Err(self.fail_closed(state, asset_id, err).await),
        }
    }

    /// Remove a single row via the backend's fine-grained delete
    async fn commit_delete(
        &self,
        state: &mut SessionState,
        asset_id: &str,
        heir_id: &str,
    ) -> Result<CommitOutcome> {
        let backend = Arc::clone(&self.backend);
        let push = self
            .retry
            .run("delete_distribution", || {
                let backend = Arc::clone(&backend);
                let asset_id = asset_id.to_string();
                let heir_id = heir_id.to_string();
                async move { backend.delete_distribution(&asset_id, &heir_id).await }
            })
            .await;

        match push {
            Ok(()) => {
                self.finish_commit(state, asset_id, Vec::new(), 0);
                Ok(CommitOutcome::Committed { total: 0 })
            }
            Err(err) => Err(self.fail_closed(state, asset_id, err).await),
        }
    }

    fn finish_commit(
        &self,
        state: &mut SessionState,
        asset_id: &str,
        shares: Vec<Share>,
        total: u32,
    ) {
        // Validated before staging; adopt directly
        state.store.adopt_shares(asset_id, shares);
        state.staged.remove(asset_id);
        info!(asset_id, total, "distributions committed");
        self.signals.emit(LedgerSignal::DistributionsCommitted {
            asset_id: asset_id.to_string(),
            total,
        });
        self.signals.emit(LedgerSignal::IntegrityChanged {
            asset_id: asset_id.to_string(),
        });
    }

    /// Commit failed: drop the local edit and mirror whatever the backend
    /// actually holds before surfacing the error
    async fn fail_closed(
        &self,
        state: &mut SessionState,
        asset_id: &str,
        err: LedgerError,
    ) -> LedgerError {
        warn!(asset_id, error = %err, "commit failed; discarding local edit and re-syncing");
        state.staged.remove(asset_id);
        match self.backend.get_asset_distributions(asset_id).await {
            Ok(authoritative) => state.store.adopt_shares(asset_id, authoritative),
            Err(fetch_err) => {
                warn!(asset_id, error = %fetch_err, "re-sync after failed commit also failed");
            }
        }
        err
    }
}

/// The share set an edit applies to: staged when a local edit exists, else
/// the committed mirror
fn working_set(state: &SessionState, asset_id: &str) -> Vec<Share> {
    state
        .staged
        .get(asset_id)
        .cloned()
        .unwrap_or_else(|| state.store.get_shares(asset_id).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::types::CustodyMode;

    async fn session() -> (Arc<MemoryBackend>, LedgerSession) {
        let backend = Arc::new(MemoryBackend::new());
        let session =
            LedgerSession::connect(Arc::clone(&backend) as Arc<dyn DistributionBackend>, RetryPolicy::immediate(3))
                .unwrap();
        session
            .add_asset(Asset::new("A1", "House", 500_000, "property", CustodyMode::Direct))
            .await
            .unwrap();
        session.add_heir(Heir::new("H1", "Miriam", "daughter")).await.unwrap();
        session.add_heir(Heir::new("H2", "Ruth", "spouse")).await.unwrap();
        (backend, session)
    }

    #[test]
    fn gate_accepts_only_the_endpoints() {
        assert!(commit_eligible(0));
        assert!(commit_eligible(100));
        assert!(!commit_eligible(1));
        assert!(!commit_eligible(60));
        assert!(!commit_eligible(99));
    }

    #[tokio::test]
    async fn partial_edit_stays_local() {
        let (backend, session) = session().await;
        let outcome = session.add_share("A1", "H1", 60).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Staged { total: 60 });
        assert!(backend.get_asset_distributions("A1").await.unwrap().is_empty());
        assert_eq!(session.partial_assets().await, vec!["A1".to_string()]);
    }

    #[tokio::test]
    async fn completing_the_allocation_commits() {
        let (backend, session) = session().await;
        session.add_share("A1", "H1", 60).await.unwrap();
        let outcome = session.add_share("A1", "H2", 40).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed { total: 100 });
        assert_eq!(backend.get_asset_distributions("A1").await.unwrap().len(), 2);
        assert!(session.partial_assets().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_references_are_rejected() {
        let (_, session) = session().await;
        assert!(matches!(
            session.add_share("ghost", "H1", 50).await,
            Err(LedgerError::AssetNotFound(_))
        ));
        assert!(matches!(
            session.add_share("A1", "ghost", 50).await,
            Err(LedgerError::HeirNotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_requires_an_existing_share() {
        let (_, session) = session().await;
        assert!(matches!(
            session.update_share("A1", "H1", 50).await,
            Err(LedgerError::ShareNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn discard_staged_reverts_to_committed() {
        let (_, session) = session().await;
        session.add_share("A1", "H1", 60).await.unwrap();
        session.discard_staged("A1").await;
        assert!(session.partial_assets().await.is_empty());
        assert!(session.staged_shares("A1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn connect_refuses_backend_without_atomic_replace() {
        struct Broken;

        #[async_trait::async_trait]
        impl DistributionBackend for Broken {
            fn capabilities(&self) -> BackendCapabilities {
                BackendCapabilities {
                    atomic_replace: false,
                    fine_grained_delete: false,
                }
            }
            async fn get_asset_distributions(&self, _: &str) -> Result<Vec<Share>> {
                Ok(Vec::new())
            }
            async fn set_asset_distributions(&self, _: &str, _: Vec<Share>) -> Result<()> {
                Ok(())
            }
        }

        let err = LedgerSession::connect(Arc::new(Broken), RetryPolicy::immediate(1)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Unsupported { capability: "set_asset_distributions" }
        ));
    }

    #[tokio::test]
    async fn heir_verification_round_trips() {
        let (_, session) = session().await;
        session.set_heir_verification("H1", "family-motto", "owner-1").await.unwrap();
        assert!(session.verify_heir("H1", "family-motto", "owner-1").await.unwrap());
        assert!(!session.verify_heir("H1", "wrong", "owner-1").await.unwrap());
        // No hash on record
        assert!(!session.verify_heir("H2", "anything", "owner-1").await.unwrap());
    }
}
