//! Committed portfolio state
//!
//! In-memory mirror of what the backend has accepted: the asset and heir
//! registries plus each asset's committed share set. Share mutations pass
//! through the allocation validator; persistence is the caller's concern
//! (the session owns the commit protocol).
//!
//! Shares are kept in insertion order per asset. Order carries no invariant
//! but must be stable for display.

use std::collections::HashMap;

use crate::error::{LedgerError, Result};
use crate::types::{current_timestamp, Asset, Heir, Share, UpdateAssetInput};
use crate::validate;

/// One user's committed portfolio
#[derive(Debug, Default)]
pub struct PortfolioStore {
    assets: HashMap<String, Asset>,
    asset_order: Vec<String>,
    heirs: HashMap<String, Heir>,
    heir_order: Vec<String>,
    shares: HashMap<String, Vec<Share>>,
}

impl PortfolioStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Assets
    // ========================================================================

    pub fn add_asset(&mut self, asset: Asset) -> Result<()> {
        if self.assets.contains_key(&asset.id) {
            return Err(LedgerError::DuplicateId(asset.id));
        }
        self.asset_order.push(asset.id.clone());
        self.assets.insert(asset.id.clone(), asset);
        Ok(())
    }

    pub fn update_asset(&mut self, asset_id: &str, input: &UpdateAssetInput) -> Result<Asset> {
        let asset = self
            .assets
            .get_mut(asset_id)
            .ok_or_else(|| LedgerError::AssetNotFound(asset_id.to_string()))?;
        if let Some(name) = &input.name {
            asset.name = name.clone();
        }
        if let Some(value) = input.value {
            asset.value = value;
        }
        if let Some(asset_type) = &input.asset_type {
            asset.asset_type = asset_type.clone();
        }
        if let Some(custody) = input.custody {
            asset.custody = custody;
        }
        asset.updated_at = current_timestamp();
        Ok(asset.clone())
    }

    /// Remove an asset and cascade to its shares
    pub fn remove_asset(&mut self, asset_id: &str) -> Result<Asset> {
        let asset = self
            .assets
            .remove(asset_id)
            .ok_or_else(|| LedgerError::AssetNotFound(asset_id.to_string()))?;
        self.asset_order.retain(|id| id != asset_id);
        self.remove_asset_shares(asset_id);
        Ok(asset)
    }

    pub fn asset(&self, asset_id: &str) -> Option<&Asset> {
        self.assets.get(asset_id)
    }

    /// Assets in insertion order
    pub fn assets(&self) -> Vec<&Asset> {
        self.asset_order
            .iter()
            .filter_map(|id| self.assets.get(id))
            .collect()
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    // ========================================================================
    // Heirs
    // ========================================================================

    pub fn add_heir(&mut self, heir: Heir) -> Result<()> {
        if self.heirs.contains_key(&heir.id) {
            return Err(LedgerError::DuplicateId(heir.id));
        }
        self.heir_order.push(heir.id.clone());
        self.heirs.insert(heir.id.clone(), heir);
        Ok(())
    }

    /// Remove a heir. Rejected while the heir still holds shares anywhere;
    /// cascading here would silently un-complete a fully allocated asset.
    pub fn remove_heir(&mut self, heir_id: &str) -> Result<Heir> {
        if !self.heirs.contains_key(heir_id) {
            return Err(LedgerError::HeirNotFound(heir_id.to_string()));
        }
        let share_count = self
            .shares
            .values()
            .flatten()
            .filter(|s| s.heir_id == heir_id)
            .count();
        if share_count > 0 {
            return Err(LedgerError::HeirInUse {
                heir_id: heir_id.to_string(),
                share_count,
            });
        }
        self.heir_order.retain(|id| id != heir_id);
        // Presence checked above
        Ok(self.heirs.remove(heir_id).expect("heir present"))
    }

    pub fn heir(&self, heir_id: &str) -> Option<&Heir> {
        self.heirs.get(heir_id)
    }

    /// Record a heir's verification hash (the derived digest, never the
    /// secret)
    pub fn set_heir_verification_hash(&mut self, heir_id: &str, hash: String) -> Result<Heir> {
        let heir = self
            .heirs
            .get_mut(heir_id)
            .ok_or_else(|| LedgerError::HeirNotFound(heir_id.to_string()))?;
        heir.verification_hash = Some(hash);
        heir.updated_at = current_timestamp();
        Ok(heir.clone())
    }

    /// Heirs in insertion order
    pub fn heirs(&self) -> Vec<&Heir> {
        self.heir_order
            .iter()
            .filter_map(|id| self.heirs.get(id))
            .collect()
    }

    // ========================================================================
    // Shares
    // ========================================================================

    /// Committed shares for one asset, insertion-ordered. Empty when the
    /// asset has none (or does not exist).
    pub fn get_shares(&self, asset_id: &str) -> &[Share] {
        self.shares.get(asset_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Atomically replace the whole share set for one asset. The previous
    /// set is discarded entirely, never merged. Gated by the validator.
    pub fn replace_shares(&mut self, asset_id: &str, new_shares: Vec<Share>) -> Result<()> {
        validate::validate_share_set(&new_shares)?;
        if new_shares.is_empty() {
            self.shares.remove(asset_id);
        } else {
            self.shares.insert(asset_id.to_string(), new_shares);
        }
        Ok(())
    }

    /// Adopt backend-reported shares without validation.
    ///
    /// Used on re-sync: the mirror must reflect whatever the backend holds,
    /// and the integrity reporter classifies violations rather than this
    /// path rejecting them.
    pub fn adopt_shares(&mut self, asset_id: &str, shares: Vec<Share>) {
        if shares.is_empty() {
            self.shares.remove(asset_id);
        } else {
            self.shares.insert(asset_id.to_string(), shares);
        }
    }

    /// Remove all shares for an asset (asset deletion cascade)
    pub fn remove_asset_shares(&mut self, asset_id: &str) {
        self.shares.remove(asset_id);
    }

    /// Total committed share rows across all assets
    pub fn distribution_count(&self) -> usize {
        self.shares.values().map(Vec::len).sum()
    }

    /// Asset ids that have committed shares (including any the registry no
    /// longer knows, which the integrity reporter flags)
    pub fn share_asset_ids(&self) -> Vec<&str> {
        self.shares.keys().map(String::as_str).collect()
    }
}
