//! Portfolio file format
//!
//! TOML description of one user's estate, loaded into the in-memory backend
//! for offline inspection. Entries without an id get a generated one.
//!
//! ```toml
//! [[heirs]]
//! id = "miriam"
//! name = "Miriam"
//! relationship = "daughter"
//!
//! [[assets]]
//! id = "house"
//! name = "House"
//! value = 500000
//! asset_type = "property"
//! custody = "direct"
//!
//! [[distributions]]
//! asset_id = "house"
//! heir_id = "miriam"
//! percentage = 100
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

use nachala_ledger::{
    Asset, CustodyMode, DistributionBackend, Heir, LedgerSession, MemoryBackend, RetryPolicy,
    ShareInput,
};

/// Default portfolio location under the local data directory
pub fn default_portfolio_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nachala")
        .join("portfolio.toml")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioFile {
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
    #[serde(default)]
    pub heirs: Vec<HeirEntry>,
    #[serde(default)]
    pub distributions: Vec<DistributionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    /// Smallest currency units
    pub value: u64,
    #[serde(default = "default_asset_type")]
    pub asset_type: String,
    #[serde(default)]
    pub custody: CustodyMode,
}

fn default_asset_type() -> String {
    "other".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeirEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default = "default_relationship")]
    pub relationship: String,
    #[serde(default)]
    pub contact: Option<String>,
}

fn default_relationship() -> String {
    "kin".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub asset_id: String,
    pub heir_id: String,
    pub percentage: u8,
}

impl PortfolioFile {
    /// Load a portfolio from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
    }
}

/// Build a ledger session over an in-memory backend seeded from the file.
///
/// Complete (100%) and empty distributions commit; partial ones load as
/// staged edits, exactly as they would sit in the product UI.
pub async fn open_session(
    file: &PortfolioFile,
) -> anyhow::Result<(Arc<MemoryBackend>, LedgerSession)> {
    let backend = Arc::new(MemoryBackend::new());
    let session = LedgerSession::connect(
        Arc::clone(&backend) as Arc<dyn DistributionBackend>,
        RetryPolicy::default(),
    )?;

    for entry in &file.heirs {
        let id = entry
            .id
            .clone()
            .unwrap_or_else(nachala_ledger::types::generate_id);
        let mut heir = Heir::new(id, entry.name.clone(), entry.relationship.clone());
        heir.contact = entry.contact.clone();
        session.add_heir(heir).await?;
    }

    for entry in &file.assets {
        let id = entry
            .id
            .clone()
            .unwrap_or_else(nachala_ledger::types::generate_id);
        session
            .add_asset(Asset::new(
                id,
                entry.name.clone(),
                entry.value,
                entry.asset_type.clone(),
                entry.custody,
            ))
            .await?;
    }

    let mut by_asset: BTreeMap<&str, Vec<ShareInput>> = BTreeMap::new();
    for entry in &file.distributions {
        by_asset
            .entry(entry.asset_id.as_str())
            .or_default()
            .push(ShareInput::new(entry.heir_id.clone(), entry.percentage));
    }
    for (asset_id, entries) in by_asset {
        session
            .replace_distributions(asset_id, entries)
            .await
            .with_context(|| format!("invalid distribution for asset {asset_id}"))?;
    }

    info!(
        assets = file.assets.len(),
        heirs = file.heirs.len(),
        distributions = file.distributions.len(),
        "portfolio loaded"
    );
    Ok((backend, session))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[heirs]]
        id = "miriam"
        name = "Miriam"
        relationship = "daughter"

        [[heirs]]
        id = "ruth"
        name = "Ruth"

        [[assets]]
        id = "house"
        name = "House"
        value = 500000
        asset_type = "property"
        custody = "approval-required"

        [[assets]]
        id = "wallet"
        name = "Wallet"
        value = 42

        [[distributions]]
        asset_id = "house"
        heir_id = "miriam"
        percentage = 60

        [[distributions]]
        asset_id = "house"
        heir_id = "ruth"
        percentage = 40

        [[distributions]]
        asset_id = "wallet"
        heir_id = "miriam"
        percentage = 45
    "#;

    #[test]
    fn parses_sample_portfolio() {
        let file: PortfolioFile = toml::from_str(SAMPLE).unwrap();
        assert_eq!(file.assets.len(), 2);
        assert_eq!(file.heirs.len(), 2);
        assert_eq!(file.distributions.len(), 3);
        assert_eq!(file.assets[0].custody, CustodyMode::ApprovalRequired);
        assert_eq!(file.heirs[1].relationship, "kin");
        assert_eq!(file.assets[1].asset_type, "other");
    }

    #[tokio::test]
    async fn complete_distributions_commit_and_partial_ones_stage() {
        let file: PortfolioFile = toml::from_str(SAMPLE).unwrap();
        let (backend, session) = open_session(&file).await.unwrap();

        assert_eq!(backend.get_asset_distributions("house").await.unwrap().len(), 2);
        assert!(backend.get_asset_distributions("wallet").await.unwrap().is_empty());
        assert_eq!(session.partial_assets().await, vec!["wallet".to_string()]);

        let report = session.check_integrity().await;
        assert!(report.fully_allocated.contains("house"));
        assert!(report.unallocated.contains("wallet"));
    }

    #[tokio::test]
    async fn invalid_distributions_surface_the_engine_error() {
        let mut file: PortfolioFile = toml::from_str(SAMPLE).unwrap();
        file.distributions.push(DistributionEntry {
            asset_id: "house".into(),
            heir_id: "ruth".into(),
            percentage: 10,
        });
        let err = match open_session(&file).await {
            Err(err) => err,
            Ok(_) => panic!("expected the invalid distribution to be rejected"),
        };
        assert!(err.to_string().contains("house"));
    }

    #[test]
    fn load_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let file = PortfolioFile::load(&path).unwrap();
        assert_eq!(file.assets.len(), 2);
    }
}
