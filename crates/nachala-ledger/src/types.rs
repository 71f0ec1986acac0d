//! Payload types shared with the web frontends
//!
//! All payloads are simple structured records of integers and strings; no
//! binary formats. With the `typescript` feature enabled the frontend-facing
//! types are exported via ts-rs. Run:
//!   cargo test --features typescript export_bindings
//! Generated files go to: sdk/ledger-client-ts/src/generated/

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

// ============================================================================
// Timestamp / Id Helpers
// ============================================================================

/// Get current UTC timestamp as ISO 8601 string
pub fn current_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Generate an opaque unique id
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// Custody & Transfer Policy
// ============================================================================

/// Custody mode of an asset. Decides the release mechanism at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(
    feature = "typescript",
    ts(export, export_to = "../../sdk/ledger-client-ts/src/generated/")
)]
#[serde(rename_all = "kebab-case")]
pub enum CustodyMode {
    /// Heir receives the asset directly
    Direct,
    /// Asset is held by a custodian who releases on execution
    Custody,
    /// Release is staged and requires explicit approval
    ApprovalRequired,
}

impl Default for CustodyMode {
    fn default() -> Self {
        CustodyMode::Direct
    }
}

/// How a release operation moves value to a heir.
///
/// This is a policy lookup on the asset's custody mode, never a choice made
/// at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(
    feature = "typescript",
    ts(export, export_to = "../../sdk/ledger-client-ts/src/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum TransferMethod {
    /// Immediate transfer to the heir
    DirectTransfer,
    /// Release from custodial holding
    CustodyRelease,
    /// Staged transfer requiring approval
    StagedApproval,
}

impl TransferMethod {
    /// Select the transfer method for an asset's custody mode
    pub fn for_custody(mode: CustodyMode) -> Self {
        match mode {
            CustodyMode::ApprovalRequired => TransferMethod::StagedApproval,
            CustodyMode::Custody => TransferMethod::CustodyRelease,
            CustodyMode::Direct => TransferMethod::DirectTransfer,
        }
    }
}

// ============================================================================
// Portfolio Entities
// ============================================================================

/// A unit of value owned by one user, eligible for distribution to heirs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(
    feature = "typescript",
    ts(export, export_to = "../../sdk/ledger-client-ts/src/generated/")
)]
pub struct Asset {
    pub id: String,
    pub name: String,
    /// Monetary value in smallest currency units
    pub value: u64,
    /// Free-form asset-type tag ("property", "crypto", ...)
    pub asset_type: String,
    pub custody: CustodyMode,
    pub created_at: String,
    pub updated_at: String,
}

impl Asset {
    /// Build an asset with a caller-supplied id
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        value: u64,
        asset_type: impl Into<String>,
        custody: CustodyMode,
    ) -> Self {
        let now = current_timestamp();
        Self {
            id: id.into(),
            name: name.into(),
            value,
            asset_type: asset_type.into(),
            custody,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Build an asset with a generated id
    pub fn create(
        name: impl Into<String>,
        value: u64,
        asset_type: impl Into<String>,
        custody: CustodyMode,
    ) -> Self {
        Self::new(generate_id(), name, value, asset_type, custody)
    }
}

/// Fields of an asset that can change after creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(
    feature = "typescript",
    ts(export, export_to = "../../sdk/ledger-client-ts/src/generated/")
)]
pub struct UpdateAssetInput {
    pub name: Option<String>,
    pub value: Option<u64>,
    pub asset_type: Option<String>,
    pub custody: Option<CustodyMode>,
}

/// A designated beneficiary. Exists independently of assets; may hold zero
/// shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(
    feature = "typescript",
    ts(export, export_to = "../../sdk/ledger-client-ts/src/generated/")
)]
pub struct Heir {
    pub id: String,
    pub name: String,
    /// Relationship to the owner ("spouse", "daughter", ...)
    pub relationship: String,
    pub contact: Option<String>,
    /// Salted iterated SHA-256 of the heir's claim secret; the raw secret is
    /// never stored. See [`crate::identity`].
    pub verification_hash: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Heir {
    /// Build a heir with a caller-supplied id
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        relationship: impl Into<String>,
    ) -> Self {
        let now = current_timestamp();
        Self {
            id: id.into(),
            name: name.into(),
            relationship: relationship.into(),
            contact: None,
            verification_hash: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Build a heir with a generated id
    pub fn create(name: impl Into<String>, relationship: impl Into<String>) -> Self {
        Self::new(generate_id(), name, relationship)
    }
}

/// One heir's percentage share of one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(
    feature = "typescript",
    ts(export, export_to = "../../sdk/ledger-client-ts/src/generated/")
)]
pub struct Share {
    pub asset_id: String,
    pub heir_id: String,
    /// Integer percentage in 1..=100, enforced by the allocation validator
    pub percentage: u8,
}

impl Share {
    pub fn new(asset_id: impl Into<String>, heir_id: impl Into<String>, percentage: u8) -> Self {
        Self {
            asset_id: asset_id.into(),
            heir_id: heir_id.into(),
            percentage,
        }
    }
}

/// One row of a bulk-replace payload; the asset id comes from the call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(
    feature = "typescript",
    ts(export, export_to = "../../sdk/ledger-client-ts/src/generated/")
)]
pub struct ShareInput {
    pub heir_id: String,
    pub percentage: u8,
}

impl ShareInput {
    pub fn new(heir_id: impl Into<String>, percentage: u8) -> Self {
        Self {
            heir_id: heir_id.into(),
            percentage,
        }
    }
}

// ============================================================================
// Integrity Report
// ============================================================================

/// On-demand classification of every asset by allocation completeness.
///
/// The four classification sets are mutually exclusive and exhaustive over
/// the portfolio's assets. Any `over_allocated` or `issues` entry means the
/// ledger is unhealthy; violations are reported as data, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(
    feature = "typescript",
    ts(export, export_to = "../../sdk/ledger-client-ts/src/generated/")
)]
pub struct IntegrityReport {
    pub asset_count: u32,
    /// Total committed share rows across all assets
    pub distribution_count: u32,
    /// sum > 100: structurally impossible when the gate is honored
    pub over_allocated: BTreeSet<String>,
    /// sum == 100
    pub fully_allocated: BTreeSet<String>,
    /// 0 < sum < 100
    pub partially_allocated: BTreeSet<String>,
    /// sum == 0
    pub unallocated: BTreeSet<String>,
    /// Free-text diagnostics for structural anomalies the gate should have
    /// prevented
    pub issues: Vec<String>,
}

impl IntegrityReport {
    /// A report is healthy when nothing is over-allocated and no structural
    /// issue was found
    pub fn is_healthy(&self) -> bool {
        self.over_allocated.is_empty() && self.issues.is_empty()
    }
}

// ============================================================================
// Release Operations
// ============================================================================

/// One heir's entitlement to one asset, produced at execution time and handed
/// to the external delivery mechanism. Not ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(
    feature = "typescript",
    ts(export, export_to = "../../sdk/ledger-client-ts/src/generated/")
)]
pub struct ReleaseOperation {
    pub asset_id: String,
    pub heir_id: String,
    pub percentage: u8,
    pub method: TransferMethod,
    /// Heir's entitlement in smallest currency units (floor of value * pct%)
    pub amount: u64,
}

/// Result of planning a release run: the operations to hand off plus one
/// diagnostic per asset that was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(
    feature = "typescript",
    ts(export, export_to = "../../sdk/ledger-client-ts/src/generated/")
)]
pub struct ExecutionPlan {
    pub operations: Vec<ReleaseOperation>,
    pub diagnostics: Vec<String>,
}
