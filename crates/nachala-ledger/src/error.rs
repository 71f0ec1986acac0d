//! Error types for the distribution ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Why the allocation validator rejected a proposed share set.
///
/// These are always raised before any backend call and are recoverable
/// locally by correcting the edit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationFault {
    /// Percentages are integers in 1..=100; zero is "no share", not a share
    #[error("percentage {percentage} for heir {heir_id} is outside 1..=100")]
    PercentageOutOfRange { heir_id: String, percentage: u8 },

    /// At most one share per heir per asset
    #[error("heir {heir_id} already holds a share of this asset")]
    DuplicateHeir { heir_id: String },

    /// Share percentages for one asset may never total more than 100
    #[error("share percentages total {total}, exceeding 100")]
    TotalExceeds100 { total: u32 },
}

/// Ledger error types
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Rejected by the allocation validator, before any backend call
    #[error("invalid allocation: {0}")]
    InvalidAllocation(#[from] AllocationFault),

    /// Backend or transport failure during a commit. The local edit has been
    /// discarded and committed state re-synced from the backend.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// The connected backend lacks a capability this operation requires
    #[error("backend does not support {capability}")]
    Unsupported { capability: &'static str },

    /// Asset id is not in the portfolio
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// Heir id is not in the portfolio
    #[error("heir not found: {0}")]
    HeirNotFound(String),

    /// No share exists for this (asset, heir) pair
    #[error("no share for heir {heir_id} on asset {asset_id}")]
    ShareNotFound { asset_id: String, heir_id: String },

    /// An asset or heir with this id already exists
    #[error("id already exists: {0}")]
    DuplicateId(String),

    /// Heir still holds shares and cannot be removed; reassign first
    #[error("heir {heir_id} still holds {share_count} share(s)")]
    HeirInUse { heir_id: String, share_count: usize },
}
