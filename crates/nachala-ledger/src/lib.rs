//! Nachala Ledger - distribution ledger core for digital inheritance
//!
//! The engine behind the Nachala frontends: for each asset, a set of
//! (heir, percentage) shares whose total may never exceed 100, with exactly
//! 100 meaning "fully allocated". Edits are staged locally and pushed to the
//! persistence backend only at the two unambiguous endpoints - a total of
//! exactly 0 (fully cleared) or exactly 100 (fully allocated) - as one
//! atomic replace per asset.
//!
//! # Architecture
//!
//! ```text
//! UI edits -> allocation validator -> commit gate (0 or 100) -> backend
//!                                          |                      |
//!                                     staged edits        committed mirror
//!                                   ("not saved" view)    (PortfolioStore)
//!                                                              |
//!                                         integrity reporter / release planner
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nachala_ledger::{
//!     Asset, CustodyMode, Heir, LedgerSession, MemoryBackend, RetryPolicy,
//! };
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let session = LedgerSession::connect(backend, RetryPolicy::default())?;
//!
//! session.add_asset(Asset::create("House", 500_000, "property", CustodyMode::Direct)).await?;
//! session.add_heir(Heir::create("Miriam", "daughter")).await?;
//!
//! // Stays local: 60% is not a committable state
//! session.add_share("house-id", "miriam-id", 60).await?;
//!
//! // Hitting 100% commits both shares atomically
//! session.add_share("house-id", "ruth-id", 40).await?;
//!
//! let report = session.check_integrity().await;
//! assert!(report.is_healthy());
//! ```

// Payload types shared with the web frontends
pub mod types;

// Error taxonomy
pub mod error;

// Allocation validator - the gate every share mutation passes through
pub mod validate;

// Committed portfolio state
pub mod store;

// Backend actor interface and the in-memory stand-in
pub mod backend;

// Bounded retry for backend calls
pub mod retry;

// Staged edits and the atomic commit protocol
pub mod session;

// On-demand portfolio classification
pub mod integrity;

// Release planning and dispatcher handoff
pub mod execute;

// In-process pub/sub for dependent views
pub mod signals;

// Heir identity verification hashes
pub mod identity;

// Re-export core types
pub use types::{
    Asset, CustodyMode, ExecutionPlan, Heir, IntegrityReport, ReleaseOperation, Share, ShareInput,
    TransferMethod, UpdateAssetInput,
};

// Re-export error types
pub use error::{AllocationFault, LedgerError, Result};

// Re-export the engine surface
pub use backend::{BackendCapabilities, DistributionBackend, MemoryBackend};
pub use execute::{CollectingDispatcher, ReleaseDispatcher};
pub use retry::RetryPolicy;
pub use session::{commit_eligible, CommitOutcome, LedgerSession};
pub use signals::{LedgerSignal, SignalHub};
pub use store::PortfolioStore;
