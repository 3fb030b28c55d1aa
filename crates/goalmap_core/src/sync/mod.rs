//! Goal-map synchronization across session, local cache and remote store.
//!
//! # Responsibility
//! - Own the active project's authoritative map (`SyncReconciler`).
//! - Define precedence rules for disagreeing snapshots (`merge`).
//!
//! # Invariants
//! - User-entered goals are never dropped because another tier is empty.

pub mod error;
pub mod merge;
pub mod reconciler;
pub mod state;

pub use error::{SyncError, SyncResult};
pub use merge::{reconcile, MergeResult, MergeRule, RemoteSnapshot};
pub use reconciler::{
    CompletionOutcome, CompletionTicket, LoadOutcome, LoadTicket, SaveOutcome, SaveReport,
    SaveRequest, SaveTicket, SubmitReport, SyncReconciler,
};
pub use state::{Durability, SyncState};
