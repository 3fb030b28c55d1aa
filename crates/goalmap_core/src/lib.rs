//! Core domain logic for the goal-mapping toolkit.
//! This crate is the single source of truth for goal graph invariants and
//! for how session, local cache and remote copies converge.

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod progress;
pub mod remote;
pub mod sync;

pub use bootstrap::{reconciler_from_config, BootstrapError, DynReconciler};
pub use cache::{
    CacheError, CacheKey, CacheResult, InMemoryLocalCache, LocalCache, SqliteLocalCache, ToolKind,
};
pub use config::{ConfigError, CoreConfig, RemoteConfig};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::goal_map::{
    CapacityError, GoalConnection, GoalMap, GoalNode, GraphError, GraphResult, NodePatch,
    ValidationError, MAX_LEVEL, MAX_NODES, MAX_NODES_PER_LEVEL, MIN_LEVEL,
};
pub use model::ids::{Clock, FixedClock, NodeId, Revision, SystemClock};
pub use model::validation::GraphViolation;
pub use progress::{
    BearingsStatus, CompletionSignals, DeliveryStage, ProgressAggregator, SituationalAssessment,
};
pub use remote::{HttpRemoteStore, InMemoryRemoteStore, RemoteError, RemoteOp, RemoteStore};
pub use sync::{
    CompletionOutcome, CompletionTicket, Durability, LoadOutcome, MergeRule, SaveOutcome,
    SaveReport, SubmitReport, SyncError, SyncReconciler, SyncResult, SyncState,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
