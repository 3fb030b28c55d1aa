//! Identifier and versioning helpers for goal-map records.
//!
//! # Responsibility
//! - Generate stable local node ids.
//! - Provide the wall-clock source used for `last_updated` stamps.
//!
//! # Invariants
//! - Locally generated ids never collide with each other within a process.
//! - Revisions only move forward; `next_revision` saturates instead of wrapping.

use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Opaque goal node identifier.
///
/// Remote-issued ids are arbitrary strings, so this stays a plain `String`
/// alias instead of a parsed UUID.
pub type NodeId = String;

/// Session-local monotonically increasing revision counter.
pub type Revision = u64;

/// Generates a new node id for a locally created goal.
pub fn new_node_id() -> NodeId {
    format!("goal-{}", Uuid::new_v4())
}

/// Returns the revision that follows `current`.
pub fn next_revision(current: Revision) -> Revision {
    current.saturating_add(1)
}

/// Wall-clock source for `last_updated` stamps.
///
/// Injected into the reconciler so tests can pin timestamps.
pub trait Clock {
    /// Unix epoch milliseconds.
    fn now_epoch_ms(&self) -> i64;
}

/// Clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// Clock returning one fixed instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_epoch_ms(&self) -> i64 {
        self.0
    }
}
