//! Session lifecycle states.

use std::fmt::{Display, Formatter};

/// Lifecycle of the active project's goal map.
///
/// `Unloaded -> Loading -> Reconciled -> Dirty -> Saving -> Reconciled`,
/// with `Saving -> Dirty` on failure or when edits landed mid-save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unloaded,
    Loading,
    /// Session map matches what the remote store last confirmed.
    Reconciled,
    /// Local edits not yet confirmed by the remote store.
    Dirty,
    /// A save is in flight.
    Saving,
}

impl SyncState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Reconciled => "reconciled",
            Self::Dirty => "dirty",
            Self::Saving => "saving",
        }
    }

    /// Whether the session holds a usable map that accepts edits.
    pub fn is_loaded(self) -> bool {
        matches!(self, Self::Reconciled | Self::Dirty | Self::Saving)
    }

    /// Whether the session holds edits the remote store has not confirmed.
    pub fn has_unconfirmed_edits(self) -> bool {
        matches!(self, Self::Dirty | Self::Saving)
    }
}

impl Display for SyncState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether local edits currently survive a process restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Every edit is mirrored to the local cache.
    Durable,
    /// The last cache write failed; edits live only in memory.
    InMemoryOnly,
}

impl Durability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Durable => "durable",
            Self::InMemoryOnly => "in_memory_only",
        }
    }
}
