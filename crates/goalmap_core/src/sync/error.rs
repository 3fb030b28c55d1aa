//! Reconciler error taxonomy.

use crate::model::goal_map::GraphError;
use crate::model::validation::GraphViolation;
use crate::remote::RemoteError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SyncResult<T> = Result<T, SyncError>;

/// Error returned by `SyncReconciler` operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Edit rejected by graph rules; the map is unchanged.
    Graph(GraphError),
    /// Remote call failed; local edits are intact.
    Remote(RemoteError),
    /// No project is loaded, or its load has not completed yet.
    NotLoaded,
    /// A save for this session is already in flight.
    SaveInFlight,
    /// The map breaks invariants and cannot be persisted.
    InvalidGraph(Vec<GraphViolation>),
    InvalidProjectId(String),
    /// The session moved on (project switch or newer request) before the
    /// result could be applied.
    Superseded,
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Graph(err) => write!(f, "{err}"),
            Self::Remote(err) => write!(f, "{err}"),
            Self::NotLoaded => write!(f, "no goal map is loaded"),
            Self::SaveInFlight => write!(f, "a save is already in progress"),
            Self::InvalidGraph(violations) => {
                write!(f, "goal map is invalid:")?;
                for violation in violations {
                    write!(f, " {violation};")?;
                }
                Ok(())
            }
            Self::InvalidProjectId(value) => write!(f, "invalid project id: `{value}`"),
            Self::Superseded => write!(f, "result superseded by a newer session request"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Graph(err) => Some(err),
            Self::Remote(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GraphError> for SyncError {
    fn from(value: GraphError) -> Self {
        Self::Graph(value)
    }
}

impl From<RemoteError> for SyncError {
    fn from(value: RemoteError) -> Self {
        Self::Remote(value)
    }
}
