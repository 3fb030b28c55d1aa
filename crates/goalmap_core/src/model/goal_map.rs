//! Goal map aggregate and its pure graph operations.
//!
//! # Responsibility
//! - Define the canonical goal graph record shared by cache, remote and session.
//! - Enforce capacity and referential rules on every mutation.
//!
//! # Invariants
//! - At most `MAX_NODES` nodes, at most `MAX_NODES_PER_LEVEL` per level.
//! - Every connection references two distinct, existing nodes.
//! - Connections form an unordered-pair set (no reversed duplicates).
//! - A rejected operation leaves the map unchanged.
//! - Every applied mutation bumps `revision`.

use crate::model::ids::{new_node_id, next_revision, NodeId, Revision};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum number of goals in one map.
pub const MAX_NODES: usize = 10;
/// Maximum number of goals sharing one level.
pub const MAX_NODES_PER_LEVEL: usize = 3;
/// Lowest valid goal level.
pub const MIN_LEVEL: u8 = 1;
/// Highest valid goal level.
pub const MAX_LEVEL: u8 = 5;

pub type GraphResult<T> = Result<T, GraphError>;

/// One goal in the success map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalNode {
    pub id: NodeId,
    pub text: String,
    #[serde(default)]
    pub timeframe: String,
    pub level: u8,
    /// Revision at which this node was last touched in the local session.
    #[serde(default)]
    pub last_modified_at: Revision,
}

/// Relationship between two goals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalConnection {
    pub source_id: NodeId,
    pub target_id: NodeId,
}

impl GoalConnection {
    pub fn new(source_id: impl Into<NodeId>, target_id: impl Into<NodeId>) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
        }
    }

    /// Returns whether either endpoint is `node_id`.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source_id == node_id || self.target_id == node_id
    }

    /// Unordered-pair equality.
    pub fn same_pair(&self, a: &str, b: &str) -> bool {
        (self.source_id == a && self.target_id == b) || (self.source_id == b && self.target_id == a)
    }
}

/// Partial update for one goal. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodePatch {
    pub text: Option<String>,
    pub timeframe: Option<String>,
    pub level: Option<u8>,
}

/// Goal map aggregate root for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalMap {
    /// Remote identity. Absent until the first successful create.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub project_id: String,
    /// Display order is insertion order.
    #[serde(default)]
    pub nodes: Vec<GoalNode>,
    #[serde(default)]
    pub connections: Vec<GoalConnection>,
    /// Unix epoch milliseconds.
    #[serde(default)]
    pub last_updated: i64,
    #[serde(default)]
    pub revision: Revision,
    /// Goal mapping has been marked complete for this project.
    #[serde(default)]
    pub completed: bool,
}

/// Capacity rule violations raised by `add_node`/`update_node`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapacityError {
    /// The map already holds `MAX_NODES` goals.
    TotalLimit { limit: usize },
    /// The target level already holds `MAX_NODES_PER_LEVEL` goals.
    LevelLimit { level: u8, limit: usize },
}

impl Display for CapacityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TotalLimit { limit } => write!(f, "goal map is full ({limit} goals maximum)"),
            Self::LevelLimit { level, limit } => {
                write!(f, "level {level} is full ({limit} goals maximum per level)")
            }
        }
    }
}

impl Error for CapacityError {}

/// Structural rule violations raised by graph operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyText,
    InvalidLevel(u8),
    MissingEndpoint(NodeId),
    SelfLoop(NodeId),
    DuplicateConnection { source_id: NodeId, target_id: NodeId },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "goal text must not be blank"),
            Self::InvalidLevel(level) => write!(
                f,
                "goal level {level} is outside {MIN_LEVEL}..={MAX_LEVEL}"
            ),
            Self::MissingEndpoint(id) => write!(f, "connection endpoint not found: {id}"),
            Self::SelfLoop(id) => write!(f, "goal cannot connect to itself: {id}"),
            Self::DuplicateConnection {
                source_id,
                target_id,
            } => write!(f, "connection already exists: {source_id} <-> {target_id}"),
        }
    }
}

impl Error for ValidationError {}

/// Error for rejected graph operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    Capacity(CapacityError),
    Validation(ValidationError),
}

impl Display for GraphError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Capacity(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GraphError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Capacity(err) => Some(err),
            Self::Validation(err) => Some(err),
        }
    }
}

impl From<CapacityError> for GraphError {
    fn from(value: CapacityError) -> Self {
        Self::Capacity(value)
    }
}

impl From<ValidationError> for GraphError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl GoalMap {
    /// Creates an empty, never-persisted map for `project_id`.
    pub fn new(project_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            project_id: project_id.into(),
            nodes: Vec::new(),
            connections: Vec::new(),
            last_updated: 0,
            revision: 0,
            completed: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: &str) -> Option<&GoalNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Number of goals currently placed at `level`.
    pub fn level_count(&self, level: u8) -> usize {
        self.nodes.iter().filter(|node| node.level == level).count()
    }

    /// Adds one goal and returns its generated id.
    ///
    /// # Errors
    /// - `ValidationError::EmptyText` / `InvalidLevel` for malformed input.
    /// - `CapacityError::TotalLimit` when the map already holds 10 goals.
    /// - `CapacityError::LevelLimit` when `level` already holds 3 goals.
    pub fn add_node(
        &mut self,
        text: impl Into<String>,
        timeframe: impl Into<String>,
        level: u8,
    ) -> GraphResult<NodeId> {
        let text = normalize_text(text.into())?;
        ensure_level(level)?;
        if self.nodes.len() >= MAX_NODES {
            return Err(CapacityError::TotalLimit { limit: MAX_NODES }.into());
        }
        if self.level_count(level) >= MAX_NODES_PER_LEVEL {
            return Err(CapacityError::LevelLimit {
                level,
                limit: MAX_NODES_PER_LEVEL,
            }
            .into());
        }

        let timeframe: String = timeframe.into();
        let revision = self.bump_revision();
        let id = new_node_id();
        self.nodes.push(GoalNode {
            id: id.clone(),
            text,
            timeframe: timeframe.trim().to_string(),
            level,
            last_modified_at: revision,
        });
        Ok(id)
    }

    /// Applies `patch` to the goal `id`.
    ///
    /// Returns `Ok(false)` when the goal does not exist or nothing changed;
    /// a stale UI reference is not an error.
    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> GraphResult<bool> {
        let Some(index) = self.nodes.iter().position(|node| node.id == id) else {
            return Ok(false);
        };

        let text = patch.text.map(normalize_text).transpose()?;
        let timeframe = patch.timeframe.map(|value| value.trim().to_string());
        if let Some(level) = patch.level {
            ensure_level(level)?;
            let current_level = self.nodes[index].level;
            if level != current_level && self.level_count(level) >= MAX_NODES_PER_LEVEL {
                return Err(CapacityError::LevelLimit {
                    level,
                    limit: MAX_NODES_PER_LEVEL,
                }
                .into());
            }
        }

        let current = &self.nodes[index];
        let changed = text.as_ref().is_some_and(|value| *value != current.text)
            || timeframe
                .as_ref()
                .is_some_and(|value| *value != current.timeframe)
            || patch.level.is_some_and(|value| value != current.level);
        if !changed {
            return Ok(false);
        }

        let revision = self.bump_revision();
        let node = &mut self.nodes[index];
        if let Some(text) = text {
            node.text = text;
        }
        if let Some(timeframe) = timeframe {
            node.timeframe = timeframe;
        }
        if let Some(level) = patch.level {
            node.level = level;
        }
        node.last_modified_at = revision;
        Ok(true)
    }

    /// Removes goal `id` and every connection touching it.
    pub fn remove_node(&mut self, id: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|node| node.id != id);
        if self.nodes.len() == before {
            return false;
        }
        self.connections.retain(|connection| !connection.touches(id));
        self.bump_revision();
        true
    }

    /// Connects two existing, distinct goals.
    pub fn add_connection(&mut self, source_id: &str, target_id: &str) -> GraphResult<()> {
        if source_id == target_id {
            return Err(ValidationError::SelfLoop(source_id.to_string()).into());
        }
        for endpoint in [source_id, target_id] {
            if !self.contains_node(endpoint) {
                return Err(ValidationError::MissingEndpoint(endpoint.to_string()).into());
            }
        }
        if self
            .connections
            .iter()
            .any(|connection| connection.same_pair(source_id, target_id))
        {
            return Err(ValidationError::DuplicateConnection {
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
            }
            .into());
        }

        self.connections
            .push(GoalConnection::new(source_id, target_id));
        self.bump_revision();
        Ok(())
    }

    /// Removes the connection between two goals, in either direction.
    pub fn remove_connection(&mut self, source_id: &str, target_id: &str) -> bool {
        let before = self.connections.len();
        self.connections
            .retain(|connection| !connection.same_pair(source_id, target_id));
        if self.connections.len() == before {
            return false;
        }
        self.bump_revision();
        true
    }

    /// Clears all goals and connections, keeping identity.
    ///
    /// This is the only path that legitimately empties a non-empty map.
    pub fn reset(&mut self) -> bool {
        if self.nodes.is_empty() && self.connections.is_empty() {
            return false;
        }
        self.nodes.clear();
        self.connections.clear();
        self.bump_revision();
        true
    }

    /// Drops connections that are dangling, self-referencing or duplicated.
    ///
    /// Returns the number of dropped connections. Used when adopting
    /// snapshots produced outside this process.
    pub fn prune_connections(&mut self) -> usize {
        let before = self.connections.len();
        let mut kept: Vec<GoalConnection> = Vec::with_capacity(before);
        for connection in std::mem::take(&mut self.connections) {
            let valid = connection.source_id != connection.target_id
                && self.contains_node(&connection.source_id)
                && self.contains_node(&connection.target_id)
                && !kept
                    .iter()
                    .any(|seen| seen.same_pair(&connection.source_id, &connection.target_id));
            if valid {
                kept.push(connection);
            }
        }
        self.connections = kept;
        before - self.connections.len()
    }

    fn bump_revision(&mut self) -> Revision {
        self.revision = next_revision(self.revision);
        self.revision
    }
}

fn normalize_text(value: String) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(trimmed.to_string())
}

fn ensure_level(level: u8) -> Result<(), ValidationError> {
    if (MIN_LEVEL..=MAX_LEVEL).contains(&level) {
        Ok(())
    } else {
        Err(ValidationError::InvalidLevel(level))
    }
}
