//! Whole-map invariant checks run before persistence writes.

use crate::model::goal_map::{GoalMap, MAX_LEVEL, MAX_NODES, MAX_NODES_PER_LEVEL, MIN_LEVEL};
use crate::model::ids::NodeId;
use std::collections::{BTreeMap, HashSet};
use std::fmt::{Display, Formatter};

/// One violated goal-map invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphViolation {
    TooManyNodes { count: usize },
    LevelOverCapacity { level: u8, count: usize },
    InvalidLevel { node_id: NodeId, level: u8 },
    EmptyText { node_id: NodeId },
    DuplicateNodeId(NodeId),
    DanglingConnection { source_id: NodeId, target_id: NodeId },
    SelfLoop(NodeId),
    DuplicateConnection { source_id: NodeId, target_id: NodeId },
}

impl Display for GraphViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooManyNodes { count } => {
                write!(f, "{count} goals exceed the limit of {MAX_NODES}")
            }
            Self::LevelOverCapacity { level, count } => write!(
                f,
                "level {level} holds {count} goals, limit is {MAX_NODES_PER_LEVEL}"
            ),
            Self::InvalidLevel { node_id, level } => {
                write!(f, "goal {node_id} has invalid level {level}")
            }
            Self::EmptyText { node_id } => write!(f, "goal {node_id} has blank text"),
            Self::DuplicateNodeId(node_id) => write!(f, "duplicate goal id {node_id}"),
            Self::DanglingConnection {
                source_id,
                target_id,
            } => write!(f, "connection {source_id} -> {target_id} references a missing goal"),
            Self::SelfLoop(node_id) => write!(f, "goal {node_id} connects to itself"),
            Self::DuplicateConnection {
                source_id,
                target_id,
            } => write!(f, "duplicate connection {source_id} <-> {target_id}"),
        }
    }
}

impl GoalMap {
    /// Returns every violated invariant; empty means the map is persistable.
    pub fn validate(&self) -> Vec<GraphViolation> {
        let mut violations = Vec::new();

        if self.nodes.len() > MAX_NODES {
            violations.push(GraphViolation::TooManyNodes {
                count: self.nodes.len(),
            });
        }

        let mut per_level = BTreeMap::<u8, usize>::new();
        let mut seen_ids = HashSet::new();
        for node in &self.nodes {
            *per_level.entry(node.level).or_default() += 1;
            if !(MIN_LEVEL..=MAX_LEVEL).contains(&node.level) {
                violations.push(GraphViolation::InvalidLevel {
                    node_id: node.id.clone(),
                    level: node.level,
                });
            }
            if node.text.trim().is_empty() {
                violations.push(GraphViolation::EmptyText {
                    node_id: node.id.clone(),
                });
            }
            if !seen_ids.insert(node.id.as_str()) {
                violations.push(GraphViolation::DuplicateNodeId(node.id.clone()));
            }
        }
        for (level, count) in per_level {
            if count > MAX_NODES_PER_LEVEL {
                violations.push(GraphViolation::LevelOverCapacity { level, count });
            }
        }

        for (index, connection) in self.connections.iter().enumerate() {
            if connection.source_id == connection.target_id {
                violations.push(GraphViolation::SelfLoop(connection.source_id.clone()));
            }
            if !seen_ids.contains(connection.source_id.as_str())
                || !seen_ids.contains(connection.target_id.as_str())
            {
                violations.push(GraphViolation::DanglingConnection {
                    source_id: connection.source_id.clone(),
                    target_id: connection.target_id.clone(),
                });
            }
            let duplicated = self.connections[..index]
                .iter()
                .any(|earlier| earlier.same_pair(&connection.source_id, &connection.target_id));
            if duplicated {
                violations.push(GraphViolation::DuplicateConnection {
                    source_id: connection.source_id.clone(),
                    target_id: connection.target_id.clone(),
                });
            }
        }

        violations
    }

    /// Shorthand for `validate().is_empty()`.
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
