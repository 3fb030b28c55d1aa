//! Snapshot precedence rules.
//!
//! # Responsibility
//! - Decide which copy of a goal map wins when remote, cache and session
//!   disagree.
//!
//! # Invariants
//! - A remote snapshot with zero goals never replaces a non-empty local graph.
//! - Adopted remote content is taken verbatim except for connections that
//!   break referential rules, which are dropped.
//! - A merged map that still breaks graph rules is never `Reconciled`.
//! - The session-local `revision` never moves backwards across a merge.
//! - Merging is deterministic: same inputs, byte-identical output.

use crate::model::goal_map::GoalMap;
use crate::remote::{RemoteError, RemoteGoalMap};
use crate::sync::state::SyncState;
use std::fmt::{Display, Formatter};

/// Remote side of a load, after transport handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSnapshot {
    Present(RemoteGoalMap),
    /// The store has no map for the project yet.
    Absent,
    Failed(RemoteError),
}

impl RemoteSnapshot {
    /// Maps a fetch result; `NotFound` counts as absent.
    pub fn from_fetch(result: Result<Option<RemoteGoalMap>, RemoteError>) -> Self {
        match result {
            Ok(Some(map)) => Self::Present(map),
            Ok(None) | Err(RemoteError::NotFound) => Self::Absent,
            Err(err) => Self::Failed(err),
        }
    }
}

/// Which precedence rule produced the reconciled map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Remote holds goals and becomes authoritative.
    RemoteAuthoritative,
    /// Remote is empty but local goals exist; local content is kept.
    LocalOverEmptyRemote,
    /// Remote and local are both empty; remote identity is adopted.
    EmptyRemote,
    /// Remote missing or unreachable; the cached snapshot is used.
    LocalFallback,
    /// Nothing anywhere; a fresh map is started.
    FreshMap,
    /// Unconfirmed session edits exist; only remote identity is adopted.
    PendingEditsKept,
    /// Background refresh failed; the session is left untouched.
    RefreshFailed,
}

impl MergeRule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RemoteAuthoritative => "remote_authoritative",
            Self::LocalOverEmptyRemote => "local_over_empty_remote",
            Self::EmptyRemote => "empty_remote",
            Self::LocalFallback => "local_fallback",
            Self::FreshMap => "fresh_map",
            Self::PendingEditsKept => "pending_edits_kept",
            Self::RefreshFailed => "refresh_failed",
        }
    }
}

impl Display for MergeRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconciled map plus the state the session should enter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub map: GoalMap,
    pub rule: MergeRule,
    pub state: SyncState,
    /// Connections dropped while adopting remote content.
    pub pruned_connections: usize,
    /// Graph rules the resulting map still breaks; non-zero forces `Dirty`.
    pub violations: usize,
}

/// Applies the load precedence rules.
///
/// `local` is the best local candidate for `project_id`: the session map on
/// refresh, otherwise the cached snapshot. `revision` is the floor for the
/// resulting map's revision. The completion flag is a project fact and is
/// carried over from `local` whichever copy wins.
pub fn reconcile(
    project_id: &str,
    default_name: &str,
    remote: RemoteSnapshot,
    local: Option<GoalMap>,
    revision: u64,
) -> MergeResult {
    let local = local.filter(|map| map.project_id == project_id);
    let revision = local
        .as_ref()
        .map_or(revision, |map| map.revision.max(revision));
    let completed = local.as_ref().is_some_and(|map| map.completed);

    let (mut map, rule, state) = match remote {
        RemoteSnapshot::Present(snapshot) if !snapshot.nodes.is_empty() => (
            snapshot.into_goal_map(revision),
            MergeRule::RemoteAuthoritative,
            SyncState::Reconciled,
        ),
        RemoteSnapshot::Present(snapshot) => match local.filter(|map| !map.is_empty()) {
            Some(mut map) => {
                adopt_identity(&mut map, &snapshot);
                (map, MergeRule::LocalOverEmptyRemote, SyncState::Dirty)
            }
            None => (
                snapshot.into_goal_map(revision),
                MergeRule::EmptyRemote,
                SyncState::Reconciled,
            ),
        },
        RemoteSnapshot::Absent | RemoteSnapshot::Failed(_) => match local {
            Some(map) => (map, MergeRule::LocalFallback, SyncState::Dirty),
            None => (
                GoalMap::new(project_id, default_name),
                MergeRule::FreshMap,
                SyncState::Dirty,
            ),
        },
    };

    map.revision = revision;
    map.completed = completed;
    let pruned_connections = map.prune_connections();
    let violations = map.validate().len();
    let state = if violations > 0 {
        SyncState::Dirty
    } else {
        state
    };
    MergeResult {
        map,
        rule,
        state,
        pruned_connections,
        violations,
    }
}

/// Copies remote identity onto a local map, leaving its content alone.
///
/// Returns whether anything changed.
pub fn adopt_identity(map: &mut GoalMap, remote: &RemoteGoalMap) -> bool {
    let mut changed = false;
    if map.id.as_deref() != Some(remote.id.as_str()) {
        map.id = Some(remote.id.clone());
        changed = true;
    }
    if !remote.name.trim().is_empty() && map.name != remote.name {
        map.name = remote.name.clone();
        changed = true;
    }
    if map.project_id != remote.project_id {
        map.project_id = remote.project_id.clone();
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::{adopt_identity, reconcile, MergeRule, RemoteSnapshot};
    use crate::model::goal_map::{GoalConnection, GoalMap, GoalNode};
    use crate::remote::{RemoteError, RemoteGoalMap};
    use crate::sync::state::SyncState;

    fn remote(nodes: Vec<GoalNode>) -> RemoteGoalMap {
        RemoteGoalMap {
            id: "map-9".to_string(),
            name: "Remote name".to_string(),
            project_id: "p1".to_string(),
            nodes,
            connections: Vec::new(),
            last_updated: 100,
        }
    }

    fn goal(id: &str, level: u8) -> GoalNode {
        GoalNode {
            id: id.to_string(),
            text: format!("goal {id}"),
            timeframe: String::new(),
            level,
            last_modified_at: 0,
        }
    }

    fn local_with_two_goals() -> GoalMap {
        let mut map = GoalMap::new("p1", "Local name");
        let a = map.add_node("a", "", 1).unwrap();
        let b = map.add_node("b", "", 2).unwrap();
        map.add_connection(&a, &b).unwrap();
        map
    }

    #[test]
    fn non_empty_remote_wins_and_keeps_revision_floor() {
        let local = local_with_two_goals();
        let result = reconcile(
            "p1",
            "Success Map",
            RemoteSnapshot::Present(remote(vec![goal("r1", 1)])),
            Some(local),
            1,
        );
        assert_eq!(result.rule, MergeRule::RemoteAuthoritative);
        assert_eq!(result.state, SyncState::Reconciled);
        assert_eq!(result.map.nodes, vec![goal("r1", 1)]);
        assert_eq!(result.map.id.as_deref(), Some("map-9"));
        assert_eq!(result.map.revision, 3);
    }

    #[test]
    fn empty_remote_never_erases_local_goals() {
        let local = local_with_two_goals();
        let result = reconcile(
            "p1",
            "Success Map",
            RemoteSnapshot::Present(remote(Vec::new())),
            Some(local.clone()),
            0,
        );
        assert_eq!(result.rule, MergeRule::LocalOverEmptyRemote);
        assert_eq!(result.state, SyncState::Dirty);
        assert_eq!(result.map.nodes, local.nodes);
        assert_eq!(result.map.connections, local.connections);
        assert_eq!(result.map.id.as_deref(), Some("map-9"));
        assert_eq!(result.map.name, "Remote name");
    }

    #[test]
    fn failed_remote_falls_back_to_matching_local_only() {
        let mut other_project = local_with_two_goals();
        other_project.project_id = "p2".to_string();

        let result = reconcile(
            "p1",
            "Success Map",
            RemoteSnapshot::Failed(RemoteError::Network("down".to_string())),
            Some(other_project),
            0,
        );
        assert_eq!(result.rule, MergeRule::FreshMap);
        assert!(result.map.is_empty());
        assert_eq!(result.map.project_id, "p1");
        assert_eq!(result.state, SyncState::Dirty);

        let fallback = reconcile(
            "p1",
            "Success Map",
            RemoteSnapshot::Absent,
            Some(local_with_two_goals()),
            0,
        );
        assert_eq!(fallback.rule, MergeRule::LocalFallback);
        assert_eq!(fallback.map.node_count(), 2);
    }

    #[test]
    fn remote_dangling_connections_are_pruned() {
        let mut snapshot = remote(vec![goal("r1", 1), goal("r2", 2)]);
        snapshot.connections = vec![
            GoalConnection::new("r1", "r2"),
            GoalConnection::new("r1", "gone"),
        ];
        let result = reconcile("p1", "Success Map", RemoteSnapshot::Present(snapshot), None, 0);
        assert_eq!(result.pruned_connections, 1);
        assert_eq!(result.map.connections.len(), 1);
    }

    #[test]
    fn over_capacity_remote_is_adopted_dirty() {
        let snapshot = remote(vec![goal("r1", 1), goal("r2", 1), goal("r3", 1), goal("r4", 1)]);

        let result = reconcile("p1", "Success Map", RemoteSnapshot::Present(snapshot), None, 0);

        assert_eq!(result.rule, MergeRule::RemoteAuthoritative);
        assert_eq!(result.state, SyncState::Dirty);
        assert_eq!(result.violations, 1);
        assert_eq!(result.map.node_count(), 4);
    }

    #[test]
    fn completion_flag_survives_remote_adoption() {
        let mut local = local_with_two_goals();
        local.completed = true;

        let result = reconcile(
            "p1",
            "Success Map",
            RemoteSnapshot::Present(remote(vec![goal("r1", 1)])),
            Some(local),
            0,
        );

        assert!(result.map.completed);
    }

    #[test]
    fn not_found_fetch_counts_as_absent() {
        assert_eq!(
            RemoteSnapshot::from_fetch(Err(RemoteError::NotFound)),
            RemoteSnapshot::Absent
        );
    }

    #[test]
    fn adopt_identity_keeps_local_name_when_remote_blank() {
        let mut map = GoalMap::new("p1", "Local name");
        let mut snapshot = remote(Vec::new());
        snapshot.name = String::new();
        assert!(adopt_identity(&mut map, &snapshot));
        assert_eq!(map.name, "Local name");
        assert!(!adopt_identity(&mut map, &snapshot));
    }
}
