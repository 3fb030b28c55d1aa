//! In-process `RemoteStore` fake with failure injection.

use super::{
    CompletionRequest, CompletionResponse, CreateGoalMapRequest, RemoteError, RemoteGoalMap,
    RemoteResult, RemoteStore, UpdateGoalMapRequest,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Remote operation selector for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RemoteOp {
    Fetch,
    Create,
    Update,
    Complete,
}

#[derive(Debug, Default)]
struct State {
    maps_by_project: BTreeMap<String, RemoteGoalMap>,
    completed_projects: BTreeSet<String>,
    queued_failures: BTreeMap<RemoteOp, VecDeque<RemoteError>>,
    completion_echo: Option<CompletionResponse>,
    calls: BTreeMap<RemoteOp, usize>,
    next_id: u64,
}

/// Remote store kept in memory, keyed by project id.
///
/// Mirrors the REST contract closely enough for reconciliation tests: create
/// assigns an id, update requires an existing id, fetch returns `None` for
/// unknown projects.
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    state: Mutex<State>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds or replaces the stored map for its project.
    pub fn put(&self, map: RemoteGoalMap) {
        self.lock()
            .maps_by_project
            .insert(map.project_id.clone(), map);
    }

    /// Returns the stored map for `project_id` without counting a call.
    pub fn stored(&self, project_id: &str) -> Option<RemoteGoalMap> {
        self.lock().maps_by_project.get(project_id).cloned()
    }

    /// Queues `error` for the next call of `op`.
    pub fn fail_next(&self, op: RemoteOp, error: RemoteError) {
        self.lock()
            .queued_failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Response body returned by subsequent `mark_complete` calls.
    pub fn set_completion_echo(&self, echo: Option<CompletionResponse>) {
        self.lock().completion_echo = echo;
    }

    pub fn is_completed(&self, project_id: &str) -> bool {
        self.lock().completed_projects.contains(project_id)
    }

    pub fn call_count(&self, op: RemoteOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned fake is still usable; tests assert on its contents.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self, op: RemoteOp) -> RemoteResult<MutexGuard<'_, State>> {
        let mut state = self.lock();
        *state.calls.entry(op).or_default() += 1;
        if let Some(error) = state
            .queued_failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        Ok(state)
    }
}

impl RemoteStore for InMemoryRemoteStore {
    fn fetch_by_project(&self, project_id: &str) -> RemoteResult<Option<RemoteGoalMap>> {
        let state = self.begin(RemoteOp::Fetch)?;
        Ok(state.maps_by_project.get(project_id).cloned())
    }

    fn create(&self, request: &CreateGoalMapRequest) -> RemoteResult<RemoteGoalMap> {
        let mut state = self.begin(RemoteOp::Create)?;
        state.next_id += 1;
        let saved = RemoteGoalMap {
            id: format!("map-{}", state.next_id),
            name: request.name.clone(),
            project_id: request.project_id.clone(),
            nodes: request.data.goals.clone(),
            connections: request.data.connections.clone(),
            last_updated: request.data.timestamp,
        };
        state
            .maps_by_project
            .insert(saved.project_id.clone(), saved.clone());
        Ok(saved)
    }

    fn update(&self, id: &str, request: &UpdateGoalMapRequest) -> RemoteResult<RemoteGoalMap> {
        let mut state = self.begin(RemoteOp::Update)?;
        let existing = state
            .maps_by_project
            .values_mut()
            .find(|map| map.id == id)
            .ok_or(RemoteError::NotFound)?;
        existing.name = request.name.clone();
        existing.nodes = request.data.goals.clone();
        existing.connections = request.data.connections.clone();
        existing.last_updated = request.data.timestamp;
        Ok(existing.clone())
    }

    fn mark_complete(&self, request: &CompletionRequest) -> RemoteResult<CompletionResponse> {
        let mut state = self.begin(RemoteOp::Complete)?;
        state.completed_projects.insert(request.project_id.clone());
        Ok(state.completion_echo.clone().unwrap_or_default())
    }
}
