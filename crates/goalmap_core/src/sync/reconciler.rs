//! Session owner for the active project's goal map.
//!
//! # Responsibility
//! - Hold the single authoritative in-memory `GoalMap`.
//! - Apply user edits, mirror them to the local cache, and push them to the
//!   remote store on save/submit.
//! - Reconcile remote and cached snapshots on load and refresh.
//!
//! # Invariants
//! - An empty remote payload never overwrites a non-empty session or cache.
//! - Results for a superseded request (older ticket, other project) are
//!   discarded, never applied.
//! - Edits made while a save is in flight leave the session `Dirty` once the
//!   save resolves, whatever its outcome.
//! - Nothing is written to the cache when a save fails, and a map that
//!   breaks graph rules is never written at all.
//! - A completion echo never replaces goals edited after they were sent.
//! - Goal text is never logged.

use crate::cache::{CacheKey, LocalCache};
use crate::config::DEFAULT_MAP_NAME;
use crate::model::goal_map::{GoalMap, GoalNode, GraphResult, NodePatch};
use crate::model::ids::{Clock, NodeId, Revision, SystemClock};
use crate::remote::{
    CompletionRequest, CompletionResponse, CreateGoalMapRequest, GoalMapData, RemoteError,
    RemoteGoalMap, RemoteResult, RemoteStore, UpdateGoalMapRequest,
};
use crate::sync::error::{SyncError, SyncResult};
use crate::sync::merge::{adopt_identity, reconcile, MergeRule, RemoteSnapshot};
use crate::sync::state::{Durability, SyncState};
use log::{debug, info, warn};

/// Handle for one in-flight load. Apply it with `apply_load`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    project_id: String,
    ticket_id: u64,
    base_revision: Revision,
    base_confirmed_saves: u64,
    refresh: bool,
}

impl LoadTicket {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Whether this load refreshes an already loaded session.
    pub fn is_refresh(&self) -> bool {
        self.refresh
    }
}

/// Remote write planned by `begin_save`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveRequest {
    Create(CreateGoalMapRequest),
    Update {
        id: String,
        request: UpdateGoalMapRequest,
    },
}

/// Handle for one in-flight save. Apply it with `finish_save`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveTicket {
    project_id: String,
    ticket_id: u64,
    revision: Revision,
    request: SaveRequest,
}

impl SaveTicket {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn request(&self) -> &SaveRequest {
        &self.request
    }

    /// Sends the planned write.
    ///
    /// An update whose remote map has vanished (`NotFound`) is retried once
    /// as a create so the user's graph is not stranded.
    pub fn execute<R: RemoteStore + ?Sized>(&self, remote: &R) -> RemoteResult<RemoteGoalMap> {
        match &self.request {
            SaveRequest::Create(request) => remote.create(request),
            SaveRequest::Update { id, request } => match remote.update(id, request) {
                Err(RemoteError::NotFound) => {
                    warn!(
                        "event=sync_save module=sync status=retry reason=remote_missing op=create"
                    );
                    remote.create(&CreateGoalMapRequest {
                        project_id: self.project_id.clone(),
                        name: request.name.clone(),
                        data: request.data.clone(),
                    })
                }
                other => other,
            },
        }
    }
}

/// Handle for one in-flight completion. Apply it with `apply_completion`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionTicket {
    project_id: String,
    ticket_id: u64,
    /// Session revision of the goals carried in `request`.
    revision: Revision,
    request: CompletionRequest,
}

impl CompletionTicket {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn request(&self) -> &CompletionRequest {
        &self.request
    }

    /// Sends the completion request.
    pub fn execute<R: RemoteStore + ?Sized>(
        &self,
        remote: &R,
    ) -> RemoteResult<CompletionResponse> {
        remote.mark_complete(&self.request)
    }
}

/// Result of applying a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { rule: MergeRule, state: SyncState },
    /// The ticket was superseded; nothing changed.
    Discarded,
}

/// Result of applying a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { id: String, state: SyncState },
    /// The ticket was superseded; nothing changed.
    Discarded,
}

/// Result of applying a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Goal mapping is complete; `goals_adopted` tells whether the server's
    /// goal list replaced the session goals.
    Completed { goals_adopted: bool },
    /// The ticket was superseded; nothing changed.
    Discarded,
}

/// Summary returned by `save`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// Remote id of the saved map.
    pub id: String,
    pub state: SyncState,
    /// True when nothing needed saving.
    pub skipped: bool,
}

/// Summary returned by `submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    pub save: SaveReport,
    pub completed: bool,
    /// Set when the graph was saved but marking completion failed.
    pub completion_error: Option<RemoteError>,
    /// Whether a non-empty goals echo replaced the session goals.
    pub goals_adopted: bool,
}

#[derive(Debug)]
struct Session {
    project_id: String,
    map: GoalMap,
    state: SyncState,
    pending_load: Option<u64>,
    pending_save: Option<u64>,
    pending_completion: Option<u64>,
    /// Number of saves the remote store has confirmed for this session.
    confirmed_saves: u64,
}

impl Session {
    fn cache_key(&self) -> CacheKey {
        CacheKey::goal_map(self.project_id.clone())
    }
}

/// Owner of the authoritative goal map for the active project.
pub struct SyncReconciler<C, R, K = SystemClock> {
    cache: C,
    remote: R,
    clock: K,
    default_map_name: String,
    session: Option<Session>,
    next_ticket_id: u64,
    durability: Durability,
}

impl<C: LocalCache, R: RemoteStore> SyncReconciler<C, R> {
    /// Creates a reconciler using the system clock.
    pub fn new(cache: C, remote: R) -> Self {
        Self::with_clock(cache, remote, SystemClock)
    }
}

impl<C: LocalCache, R: RemoteStore, K: Clock> SyncReconciler<C, R, K> {
    pub fn with_clock(cache: C, remote: R, clock: K) -> Self {
        Self {
            cache,
            remote,
            clock,
            default_map_name: DEFAULT_MAP_NAME.to_string(),
            session: None,
            next_ticket_id: 0,
            durability: Durability::Durable,
        }
    }

    /// Name given to maps created for projects that have none.
    pub fn with_default_map_name(mut self, name: impl Into<String>) -> Self {
        self.default_map_name = name.into();
        self
    }

    pub fn state(&self) -> SyncState {
        self.session
            .as_ref()
            .map_or(SyncState::Unloaded, |session| session.state)
    }

    pub fn project_id(&self) -> Option<&str> {
        self.session
            .as_ref()
            .map(|session| session.project_id.as_str())
    }

    /// Current authoritative map, once loaded.
    pub fn snapshot(&self) -> Option<&GoalMap> {
        self.session
            .as_ref()
            .filter(|session| session.state.is_loaded())
            .map(|session| &session.map)
    }

    pub fn is_dirty(&self) -> bool {
        self.state().has_unconfirmed_edits()
    }

    pub fn durability(&self) -> Durability {
        self.durability
    }

    /// Goal-mapping completion signal for progress aggregation.
    ///
    /// Stored with the cached map, so it survives restarts and project
    /// switches once the project has been loaded again.
    pub fn completion_signal(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.map.completed)
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut C {
        &mut self.cache
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Starts loading `project_id`.
    ///
    /// For the already active, loaded project this is a background refresh:
    /// the session stays editable. Any other project replaces the session and
    /// invalidates every ticket issued for the previous one.
    pub fn begin_load(&mut self, project_id: &str) -> SyncResult<LoadTicket> {
        let project_id = normalize_project_id(project_id)?;
        let ticket_id = self.issue_ticket_id();

        if let Some(session) = self.session.as_mut() {
            if session.project_id == project_id && session.state.is_loaded() {
                session.pending_load = Some(ticket_id);
                debug!(
                    "event=sync_load module=sync status=start mode=refresh state={}",
                    session.state
                );
                return Ok(LoadTicket {
                    project_id,
                    ticket_id,
                    base_revision: session.map.revision,
                    base_confirmed_saves: session.confirmed_saves,
                    refresh: true,
                });
            }
            if session.project_id != project_id && session.state.has_unconfirmed_edits() {
                info!(
                    "event=project_switch module=sync status=ok unsaved_state={} durability={}",
                    session.state,
                    self.durability.as_str()
                );
            }
        }

        self.session = Some(Session {
            map: GoalMap::new(project_id.clone(), self.default_map_name.clone()),
            project_id: project_id.clone(),
            state: SyncState::Loading,
            pending_load: Some(ticket_id),
            pending_save: None,
            pending_completion: None,
            confirmed_saves: 0,
        });
        debug!("event=sync_load module=sync status=start mode=initial");
        Ok(LoadTicket {
            project_id,
            ticket_id,
            base_revision: 0,
            base_confirmed_saves: 0,
            refresh: false,
        })
    }

    /// Applies the remote result for `ticket`.
    ///
    /// Stale tickets are discarded. Fetch failures are not errors here: they
    /// fall back to the cached snapshot.
    pub fn apply_load(
        &mut self,
        ticket: LoadTicket,
        fetched: RemoteResult<Option<RemoteGoalMap>>,
    ) -> SyncResult<LoadOutcome> {
        let Some(session) = self.session.as_mut() else {
            return Ok(LoadOutcome::Discarded);
        };
        if session.project_id != ticket.project_id
            || session.pending_load != Some(ticket.ticket_id)
        {
            debug!("event=sync_load module=sync status=discarded reason=stale_ticket");
            return Ok(LoadOutcome::Discarded);
        }
        session.pending_load = None;

        let snapshot = match RemoteSnapshot::from_fetch(fetched) {
            RemoteSnapshot::Present(map) if map.project_id != ticket.project_id => {
                warn!("event=sync_load module=sync status=warn reason=remote_project_mismatch");
                RemoteSnapshot::Failed(RemoteError::Decode(
                    "remote map belongs to another project".to_string(),
                ))
            }
            other => other,
        };
        if let RemoteSnapshot::Failed(err) = &snapshot {
            warn!(
                "event=sync_load module=sync status=warn error_code={} fallback=local",
                err.code()
            );
        }

        let (rule, pruned, violations) = if ticket.refresh {
            // A save confirmed after the fetch was issued makes the fetched
            // snapshot older than the session.
            let pending_edits = session.state.has_unconfirmed_edits()
                || session.map.revision != ticket.base_revision
                || session.confirmed_saves != ticket.base_confirmed_saves;
            if pending_edits {
                if let RemoteSnapshot::Present(remote) = &snapshot {
                    adopt_identity(&mut session.map, remote);
                }
                (MergeRule::PendingEditsKept, 0, 0)
            } else {
                match snapshot {
                    RemoteSnapshot::Failed(_) => {
                        info!(
                            "event=sync_load module=sync status=ok rule={} state={}",
                            MergeRule::RefreshFailed,
                            session.state
                        );
                        return Ok(LoadOutcome::Applied {
                            rule: MergeRule::RefreshFailed,
                            state: session.state,
                        });
                    }
                    snapshot => {
                        let merged = reconcile(
                            &ticket.project_id,
                            &self.default_map_name,
                            snapshot,
                            Some(session.map.clone()),
                            session.map.revision,
                        );
                        session.map = merged.map;
                        session.state = merged.state;
                        (merged.rule, merged.pruned_connections, merged.violations)
                    }
                }
            }
        } else {
            let key = session.cache_key();
            let cached = match self.cache.get(&key) {
                Ok(cached) => cached,
                Err(err) => {
                    warn!(
                        "event=cache_read module=cache status=error key={key} error={err}"
                    );
                    None
                }
            };
            let merged = reconcile(
                &ticket.project_id,
                &self.default_map_name,
                snapshot,
                cached,
                session.map.revision,
            );
            session.map = merged.map;
            session.state = merged.state;
            (merged.rule, merged.pruned_connections, merged.violations)
        };

        if pruned > 0 {
            warn!("event=sync_load module=sync status=warn pruned_connections={pruned}");
        }
        if violations > 0 {
            warn!(
                "event=sync_load module=sync status=warn reason=invalid_graph violations={violations} state={}",
                session.state
            );
        }
        info!(
            "event=sync_load module=sync status=ok rule={rule} state={} nodes={} connections={} revision={}",
            session.state,
            session.map.nodes.len(),
            session.map.connections.len(),
            session.map.revision
        );

        let state = session.state;
        Self::mirror(&mut self.cache, &mut self.durability, session);
        Ok(LoadOutcome::Applied { rule, state })
    }

    /// Fetches and reconciles `project_id` in one call.
    pub fn load(&mut self, project_id: &str) -> SyncResult<LoadOutcome> {
        let ticket = self.begin_load(project_id)?;
        let fetched = self.remote.fetch_by_project(ticket.project_id());
        self.apply_load(ticket, fetched)
    }

    /// Adds a goal to the active map.
    pub fn add_node(
        &mut self,
        text: impl Into<String>,
        timeframe: impl Into<String>,
        level: u8,
    ) -> SyncResult<NodeId> {
        let text = text.into();
        let timeframe = timeframe.into();
        self.mutate("add_node", |map| map.add_node(text, timeframe, level))
    }

    /// Patches a goal. Unknown ids are a successful no-op.
    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> SyncResult<bool> {
        self.mutate("update_node", |map| map.update_node(id, patch))
    }

    /// Deletes a goal and its connections.
    pub fn delete_node(&mut self, id: &str) -> SyncResult<bool> {
        self.mutate("delete_node", |map| Ok(map.remove_node(id)))
    }

    pub fn add_connection(&mut self, source_id: &str, target_id: &str) -> SyncResult<()> {
        self.mutate("add_connection", |map| {
            map.add_connection(source_id, target_id)
        })
    }

    pub fn remove_connection(&mut self, source_id: &str, target_id: &str) -> SyncResult<bool> {
        self.mutate("remove_connection", |map| {
            Ok(map.remove_connection(source_id, target_id))
        })
    }

    /// Clears every goal and connection, keeping map identity.
    pub fn reset(&mut self) -> SyncResult<bool> {
        self.mutate("reset", |map| Ok(map.reset()))
    }

    /// Plans a save of the current map and moves the session to `Saving`.
    pub fn begin_save(&mut self) -> SyncResult<SaveTicket> {
        let ticket_id = self.issue_ticket_id();
        let session = loaded_session(&mut self.session)?;
        if session.state == SyncState::Saving {
            return Err(SyncError::SaveInFlight);
        }
        let violations = session.map.validate();
        if !violations.is_empty() {
            warn!(
                "event=sync_save module=sync status=rejected violations={}",
                violations.len()
            );
            return Err(SyncError::InvalidGraph(violations));
        }

        let data = GoalMapData::from_map(&session.map);
        let request = match &session.map.id {
            Some(id) => SaveRequest::Update {
                id: id.clone(),
                request: UpdateGoalMapRequest {
                    name: session.map.name.clone(),
                    data,
                },
            },
            None => SaveRequest::Create(CreateGoalMapRequest {
                project_id: session.project_id.clone(),
                name: session.map.name.clone(),
                data,
            }),
        };

        session.state = SyncState::Saving;
        session.pending_save = Some(ticket_id);
        debug!(
            "event=sync_save module=sync status=start op={} revision={}",
            match &request {
                SaveRequest::Create(_) => "create",
                SaveRequest::Update { .. } => "update",
            },
            session.map.revision
        );
        Ok(SaveTicket {
            project_id: session.project_id.clone(),
            ticket_id,
            revision: session.map.revision,
            request,
        })
    }

    /// Applies the remote result for `ticket`.
    ///
    /// # Errors
    /// - `SyncError::Remote` when the save failed; the session is `Dirty`
    ///   and its edits are intact.
    pub fn finish_save(
        &mut self,
        ticket: SaveTicket,
        result: RemoteResult<RemoteGoalMap>,
    ) -> SyncResult<SaveOutcome> {
        let Some(session) = self.session.as_mut() else {
            return Ok(SaveOutcome::Discarded);
        };
        if session.project_id != ticket.project_id
            || session.pending_save != Some(ticket.ticket_id)
        {
            debug!("event=sync_save module=sync status=discarded reason=stale_ticket");
            return Ok(SaveOutcome::Discarded);
        }
        session.pending_save = None;

        let saved = match result {
            Ok(saved) => saved,
            Err(err) => {
                session.state = SyncState::Dirty;
                warn!(
                    "event=sync_save module=sync status=error error_code={} state={}",
                    err.code(),
                    session.state
                );
                return Err(SyncError::Remote(err));
            }
        };

        session.confirmed_saves += 1;
        session.map.id = Some(saved.id.clone());
        if saved.last_updated > 0 {
            session.map.last_updated = saved.last_updated;
        }
        session.state = if session.map.revision == ticket.revision {
            SyncState::Reconciled
        } else {
            SyncState::Dirty
        };
        info!(
            "event=sync_save module=sync status=ok state={} saved_revision={} revision={}",
            session.state, ticket.revision, session.map.revision
        );

        let state = session.state;
        Self::mirror(&mut self.cache, &mut self.durability, session);
        Ok(SaveOutcome::Saved {
            id: saved.id,
            state,
        })
    }

    /// Saves the current map to the remote store.
    ///
    /// A map that is already confirmed and has a remote id is not re-sent.
    pub fn save(&mut self) -> SyncResult<SaveReport> {
        {
            let session = loaded_session(&mut self.session)?;
            if session.state == SyncState::Reconciled {
                if let Some(id) = &session.map.id {
                    return Ok(SaveReport {
                        id: id.clone(),
                        state: session.state,
                        skipped: true,
                    });
                }
            }
        }

        let ticket = self.begin_save()?;
        let result = ticket.execute(&self.remote);
        match self.finish_save(ticket, result)? {
            SaveOutcome::Saved { id, state } => Ok(SaveReport {
                id,
                state,
                skipped: false,
            }),
            SaveOutcome::Discarded => Err(SyncError::Superseded),
        }
    }

    /// Saves, then marks goal mapping complete for the project.
    ///
    /// # Errors
    /// - Save failures are returned as errors.
    /// - Completion failures are reported in `SubmitReport::completion_error`;
    ///   the saved graph is kept.
    pub fn submit(&mut self) -> SyncResult<SubmitReport> {
        let save = self.save()?;
        let ticket = self.begin_completion()?;
        let result = ticket.execute(&self.remote);
        match self.apply_completion(ticket, result) {
            Ok(CompletionOutcome::Completed { goals_adopted }) => Ok(SubmitReport {
                save,
                completed: true,
                completion_error: None,
                goals_adopted,
            }),
            Ok(CompletionOutcome::Discarded) => Err(SyncError::Superseded),
            Err(SyncError::Remote(err)) => Ok(SubmitReport {
                save,
                completed: false,
                completion_error: Some(err),
                goals_adopted: false,
            }),
            Err(err) => Err(err),
        }
    }

    /// Plans marking goal mapping complete with the session's current goals.
    pub fn begin_completion(&mut self) -> SyncResult<CompletionTicket> {
        let ticket_id = self.issue_ticket_id();
        let session = loaded_session(&mut self.session)?;
        session.pending_completion = Some(ticket_id);
        debug!(
            "event=sync_complete module=sync status=start state={} revision={}",
            session.state, session.map.revision
        );
        Ok(CompletionTicket {
            project_id: session.project_id.clone(),
            ticket_id,
            revision: session.map.revision,
            request: CompletionRequest {
                project_id: session.project_id.clone(),
                current_goals: Some(session.map.nodes.clone()),
            },
        })
    }

    /// Applies the remote result for `ticket`.
    ///
    /// A goals echo is adopted only when it is non-empty, differs from the
    /// session, passes `validate()`, and the session is still `Reconciled` at
    /// the revision the ticket sent. Otherwise only the completion flag is
    /// recorded.
    ///
    /// # Errors
    /// - `SyncError::Remote` when marking completion failed; the session is
    ///   unchanged.
    pub fn apply_completion(
        &mut self,
        ticket: CompletionTicket,
        result: RemoteResult<CompletionResponse>,
    ) -> SyncResult<CompletionOutcome> {
        let Some(session) = self.session.as_mut() else {
            return Ok(CompletionOutcome::Discarded);
        };
        if session.project_id != ticket.project_id
            || session.pending_completion != Some(ticket.ticket_id)
        {
            debug!("event=sync_complete module=sync status=discarded reason=stale_ticket");
            return Ok(CompletionOutcome::Discarded);
        }
        session.pending_completion = None;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    "event=sync_complete module=sync status=error error_code={} graph=kept",
                    err.code()
                );
                return Err(SyncError::Remote(err));
            }
        };

        session.map.completed = true;
        let goals_adopted = adopt_echo(&mut session.map, session.state, ticket.revision, response);
        Self::mirror(&mut self.cache, &mut self.durability, session);
        Ok(CompletionOutcome::Completed { goals_adopted })
    }

    fn mutate<T>(
        &mut self,
        op: &'static str,
        apply: impl FnOnce(&mut GoalMap) -> GraphResult<T>,
    ) -> SyncResult<T> {
        let session = loaded_session(&mut self.session)?;
        let before = session.map.revision;
        let value = apply(&mut session.map).map_err(|err| {
            debug!("event=sync_edit module=sync op={op} status=rejected error={err}");
            SyncError::from(err)
        })?;
        if session.map.revision == before {
            return Ok(value);
        }

        session.map.last_updated = self.clock.now_epoch_ms();
        if session.state == SyncState::Reconciled {
            session.state = SyncState::Dirty;
        }
        debug!(
            "event=sync_edit module=sync op={op} status=ok state={} revision={}",
            session.state, session.map.revision
        );
        Self::mirror(&mut self.cache, &mut self.durability, session);
        Ok(value)
    }

    fn mirror(cache: &mut C, durability: &mut Durability, session: &Session) {
        let key = session.cache_key();
        let violations = session.map.validate();
        if !violations.is_empty() {
            warn!(
                "event=cache_write module=cache status=skipped key={key} reason=invalid_graph violations={}",
                violations.len()
            );
            return;
        }
        match cache.set(&key, &session.map) {
            Ok(()) => {
                if *durability == Durability::InMemoryOnly {
                    info!("event=cache_write module=cache status=ok durability=durable");
                }
                *durability = Durability::Durable;
            }
            Err(err) => {
                if *durability == Durability::Durable {
                    warn!(
                        "event=cache_write module=cache status=error key={key} durability=in_memory_only error={err}"
                    );
                }
                *durability = Durability::InMemoryOnly;
            }
        }
    }

    fn issue_ticket_id(&mut self) -> u64 {
        self.next_ticket_id += 1;
        self.next_ticket_id
    }
}

fn loaded_session(session: &mut Option<Session>) -> SyncResult<&mut Session> {
    match session.as_mut() {
        Some(session) if session.state.is_loaded() => Ok(session),
        _ => Err(SyncError::NotLoaded),
    }
}

fn normalize_project_id(project_id: &str) -> SyncResult<String> {
    let trimmed = project_id.trim();
    if trimmed.is_empty() {
        return Err(SyncError::InvalidProjectId(project_id.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Replaces `map` goals with a completion echo when that cannot lose edits.
///
/// Returns whether the echo was adopted.
fn adopt_echo(
    map: &mut GoalMap,
    state: SyncState,
    sent_revision: Revision,
    response: CompletionResponse,
) -> bool {
    let echoed = response.goals.unwrap_or_default();
    if echoed.is_empty() || same_goals(&map.nodes, &echoed) {
        info!("event=sync_complete module=sync status=ok goals_adopted=false");
        return false;
    }
    if state != SyncState::Reconciled || map.revision != sent_revision {
        info!(
            "event=sync_complete module=sync status=ok goals_adopted=false reason=edits_pending state={state} sent_revision={sent_revision} revision={}",
            map.revision
        );
        return false;
    }

    let mut candidate = map.clone();
    candidate.nodes = echoed;
    if let Some(connections) = response.connections {
        candidate.connections = connections;
    }
    let pruned = candidate.prune_connections();
    let violations = candidate.validate();
    if !violations.is_empty() {
        warn!(
            "event=sync_complete module=sync status=warn goals_adopted=false reason=invalid_echo violations={}",
            violations.len()
        );
        return false;
    }

    info!(
        "event=sync_complete module=sync status=ok goals_adopted=true nodes={} pruned_connections={pruned}",
        candidate.nodes.len()
    );
    *map = candidate;
    true
}

/// Compares goals by content, ignoring local modification stamps.
fn same_goals(current: &[GoalNode], echoed: &[GoalNode]) -> bool {
    current.len() == echoed.len()
        && current.iter().zip(echoed).all(|(a, b)| {
            a.id == b.id && a.text == b.text && a.timeframe == b.timeframe && a.level == b.level
        })
}
