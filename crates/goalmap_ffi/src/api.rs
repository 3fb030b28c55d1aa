//! FFI use-case API for the goal-mapping screens.
//!
//! # Responsibility
//! - Expose stable, use-case-level functions to Dart via FRB.
//! - Hold the single active goal-map session for the process.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Failures are reported in response envelopes, never as panics.
//! - Goal text never appears in envelope messages or logs.

use goalmap_core::{
    core_version as core_version_inner, init_from_config, init_logging as init_logging_inner,
    ping as ping_inner, reconciler_from_config, CompletionSignals, CoreConfig, DeliveryStage, DynReconciler,
    GoalMap, LoadOutcome, NodePatch, ProgressAggregator, SituationalAssessment,
};
use log::warn;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, OnceLock};

const CONFIG_PATH_ENV: &str = "GOALMAP_CONFIG_PATH";
const DB_PATH_ENV: &str = "GOALMAP_DB_PATH";

static SESSION: OnceLock<Mutex<Option<DynReconciler>>> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// # FFI contract
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory for rolling log files.
/// - Idempotent for identical input; conflicting re-init returns an error.
/// - Returns empty string on success and the error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One goal as shown by the map editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalNodeItem {
    pub id: String,
    pub text: String,
    pub timeframe: String,
    /// Goal level, `1..=5`.
    pub level: u8,
}

/// One edge between two goals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalConnectionItem {
    pub source_id: String,
    pub target_id: String,
}

/// Full view of the active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalMapSnapshotResponse {
    pub ok: bool,
    pub project_id: Option<String>,
    /// Remote map id; `None` until the first successful save.
    pub map_id: Option<String>,
    pub name: String,
    pub nodes: Vec<GoalNodeItem>,
    pub connections: Vec<GoalConnectionItem>,
    /// `unloaded|loading|reconciled|dirty|saving`.
    pub state: String,
    /// `durable|in_memory_only`.
    pub durability: String,
    pub message: String,
}

/// Result of one editor action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalMapActionResponse {
    pub ok: bool,
    /// Id of the created goal, for `goal_map_add_node`.
    pub node_id: Option<String>,
    /// Whether the map changed.
    pub changed: bool,
    pub state: String,
    pub message: String,
}

/// Result of `goal_map_save`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalMapSaveResponse {
    pub ok: bool,
    pub map_id: Option<String>,
    /// True when the map was already confirmed and nothing was sent.
    pub skipped: bool,
    pub state: String,
    pub message: String,
}

/// Result of `goal_map_submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalMapSubmitResponse {
    pub ok: bool,
    pub map_id: Option<String>,
    /// Whether goal mapping was marked complete remotely.
    pub completed: bool,
    /// Whether the server's goal list replaced the local one.
    pub goals_adopted: bool,
    pub state: String,
    pub message: String,
}

/// Aggregated bearings progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearingsStatusResponse {
    /// `not_started|in_progress|completed`.
    pub status: String,
    pub completion_percent: u8,
    pub goal_mapping_completed: bool,
}

/// Replaces the active session with one built from configuration JSON.
///
/// `GOALMAP_DB_PATH`, when set, overrides `cache_db_path`.
#[flutter_rust_bridge::frb(sync)]
pub fn goal_map_configure(config_json: String) -> GoalMapActionResponse {
    let config = match CoreConfig::from_json_str(&config_json) {
        Ok(config) => apply_env_overrides(config),
        Err(err) => return action_failure("goal_map_configure", err),
    };
    start_configured_logging(&config);
    match reconciler_from_config(&config) {
        Ok(reconciler) => {
            let state = reconciler.state().to_string();
            *lock_session() = Some(reconciler);
            GoalMapActionResponse {
                ok: true,
                node_id: None,
                changed: true,
                state,
                message: "Goal map configured.".to_string(),
            }
        }
        Err(err) => action_failure("goal_map_configure", err),
    }
}

/// Opens (or refreshes) the goal map of `project_id`.
///
/// # FFI contract
/// - Sync call; performs one blocking remote fetch.
/// - A fetch failure is not an error: cached data is shown instead.
#[flutter_rust_bridge::frb(sync)]
pub fn goal_map_open(project_id: String) -> GoalMapSnapshotResponse {
    let mut slot = lock_session();
    let reconciler = match ensure_session(&mut slot) {
        Ok(reconciler) => reconciler,
        Err(message) => return snapshot_failure(message),
    };
    match reconciler.load(&project_id) {
        Ok(LoadOutcome::Applied { rule, .. }) => {
            snapshot_of(reconciler, format!("Goal map loaded ({rule})."))
        }
        Ok(LoadOutcome::Discarded) => snapshot_of(reconciler, "Load superseded.".to_string()),
        Err(err) => snapshot_failure(format!("goal_map_open failed: {err}")),
    }
}

/// Returns the current session view without touching the remote store.
#[flutter_rust_bridge::frb(sync)]
pub fn goal_map_snapshot() -> GoalMapSnapshotResponse {
    let slot = lock_session();
    match slot.as_ref() {
        Some(reconciler) => snapshot_of(reconciler, String::new()),
        None => snapshot_failure("Goal map is not configured.".to_string()),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn goal_map_add_node(text: String, timeframe: String, level: u8) -> GoalMapActionResponse {
    with_reconciler("goal_map_add_node", |reconciler| {
        let node_id = reconciler.add_node(text, timeframe, level)?;
        Ok((Some(node_id), true, "Goal added."))
    })
}

/// Patches one goal. `None` arguments keep the current value.
#[flutter_rust_bridge::frb(sync)]
pub fn goal_map_update_node(
    node_id: String,
    text: Option<String>,
    timeframe: Option<String>,
    level: Option<u8>,
) -> GoalMapActionResponse {
    with_reconciler("goal_map_update_node", |reconciler| {
        let changed = reconciler.update_node(
            &node_id,
            NodePatch {
                text,
                timeframe,
                level,
            },
        )?;
        Ok((None, changed, if changed { "Goal updated." } else { "No change." }))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn goal_map_delete_node(node_id: String) -> GoalMapActionResponse {
    with_reconciler("goal_map_delete_node", |reconciler| {
        let changed = reconciler.delete_node(&node_id)?;
        Ok((None, changed, if changed { "Goal deleted." } else { "No change." }))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn goal_map_add_connection(source_id: String, target_id: String) -> GoalMapActionResponse {
    with_reconciler("goal_map_add_connection", |reconciler| {
        reconciler.add_connection(&source_id, &target_id)?;
        Ok((None, true, "Goals connected."))
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn goal_map_remove_connection(source_id: String, target_id: String) -> GoalMapActionResponse {
    with_reconciler("goal_map_remove_connection", |reconciler| {
        let changed = reconciler.remove_connection(&source_id, &target_id)?;
        Ok((
            None,
            changed,
            if changed {
                "Connection removed."
            } else {
                "No change."
            },
        ))
    })
}

/// Clears all goals and connections of the active map.
#[flutter_rust_bridge::frb(sync)]
pub fn goal_map_reset() -> GoalMapActionResponse {
    with_reconciler("goal_map_reset", |reconciler| {
        let changed = reconciler.reset()?;
        Ok((None, changed, if changed { "Goal map cleared." } else { "No change." }))
    })
}

/// Pushes the active map to the remote store.
///
/// # FFI contract
/// - Sync call; performs at most two blocking remote writes.
/// - On failure the local edits are kept and the state is `dirty`.
#[flutter_rust_bridge::frb(sync)]
pub fn goal_map_save() -> GoalMapSaveResponse {
    let mut slot = lock_session();
    let Some(reconciler) = slot.as_mut() else {
        return GoalMapSaveResponse {
            ok: false,
            map_id: None,
            skipped: false,
            state: "unloaded".to_string(),
            message: "Goal map is not configured.".to_string(),
        };
    };
    match reconciler.save() {
        Ok(report) => GoalMapSaveResponse {
            ok: true,
            map_id: Some(report.id),
            skipped: report.skipped,
            state: report.state.to_string(),
            message: if report.skipped {
                "Already saved.".to_string()
            } else {
                "Goal map saved.".to_string()
            },
        },
        Err(err) => GoalMapSaveResponse {
            ok: false,
            map_id: current_map_id(reconciler),
            skipped: false,
            state: reconciler.state().to_string(),
            message: format!("goal_map_save failed: {err}"),
        },
    }
}

/// Saves the active map and marks goal mapping complete.
#[flutter_rust_bridge::frb(sync)]
pub fn goal_map_submit() -> GoalMapSubmitResponse {
    let mut slot = lock_session();
    let Some(reconciler) = slot.as_mut() else {
        return GoalMapSubmitResponse {
            ok: false,
            map_id: None,
            completed: false,
            goals_adopted: false,
            state: "unloaded".to_string(),
            message: "Goal map is not configured.".to_string(),
        };
    };
    match reconciler.submit() {
        Ok(report) => {
            let message = match &report.completion_error {
                Some(err) => format!("Goal map saved; completion failed: {err}"),
                None => "Goal mapping completed.".to_string(),
            };
            GoalMapSubmitResponse {
                ok: true,
                map_id: Some(report.save.id),
                completed: report.completed,
                goals_adopted: report.goals_adopted,
                state: reconciler.state().to_string(),
                message,
            }
        }
        Err(err) => GoalMapSubmitResponse {
            ok: false,
            map_id: current_map_id(reconciler),
            completed: false,
            goals_adopted: false,
            state: reconciler.state().to_string(),
            message: format!("goal_map_submit failed: {err}"),
        },
    }
}

/// Combines the session's goal-mapping completion with the other tools.
///
/// Blank or missing selections count as not completed. Goal-mapping
/// completion is read from the open project; it is stored with the cached map,
/// so it reads `false` until `goal_map_open` has loaded that project.
#[flutter_rust_bridge::frb(sync)]
pub fn bearings_status(
    selected_domain: Option<String>,
    delivery_stage: Option<String>,
) -> BearingsStatusResponse {
    let goal_mapping = lock_session()
        .as_ref()
        .is_some_and(|reconciler| reconciler.completion_signal());
    let signals = CompletionSignals::from_tools(
        goal_mapping,
        &SituationalAssessment { selected_domain },
        &DeliveryStage {
            stage: delivery_stage,
        },
    );
    let progress = ProgressAggregator::new(signals);
    BearingsStatusResponse {
        status: progress.bearings_status().to_string(),
        completion_percent: progress.completion_percent(),
        goal_mapping_completed: goal_mapping,
    }
}

fn lock_session() -> MutexGuard<'static, Option<DynReconciler>> {
    SESSION
        .get_or_init(|| Mutex::new(None))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn ensure_session(slot: &mut Option<DynReconciler>) -> Result<&mut DynReconciler, String> {
    if slot.is_none() {
        let config = config_from_env()?;
        let reconciler = reconciler_from_config(&config)
            .map_err(|err| format!("goal map session init failed: {err}"))?;
        *slot = Some(reconciler);
    }
    slot.as_mut()
        .ok_or_else(|| "goal map session unavailable".to_string())
}

fn config_from_env() -> Result<CoreConfig, String> {
    let path = env_path(CONFIG_PATH_ENV).ok_or_else(|| {
        format!("Goal map is not configured; call goal_map_configure or set {CONFIG_PATH_ENV}.")
    })?;
    let config = CoreConfig::load(&path).map_err(|err| err.to_string())?;
    let config = apply_env_overrides(config);
    start_configured_logging(&config);
    Ok(config)
}

/// File logging is optional; a rejected logging setup never blocks the session.
fn start_configured_logging(config: &CoreConfig) {
    if let Err(err) = init_from_config(config) {
        warn!("event=logging_init module=ffi status=error error={err}");
    }
}

fn apply_env_overrides(mut config: CoreConfig) -> CoreConfig {
    if let Some(db_path) = env_path(DB_PATH_ENV) {
        config.cache_db_path = Some(db_path);
    }
    config
}

fn env_path(name: &str) -> Option<PathBuf> {
    let raw = std::env::var(name).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(trimmed))
}

fn with_reconciler(
    op: &'static str,
    f: impl FnOnce(
        &mut DynReconciler,
    ) -> Result<(Option<String>, bool, &'static str), goalmap_core::SyncError>,
) -> GoalMapActionResponse {
    let mut slot = lock_session();
    let Some(reconciler) = slot.as_mut() else {
        return action_failure(op, "goal map is not configured");
    };
    match f(reconciler) {
        Ok((node_id, changed, message)) => GoalMapActionResponse {
            ok: true,
            node_id,
            changed,
            state: reconciler.state().to_string(),
            message: message.to_string(),
        },
        Err(err) => GoalMapActionResponse {
            ok: false,
            node_id: None,
            changed: false,
            state: reconciler.state().to_string(),
            message: format!("{op} failed: {err}"),
        },
    }
}

fn action_failure(op: &str, err: impl std::fmt::Display) -> GoalMapActionResponse {
    warn!("event=ffi_call module=ffi op={op} status=error");
    GoalMapActionResponse {
        ok: false,
        node_id: None,
        changed: false,
        state: "unloaded".to_string(),
        message: format!("{op} failed: {err}"),
    }
}

fn current_map_id(reconciler: &DynReconciler) -> Option<String> {
    reconciler.snapshot().and_then(|map| map.id.clone())
}

fn snapshot_of(reconciler: &DynReconciler, message: String) -> GoalMapSnapshotResponse {
    let empty = GoalMap::new(String::new(), String::new());
    let map = reconciler.snapshot().unwrap_or(&empty);
    GoalMapSnapshotResponse {
        ok: true,
        project_id: reconciler.project_id().map(str::to_string),
        map_id: map.id.clone(),
        name: map.name.clone(),
        nodes: map
            .nodes
            .iter()
            .map(|node| GoalNodeItem {
                id: node.id.clone(),
                text: node.text.clone(),
                timeframe: node.timeframe.clone(),
                level: node.level,
            })
            .collect(),
        connections: map
            .connections
            .iter()
            .map(|connection| GoalConnectionItem {
                source_id: connection.source_id.clone(),
                target_id: connection.target_id.clone(),
            })
            .collect(),
        state: reconciler.state().to_string(),
        durability: reconciler.durability().as_str().to_string(),
        message,
    }
}

fn snapshot_failure(message: String) -> GoalMapSnapshotResponse {
    GoalMapSnapshotResponse {
        ok: false,
        project_id: None,
        map_id: None,
        name: String::new(),
        nodes: Vec::new(),
        connections: Vec::new(),
        state: "unloaded".to_string(),
        durability: "durable".to_string(),
        message,
    }
}

#[cfg(test)]
fn install_session(reconciler: DynReconciler) {
    *lock_session() = Some(reconciler);
}
