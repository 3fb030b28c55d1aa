use goalmap_core::remote::{CompletionResponse, RemoteGoalMap};
use goalmap_core::sync::SaveOutcome;
use goalmap_core::{
    CacheKey, CapacityError, CompletionOutcome, Durability, FixedClock, GoalNode, GraphError, InMemoryLocalCache,
    InMemoryRemoteStore, LocalCache, RemoteError, RemoteOp, RemoteStore, SyncError,
    SyncReconciler, SyncState,
};
use std::collections::BTreeSet;
use std::sync::Arc;

type Reconciler = SyncReconciler<InMemoryLocalCache, Arc<InMemoryRemoteStore>, FixedClock>;

fn loaded(project_id: &str) -> (Reconciler, Arc<InMemoryRemoteStore>) {
    let remote = Arc::new(InMemoryRemoteStore::new());
    let mut reconciler = SyncReconciler::with_clock(
        InMemoryLocalCache::new(),
        Arc::clone(&remote),
        FixedClock(1_700_000_000_000),
    );
    reconciler.load(project_id).unwrap();
    (reconciler, remote)
}

fn texts(nodes: &[GoalNode]) -> BTreeSet<String> {
    nodes.iter().map(|node| node.text.clone()).collect()
}

fn server_goal(id: &str, text: &str, level: u8) -> GoalNode {
    GoalNode {
        id: id.to_string(),
        text: text.to_string(),
        timeframe: String::new(),
        level,
        last_modified_at: 0,
    }
}

#[test]
fn first_save_creates_and_fetch_returns_exactly_the_saved_goals() {
    let (mut reconciler, remote) = loaded("P");
    for text in ["Grow revenue", "Cut cost", "Expand market"] {
        reconciler.add_node(text, "", 1).unwrap();
    }

    let err = reconciler.add_node("Hire team", "", 1).unwrap_err();
    assert_eq!(
        err,
        SyncError::Graph(GraphError::Capacity(CapacityError::LevelLimit {
            level: 1,
            limit: 3,
        }))
    );
    reconciler.add_node("Hire team", "", 2).unwrap();

    let report = reconciler.save().unwrap();

    assert!(!report.skipped);
    assert!(!report.id.is_empty());
    assert_eq!(report.state, SyncState::Reconciled);
    let fetched = remote.fetch_by_project("P").unwrap().unwrap();
    assert_eq!(fetched.id, report.id);
    assert_eq!(
        texts(&fetched.nodes),
        BTreeSet::from(
            ["Grow revenue", "Cut cost", "Expand market", "Hire team"].map(String::from)
        )
    );
    assert_eq!(remote.call_count(RemoteOp::Create), 1);
}

#[test]
fn save_then_fetch_round_trips_nodes_and_connections() {
    let (mut reconciler, remote) = loaded("P");
    let a = reconciler.add_node("A", "Q1", 1).unwrap();
    let b = reconciler.add_node("B", "Q2", 2).unwrap();
    let c = reconciler.add_node("C", "", 3).unwrap();
    reconciler.add_connection(&a, &b).unwrap();
    reconciler.add_connection(&b, &c).unwrap();

    reconciler.save().unwrap();

    let session = reconciler.snapshot().unwrap().clone();
    let fetched = remote.fetch_by_project("P").unwrap().unwrap();
    let as_set = |items: &[goalmap_core::GoalConnection]| {
        items
            .iter()
            .map(|c| (c.source_id.clone(), c.target_id.clone()))
            .collect::<BTreeSet<_>>()
    };
    assert_eq!(fetched.nodes, session.nodes);
    assert_eq!(as_set(&fetched.connections), as_set(&session.connections));
}

#[test]
fn second_save_updates_the_same_remote_map() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();
    let first = reconciler.save().unwrap();

    reconciler.add_node("B", "", 2).unwrap();
    assert!(reconciler.is_dirty());
    let second = reconciler.save().unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(remote.call_count(RemoteOp::Create), 1);
    assert_eq!(remote.call_count(RemoteOp::Update), 1);
    assert_eq!(remote.stored("P").unwrap().nodes.len(), 2);
}

#[test]
fn saving_a_confirmed_map_is_skipped() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();
    let first = reconciler.save().unwrap();

    let again = reconciler.save().unwrap();

    assert!(again.skipped);
    assert_eq!(again.id, first.id);
    assert_eq!(remote.call_count(RemoteOp::Create), 1);
    assert_eq!(remote.call_count(RemoteOp::Update), 0);
}

#[test]
fn failed_save_keeps_edits_dirty_and_cache_untouched() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();
    let cached_before = reconciler
        .cache()
        .get(&CacheKey::goal_map("P"))
        .unwrap()
        .unwrap();
    let writes_before = reconciler.cache().write_count();
    remote.fail_next(RemoteOp::Create, RemoteError::Network("timeout".to_string()));

    let err = reconciler.save().unwrap_err();

    assert_eq!(
        err,
        SyncError::Remote(RemoteError::Network("timeout".to_string()))
    );
    assert_eq!(reconciler.state(), SyncState::Dirty);
    assert_eq!(reconciler.snapshot().unwrap().node_count(), 1);
    assert_eq!(reconciler.snapshot().unwrap().id, None);
    assert_eq!(reconciler.cache().write_count(), writes_before);
    assert_eq!(
        reconciler.cache().get(&CacheKey::goal_map("P")).unwrap(),
        Some(cached_before)
    );

    let retry = reconciler.save().unwrap();
    assert_eq!(retry.state, SyncState::Reconciled);
}

#[test]
fn edits_made_while_saving_leave_the_session_dirty() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();

    let ticket = reconciler.begin_save().unwrap();
    assert_eq!(reconciler.state(), SyncState::Saving);
    assert_eq!(
        reconciler.begin_save().unwrap_err(),
        SyncError::SaveInFlight
    );
    reconciler.add_node("B", "", 2).unwrap();
    assert_eq!(reconciler.state(), SyncState::Saving);

    let result = ticket.execute(remote.as_ref());
    let outcome = reconciler.finish_save(ticket, result).unwrap();

    match outcome {
        SaveOutcome::Saved { state, .. } => assert_eq!(state, SyncState::Dirty),
        SaveOutcome::Discarded => panic!("save should apply"),
    }
    let snapshot = reconciler.snapshot().unwrap();
    assert_eq!(snapshot.node_count(), 2);
    assert!(snapshot.id.is_some());
    assert_eq!(remote.stored("P").unwrap().nodes.len(), 1);
}

#[test]
fn edits_made_while_a_failing_save_is_in_flight_survive() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();
    remote.fail_next(
        RemoteOp::Create,
        RemoteError::Http {
            status: 500,
            body: "boom".to_string(),
        },
    );

    let ticket = reconciler.begin_save().unwrap();
    reconciler.add_node("B", "", 2).unwrap();
    let result = ticket.execute(remote.as_ref());

    assert!(reconciler.finish_save(ticket, result).is_err());
    assert_eq!(reconciler.state(), SyncState::Dirty);
    assert_eq!(reconciler.snapshot().unwrap().node_count(), 2);
}

#[test]
fn save_result_after_project_switch_is_discarded() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();
    let ticket = reconciler.begin_save().unwrap();
    let result = ticket.execute(remote.as_ref());

    reconciler.load("Q").unwrap();

    assert_eq!(
        reconciler.finish_save(ticket, result).unwrap(),
        SaveOutcome::Discarded
    );
    assert_eq!(reconciler.project_id(), Some("Q"));
    assert_eq!(reconciler.snapshot().unwrap().id, None);
}

#[test]
fn update_of_a_vanished_remote_map_recreates_it() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();
    reconciler.save().unwrap();
    remote.fail_next(RemoteOp::Update, RemoteError::NotFound);
    reconciler.add_node("B", "", 2).unwrap();

    let report = reconciler.save().unwrap();

    assert_eq!(report.state, SyncState::Reconciled);
    assert_eq!(remote.call_count(RemoteOp::Create), 2);
    assert_eq!(remote.stored("P").unwrap().id, report.id);
    assert_eq!(remote.stored("P").unwrap().nodes.len(), 2);
}

#[test]
fn invalid_graph_is_never_sent() {
    let remote = Arc::new(InMemoryRemoteStore::new());
    remote.put(RemoteGoalMap {
        id: "map-x".to_string(),
        name: "Imported".to_string(),
        project_id: "P".to_string(),
        nodes: vec![GoalNode {
            id: "n1".to_string(),
            text: "Bad level".to_string(),
            timeframe: String::new(),
            level: 7,
            last_modified_at: 0,
        }],
        connections: Vec::new(),
        last_updated: 0,
    });
    let mut reconciler =
        SyncReconciler::with_clock(InMemoryLocalCache::new(), Arc::clone(&remote), FixedClock(5));
    reconciler.load("P").unwrap();
    reconciler.add_node("Fine", "", 1).unwrap();

    let err = reconciler.save().unwrap_err();

    assert!(matches!(err, SyncError::InvalidGraph(ref violations) if !violations.is_empty()));
    assert_eq!(reconciler.state(), SyncState::Dirty);
    assert_eq!(remote.call_count(RemoteOp::Update), 0);
}

#[test]
fn submit_saves_then_marks_goal_mapping_complete() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();

    let report = reconciler.submit().unwrap();

    assert!(report.completed);
    assert!(report.completion_error.is_none());
    assert!(!report.goals_adopted);
    assert!(remote.is_completed("P"));
    assert!(reconciler.completion_signal());
    assert_eq!(remote.stored("P").unwrap().nodes.len(), 1);
}

#[test]
fn completion_failure_keeps_the_saved_graph() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();
    reconciler.add_node("B", "", 2).unwrap();
    remote.fail_next(
        RemoteOp::Complete,
        RemoteError::Http {
            status: 502,
            body: "bad gateway".to_string(),
        },
    );

    let report = reconciler.submit().unwrap();

    assert!(!report.completed);
    assert!(report.completion_error.is_some());
    assert!(!reconciler.completion_signal());
    assert_eq!(reconciler.state(), SyncState::Reconciled);
    assert_eq!(reconciler.snapshot().unwrap().node_count(), 2);
    assert_eq!(remote.stored("P").unwrap().nodes.len(), 2);
}

#[test]
fn submit_fails_when_the_save_fails() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();
    remote.fail_next(RemoteOp::Create, RemoteError::Network("down".to_string()));

    assert!(matches!(
        reconciler.submit(),
        Err(SyncError::Remote(RemoteError::Network(_)))
    ));
    assert!(!remote.is_completed("P"));
    assert_eq!(reconciler.state(), SyncState::Dirty);
}

#[test]
fn non_empty_completion_echo_is_adopted_and_empty_echo_ignored() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("Mine", "", 1).unwrap();
    remote.set_completion_echo(Some(CompletionResponse {
        goals: Some(Vec::new()),
        connections: None,
    }));

    let ignored = reconciler.submit().unwrap();
    assert!(!ignored.goals_adopted);
    assert_eq!(reconciler.snapshot().unwrap().nodes[0].text, "Mine");

    let echoed = GoalNode {
        id: "server-1".to_string(),
        text: "Normalized by server".to_string(),
        timeframe: String::new(),
        level: 1,
        last_modified_at: 0,
    };
    remote.set_completion_echo(Some(CompletionResponse {
        goals: Some(vec![echoed.clone()]),
        connections: None,
    }));

    let adopted = reconciler.submit().unwrap();
    assert!(adopted.goals_adopted);
    assert_eq!(reconciler.snapshot().unwrap().nodes, vec![echoed]);
    let cached = reconciler
        .cache()
        .get(&CacheKey::goal_map("P"))
        .unwrap()
        .unwrap();
    assert_eq!(cached.nodes[0].id, "server-1");
}

#[test]
fn completion_echo_never_replaces_goals_edited_after_they_were_sent() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();
    reconciler.save().unwrap();
    remote.set_completion_echo(Some(CompletionResponse {
        goals: Some(vec![server_goal("srv-a", "A", 1)]),
        connections: None,
    }));

    let ticket = reconciler.begin_completion().unwrap();
    let result = ticket.execute(remote.as_ref());
    reconciler.add_node("B", "", 2).unwrap();

    let outcome = reconciler.apply_completion(ticket, result).unwrap();

    assert_eq!(
        outcome,
        CompletionOutcome::Completed {
            goals_adopted: false
        }
    );
    assert!(reconciler.completion_signal());
    assert_eq!(reconciler.state(), SyncState::Dirty);
    assert_eq!(
        texts(&reconciler.snapshot().unwrap().nodes),
        BTreeSet::from(["A", "B"].map(String::from))
    );
    let cached = reconciler
        .cache()
        .get(&CacheKey::goal_map("P"))
        .unwrap()
        .unwrap();
    assert_eq!(cached.node_count(), 2);
    assert!(cached.completed);
}

#[test]
fn completion_started_with_unsaved_edits_keeps_them() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();
    reconciler.save().unwrap();
    reconciler.add_node("B", "", 2).unwrap();
    remote.set_completion_echo(Some(CompletionResponse {
        goals: Some(vec![server_goal("srv-a", "A", 1)]),
        connections: None,
    }));

    let ticket = reconciler.begin_completion().unwrap();
    let result = ticket.execute(remote.as_ref());
    let outcome = reconciler.apply_completion(ticket, result).unwrap();

    assert_eq!(
        outcome,
        CompletionOutcome::Completed {
            goals_adopted: false
        }
    );
    assert_eq!(reconciler.snapshot().unwrap().node_count(), 2);
    assert_eq!(reconciler.state(), SyncState::Dirty);
}

#[test]
fn completion_result_after_project_switch_is_discarded() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();
    reconciler.save().unwrap();
    let ticket = reconciler.begin_completion().unwrap();
    let result = ticket.execute(remote.as_ref());

    reconciler.load("Q").unwrap();

    assert_eq!(
        reconciler.apply_completion(ticket, result).unwrap(),
        CompletionOutcome::Discarded
    );
    assert!(!reconciler.completion_signal());
}

#[test]
fn over_capacity_completion_echo_is_rejected() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("Mine", "", 1).unwrap();
    let echoed = (0..11u8)
        .map(|index| server_goal(&format!("srv-{index}"), "Server goal", index % 5 + 1))
        .collect::<Vec<_>>();
    remote.set_completion_echo(Some(CompletionResponse {
        goals: Some(echoed),
        connections: None,
    }));

    let report = reconciler.submit().unwrap();

    assert!(report.completed);
    assert!(!report.goals_adopted);
    assert!(reconciler.completion_signal());
    assert_eq!(reconciler.state(), SyncState::Reconciled);
    let snapshot = reconciler.snapshot().unwrap();
    assert_eq!(snapshot.node_count(), 1);
    assert_eq!(snapshot.nodes[0].text, "Mine");
    let cached = reconciler
        .cache()
        .get(&CacheKey::goal_map("P"))
        .unwrap()
        .unwrap();
    assert_eq!(cached.node_count(), 1);
}

#[test]
fn completion_signal_is_restored_when_the_project_is_reopened() {
    let (mut reconciler, _remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();
    reconciler.submit().unwrap();

    reconciler.load("Q").unwrap();
    assert!(!reconciler.completion_signal());
    reconciler.load("P").unwrap();

    assert!(reconciler.completion_signal());
    assert_eq!(reconciler.snapshot().unwrap().nodes[0].text, "A");
}

#[test]
fn cache_write_failure_degrades_to_in_memory_and_recovers() {
    let (mut reconciler, _remote) = loaded("P");
    assert_eq!(reconciler.durability(), Durability::Durable);
    reconciler.cache_mut().set_fail_writes(true);

    reconciler.add_node("Still kept", "", 1).unwrap();

    assert_eq!(reconciler.durability(), Durability::InMemoryOnly);
    assert_eq!(reconciler.snapshot().unwrap().node_count(), 1);

    reconciler.cache_mut().set_fail_writes(false);
    reconciler.add_node("Durable again", "", 2).unwrap();
    assert_eq!(reconciler.durability(), Durability::Durable);
    let cached = reconciler
        .cache()
        .get(&CacheKey::goal_map("P"))
        .unwrap()
        .unwrap();
    assert_eq!(cached.node_count(), 2);
}

#[test]
fn reset_then_save_persists_an_empty_map_with_the_same_identity() {
    let (mut reconciler, remote) = loaded("P");
    reconciler.add_node("A", "", 1).unwrap();
    let saved = reconciler.save().unwrap();

    assert!(reconciler.reset().unwrap());
    let after = reconciler.save().unwrap();

    assert_eq!(after.id, saved.id);
    assert!(remote.stored("P").unwrap().nodes.is_empty());
    assert_eq!(reconciler.snapshot().unwrap().last_updated, 1_700_000_000_000);
}

#[test]
fn unknown_node_ids_are_harmless_noops() {
    let (mut reconciler, _remote) = loaded("P");
    let before = reconciler.snapshot().unwrap().revision;

    assert!(!reconciler.delete_node("ghost").unwrap());
    assert!(!reconciler
        .update_node("ghost", goalmap_core::NodePatch::default())
        .unwrap());
    assert!(!reconciler.remove_connection("ghost", "other").unwrap());
    assert_eq!(reconciler.snapshot().unwrap().revision, before);
}
