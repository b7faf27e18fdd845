//! Executor scenario tests: optimistic apply, rollback, conflict refresh,
//! dedup suppression, and the offline deploy path.

mod common;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use patrolsync::error::DispatchError;
use patrolsync::model::{Officer, OfficerStatus, Patrol, PatrolStatus, SyncStatus};
use patrolsync::offline::OperationKind;
use patrolsync::remote::RemoteError;
use patrolsync::ActionOutcome;

use common::harness;

#[tokio::test]
async fn offline_deploy_queues_without_touching_the_network() {
    let h = harness(false).await;

    let outcome = h
        .actions
        .handle_deploy_officer(h.officer_id, h.patrol_id)
        .await
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Queued);

    // Local optimistic state reflects the intended end state
    let officer = h.store.officer(&h.officer_id).await.unwrap();
    assert_eq!(officer.status, OfficerStatus::OnDuty);
    assert_eq!(officer.current_patrol, Some(h.patrol_id));
    let patrol = h.store.patrol(&h.patrol_id).await.unwrap();
    assert_eq!(patrol.status, PatrolStatus::InProgress);

    // Exactly one pending deploy operation persisted, no remote call
    let entries = h.queue.entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_matches!(entries[0].op, OperationKind::Deploy { .. });
    assert_eq!(entries[0].sync_status, SyncStatus::Pending);
    assert_eq!(h.api.call_count(), 0);
}

#[tokio::test]
async fn queued_deploy_replays_with_its_original_request_id() {
    let h = harness(false).await;
    h.actions
        .handle_deploy_officer(h.officer_id, h.patrol_id)
        .await
        .unwrap();

    let queued_request_id = h.queue.entries().await.unwrap()[0].op.request_id();

    h.monitor.set_online(true);
    h.queue.flush().await.unwrap();

    assert!(h.queue.entries().await.unwrap().is_empty());
    let server = h.api.server_patrol(&h.patrol_id).unwrap();
    assert_eq!(server.status, PatrolStatus::InProgress);
    assert_eq!(server.assigned_officer, Some(h.officer_id));

    // Replaying the same request id is acknowledged without reapplying
    let version_after_first = server.version;
    let ack = {
        use patrolsync::remote::{DeployRequest, PatrolApi};
        h.api
            .deploy_patrol(&DeployRequest {
                patrol_id: h.patrol_id,
                officer_id: h.officer_id,
                version: Some(version_after_first),
                request_id: queued_request_id,
            })
            .await
            .unwrap()
    };
    assert_eq!(ack.version, Some(version_after_first));
    assert_eq!(
        h.api.server_patrol(&h.patrol_id).unwrap().version,
        version_after_first
    );
}

#[tokio::test]
async fn rollback_restores_the_exact_pre_action_snapshot() {
    let h = harness(true).await;
    let officer_before = h.store.officer(&h.officer_id).await.unwrap();
    let patrol_before = h.store.patrol(&h.patrol_id).await.unwrap();

    h.api.fail_next(
        RemoteError::Status {
            status: 422,
            message: "deployment window closed".to_string(),
        },
        1,
    );

    let result = h
        .actions
        .handle_deploy_officer(h.officer_id, h.patrol_id)
        .await;
    assert_matches!(result, Err(DispatchError::Server { status: 422, .. }));

    assert_eq!(h.store.officer(&h.officer_id).await.unwrap(), officer_before);
    assert_eq!(h.store.patrol(&h.patrol_id).await.unwrap(), patrol_before);
    assert_eq!(h.queue.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn conflict_discards_optimistic_state_and_refreshes() {
    let h = harness(true).await;

    // The authoritative listings the refresh will pull
    let mut remote_patrol = Patrol::new("Harbor loop (rescheduled)");
    remote_patrol.version = Some(9);
    let remote_officer = Officer::new("Rivera");
    h.api.set_refresh_state(
        vec![remote_officer.clone()],
        vec![remote_patrol.clone()],
    );
    h.api.fail_next(RemoteError::Conflict, 1);

    let result = h
        .actions
        .handle_deploy_officer(h.officer_id, h.patrol_id)
        .await;
    assert_matches!(result, Err(DispatchError::Conflict { .. }));

    // The optimistic values are gone; the remote listings replaced them
    assert!(h.store.patrol(&h.patrol_id).await.is_none());
    let refreshed = h.store.patrol(&remote_patrol.id).await.unwrap();
    assert_eq!(refreshed.version, Some(9));
    assert!(h.store.officer(&remote_officer.id).await.is_some());
    assert!(h.store.last_sync().await.is_some());
}

#[tokio::test]
async fn two_rapid_deploys_make_one_remote_call_and_one_state_change() {
    let h = harness(true).await;
    *h.api.latency.lock().unwrap() = std::time::Duration::from_millis(50);

    let (first, second) = tokio::join!(
        h.actions.handle_deploy_officer(h.officer_id, h.patrol_id),
        h.actions.handle_deploy_officer(h.officer_id, h.patrol_id),
    );

    // One invocation lands, the other is rejected before mutating anything
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(DispatchError::Validation { .. })))
            .count(),
        1
    );

    assert_eq!(h.api.call_count(), 1);
    let officer = h.store.officer(&h.officer_id).await.unwrap();
    assert_eq!(officer.status, OfficerStatus::OnDuty);
    let server = h.api.server_patrol(&h.patrol_id).unwrap();
    assert_eq!(server.status, PatrolStatus::InProgress);
    assert_eq!(server.version, 2);
}

#[tokio::test]
async fn concurrent_alerts_are_deduplicated() {
    let h = harness(true).await;
    *h.api.latency.lock().unwrap() = std::time::Duration::from_millis(50);

    let (first, second) = tokio::join!(
        h.actions.handle_emergency_alert(None),
        h.actions.handle_emergency_alert(None),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(h.api.call_count(), 1);
    assert_eq!(h.store.alert_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_preserves_intent_in_the_queue() {
    let h = harness(true).await;
    // Exhaust the action retry budget with connectivity failures
    h.api.fail_next(
        RemoteError::Connection("socket reset".to_string()),
        3,
    );

    let outcome = h
        .actions
        .handle_deploy_officer(h.officer_id, h.patrol_id)
        .await
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Queued);
    assert_eq!(h.api.call_count(), 3);

    // Optimistic state stands and the queued replay later lands it
    assert_eq!(
        h.store.officer(&h.officer_id).await.unwrap().status,
        OfficerStatus::OnDuty
    );
    h.queue.flush().await.unwrap();
    assert!(h.queue.entries().await.unwrap().is_empty());
    assert_eq!(
        h.api.server_patrol(&h.patrol_id).unwrap().status,
        PatrolStatus::InProgress
    );
}

#[tokio::test]
async fn full_patrol_lifecycle_against_the_mock_server() {
    let h = harness(true).await;

    let outcome = h
        .actions
        .handle_deploy_officer(h.officer_id, h.patrol_id)
        .await
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Confirmed);

    // The ack'd version is recorded locally so the next call echoes it
    let local_version = h.store.patrol(&h.patrol_id).await.unwrap().version;
    assert_eq!(
        local_version,
        Some(h.api.server_patrol(&h.patrol_id).unwrap().version)
    );

    // Check in at the patrol's checkpoint
    let checkpoint_id = h.store.patrol(&h.patrol_id).await.unwrap().checkpoints[0].id;
    let outcome = h
        .actions
        .handle_checkpoint_check_in(h.patrol_id, checkpoint_id)
        .await
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Confirmed);
    assert_eq!(
        h.api.server_patrol(&h.patrol_id).unwrap().check_ins,
        vec![checkpoint_id]
    );

    let outcome = h.actions.handle_complete_patrol(h.patrol_id).await.unwrap();
    assert_eq!(outcome, ActionOutcome::Confirmed);
    assert_eq!(
        h.store.officer(&h.officer_id).await.unwrap().status,
        OfficerStatus::OffDuty
    );
    assert_eq!(
        h.api.server_patrol(&h.patrol_id).unwrap().status,
        PatrolStatus::Completed
    );
}

#[tokio::test]
async fn reassign_moves_the_patrol_between_officers() {
    let h = harness(true).await;
    let relief = Officer::new("Okafor");
    let relief_id = relief.id;
    h.store.insert_officer(relief).await;

    h.actions
        .handle_deploy_officer(h.officer_id, h.patrol_id)
        .await
        .unwrap();
    let outcome = h
        .actions
        .handle_reassign_officer(h.patrol_id, relief_id)
        .await
        .unwrap();
    assert_eq!(outcome, ActionOutcome::Confirmed);

    let original = h.store.officer(&h.officer_id).await.unwrap();
    let relief = h.store.officer(&relief_id).await.unwrap();
    assert_eq!(original.status, OfficerStatus::OffDuty);
    assert!(original.current_patrol.is_none());
    assert_eq!(relief.status, OfficerStatus::OnDuty);
    assert_eq!(relief.current_patrol, Some(h.patrol_id));
    assert_eq!(
        h.api.server_patrol(&h.patrol_id).unwrap().assigned_officer,
        Some(relief_id)
    );
}
