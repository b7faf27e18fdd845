//! # Optimistic Action Executor
//!
//! One operation per dispatch transition: deploy, complete, reassign,
//! cancel, emergency alert, and checkpoint check-in. Every mutating action
//! follows the same protocol:
//!
//! 1. **Precondition check** - pure and local; illegal transitions fail
//!    with a validation error before anything is touched
//! 2. **Dedup check** - rejects a logical action already in flight
//! 3. **Snapshot** - exact prior values of every entity the update touches
//! 4. **Optimistic apply** - local state reflects the intended end state
//!    before any network round-trip
//! 5. **Offline short-circuit** - with no connectivity the operation goes
//!    straight to the durable queue and the optimistic state stands
//! 6. **Remote call** - through the backoff retrier, 4xx non-retryable
//! 7. **Reconcile the outcome** - commit on success; enqueue on a
//!    connectivity failure; full refresh on a version conflict; roll back
//!    to the snapshot on anything else
//!
//! The outcome distinguishes "confirmed" from "queued for sync" so callers
//! can tell the user which of the two happened; a rolled-back action
//! surfaces as an error.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::error::DispatchError;
use crate::model::{
    CheckpointId, Officer, OfficerId, OfficerStatus, Patrol, PatrolId, PatrolStatus, SyncStatus,
};
use crate::net::ConnectivityMonitor;
use crate::offline::dedup::DedupCache;
use crate::offline::queue::{OfflineQueue, OperationKind};
use crate::offline::retry::retry;
use crate::remote::{
    AlertRequest, CancelRequest, CheckInRequest, CompleteRequest, DeployRequest, MutationAck,
    PatrolApi, ReassignRequest, RemoteError,
};
use crate::store::DispatchStore;

/// How a successful action ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The remote store confirmed the mutation
    Confirmed,
    /// The mutation is queued for sync; the optimistic state stands
    Queued,
}

impl ActionOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, ActionOutcome::Queued)
    }
}

/// Prior values of every entity an optimistic update touches
#[derive(Debug, Default)]
struct Snapshot {
    officers: Vec<Officer>,
    patrol: Option<Patrol>,
}

/// The optimistic action executor
pub struct DispatchActions {
    store: Arc<DispatchStore>,
    api: Arc<dyn PatrolApi>,
    queue: Arc<OfflineQueue>,
    monitor: Arc<ConnectivityMonitor>,
    dedup: DedupCache,
    config: Config,
}

impl DispatchActions {
    pub fn new(
        store: Arc<DispatchStore>,
        api: Arc<dyn PatrolApi>,
        queue: Arc<OfflineQueue>,
        monitor: Arc<ConnectivityMonitor>,
        config: Config,
    ) -> Self {
        Self {
            store,
            api,
            queue,
            monitor,
            dedup: DedupCache::new(),
            config,
        }
    }

    /// In-flight request count, for diagnostics
    pub async fn in_flight(&self) -> usize {
        self.dedup.len().await
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Deploy an off-duty officer onto a scheduled patrol
    pub async fn handle_deploy_officer(
        &self,
        officer_id: OfficerId,
        patrol_id: PatrolId,
    ) -> Result<ActionOutcome, DispatchError> {
        let officer = self
            .store
            .officer(&officer_id)
            .await
            .ok_or_else(|| DispatchError::validation("unknown officer"))?;
        let patrol = self
            .store
            .patrol(&patrol_id)
            .await
            .ok_or_else(|| DispatchError::validation("unknown patrol"))?;
        if officer.status != OfficerStatus::OffDuty {
            return Err(DispatchError::validation(
                "officer must be off duty to deploy",
            ));
        }
        if patrol.status != PatrolStatus::Scheduled {
            return Err(DispatchError::validation(
                "patrol must be scheduled to deploy",
            ));
        }

        let key = format!("deploy_officer-{}-{}", patrol_id, officer_id);
        self.guard(&key).await?;

        let snapshot = Snapshot {
            officers: vec![officer],
            patrol: Some(patrol.clone()),
        };
        self.store.apply_deploy(&officer_id, &patrol_id).await;

        let request = DeployRequest {
            patrol_id,
            officer_id,
            version: patrol.version,
            request_id: Uuid::new_v4(),
        };
        let fallback = OperationKind::Deploy {
            patrol_id,
            officer_id,
            version: patrol.version,
            request_id: request.request_id,
        };
        let api = Arc::clone(&self.api);
        self.finish(&key, snapshot, fallback, move || {
            let api = Arc::clone(&api);
            let request = request.clone();
            async move { api.deploy_patrol(&request).await }
        })
        .await
    }

    /// Complete an in-progress patrol and release its officer
    pub async fn handle_complete_patrol(
        &self,
        patrol_id: PatrolId,
    ) -> Result<ActionOutcome, DispatchError> {
        let patrol = self
            .store
            .patrol(&patrol_id)
            .await
            .ok_or_else(|| DispatchError::validation("unknown patrol"))?;
        if patrol.status != PatrolStatus::InProgress {
            return Err(DispatchError::validation(
                "only an in-progress patrol can be completed",
            ));
        }

        let key = format!("complete_patrol-{}", patrol_id);
        self.guard(&key).await?;

        let snapshot = Snapshot {
            officers: self.assigned_officer_snapshot(&patrol).await,
            patrol: Some(patrol.clone()),
        };
        self.store
            .apply_close(&patrol_id, PatrolStatus::Completed)
            .await;

        let request = CompleteRequest {
            patrol_id,
            version: patrol.version,
            request_id: Uuid::new_v4(),
        };
        let fallback = OperationKind::Complete {
            patrol_id,
            version: patrol.version,
            request_id: request.request_id,
        };
        let api = Arc::clone(&self.api);
        self.finish(&key, snapshot, fallback, move || {
            let api = Arc::clone(&api);
            let request = request.clone();
            async move { api.complete_patrol(&request).await }
        })
        .await
    }

    /// Hand an in-progress patrol to a different off-duty officer
    pub async fn handle_reassign_officer(
        &self,
        patrol_id: PatrolId,
        officer_id: OfficerId,
    ) -> Result<ActionOutcome, DispatchError> {
        let patrol = self
            .store
            .patrol(&patrol_id)
            .await
            .ok_or_else(|| DispatchError::validation("unknown patrol"))?;
        if patrol.status != PatrolStatus::InProgress {
            return Err(DispatchError::validation(
                "only an in-progress patrol can be reassigned",
            ));
        }
        if patrol.assigned_officer == Some(officer_id) {
            return Err(DispatchError::validation(
                "officer already assigned to this patrol",
            ));
        }
        let officer = self
            .store
            .officer(&officer_id)
            .await
            .ok_or_else(|| DispatchError::validation("unknown officer"))?;
        if officer.status != OfficerStatus::OffDuty {
            return Err(DispatchError::validation(
                "officer must be off duty to take over a patrol",
            ));
        }

        let key = format!("reassign_officer-{}-{}", patrol_id, officer_id);
        self.guard(&key).await?;

        let mut officers = vec![officer];
        officers.extend(self.assigned_officer_snapshot(&patrol).await);
        let snapshot = Snapshot {
            officers,
            patrol: Some(patrol.clone()),
        };
        self.store
            .apply_reassign(&patrol_id, patrol.assigned_officer, &officer_id)
            .await;

        let request = ReassignRequest {
            patrol_id,
            officer_id,
            version: patrol.version,
            request_id: Uuid::new_v4(),
        };
        let fallback = OperationKind::Reassign {
            patrol_id,
            officer_id,
            version: patrol.version,
            request_id: request.request_id,
        };
        let api = Arc::clone(&self.api);
        self.finish(&key, snapshot, fallback, move || {
            let api = Arc::clone(&api);
            let request = request.clone();
            async move { api.reassign_patrol(&request).await }
        })
        .await
    }

    /// Cancel a patrol that has not yet reached a terminal status
    pub async fn handle_cancel_patrol(
        &self,
        patrol_id: PatrolId,
    ) -> Result<ActionOutcome, DispatchError> {
        let patrol = self
            .store
            .patrol(&patrol_id)
            .await
            .ok_or_else(|| DispatchError::validation("unknown patrol"))?;
        if patrol.status.is_terminal() {
            return Err(DispatchError::validation(
                "patrol has already reached a terminal status",
            ));
        }

        let key = format!("cancel_patrol-{}", patrol_id);
        self.guard(&key).await?;

        let snapshot = Snapshot {
            officers: self.assigned_officer_snapshot(&patrol).await,
            patrol: Some(patrol.clone()),
        };
        self.store
            .apply_close(&patrol_id, PatrolStatus::Cancelled)
            .await;

        let request = CancelRequest {
            patrol_id,
            version: patrol.version,
            request_id: Uuid::new_v4(),
        };
        let fallback = OperationKind::Cancel {
            patrol_id,
            version: patrol.version,
            request_id: request.request_id,
        };
        let api = Arc::clone(&self.api);
        self.finish(&key, snapshot, fallback, move || {
            let api = Arc::clone(&api);
            let request = request.clone();
            async move { api.cancel_patrol(&request).await }
        })
        .await
    }

    /// Raise an emergency alert. Fire-and-forget: no entity state machine,
    /// an optimistic counter increment, and a higher retry budget because
    /// criticality outweighs latency. Never queued - an alert that cannot
    /// be delivered is surfaced, not deferred.
    pub async fn handle_emergency_alert(
        &self,
        officer_id: Option<OfficerId>,
    ) -> Result<ActionOutcome, DispatchError> {
        if let Some(id) = officer_id {
            if self.store.officer(&id).await.is_none() {
                return Err(DispatchError::validation("unknown officer"));
            }
        }

        let key = match officer_id {
            Some(id) => format!("emergency_alert-{}", id),
            None => "emergency_alert-dispatch".to_string(),
        };
        self.guard(&key).await?;

        self.store.increment_alerts().await;

        if !self.monitor.is_online() {
            self.store.decrement_alerts().await;
            self.dedup.clear(&key).await;
            return Err(DispatchError::network("offline, alert not delivered"));
        }

        let request = AlertRequest {
            officer_id,
            request_id: Uuid::new_v4(),
        };
        let api = Arc::clone(&self.api);
        let result = retry(
            self.config.alert_retry,
            move || {
                let api = Arc::clone(&api);
                let request = request.clone();
                async move { api.raise_alert(&request).await }
            },
            RemoteError::is_retryable,
        )
        .await;

        self.dedup.clear(&key).await;
        match result {
            Ok(_) => Ok(ActionOutcome::Confirmed),
            Err(error) => {
                self.store.decrement_alerts().await;
                tracing::error!(error = %error, "emergency alert failed after retries");
                Err(map_remote_error(error))
            }
        }
    }

    /// Check in at a checkpoint of an in-progress patrol. The checkpoint's
    /// tri-state sync indicator distinguishes locally-marked from
    /// server-confirmed.
    pub async fn handle_checkpoint_check_in(
        &self,
        patrol_id: PatrolId,
        checkpoint_id: CheckpointId,
    ) -> Result<ActionOutcome, DispatchError> {
        let patrol = self
            .store
            .patrol(&patrol_id)
            .await
            .ok_or_else(|| DispatchError::validation("unknown patrol"))?;
        if patrol.status != PatrolStatus::InProgress {
            return Err(DispatchError::validation(
                "check-ins require an in-progress patrol",
            ));
        }
        let checkpoint = patrol
            .checkpoint(&checkpoint_id)
            .ok_or_else(|| DispatchError::validation("unknown checkpoint"))?;
        if checkpoint.is_completed() {
            return Err(DispatchError::validation("checkpoint already checked in"));
        }

        let key = format!("check_in-{}-{}", patrol_id, checkpoint_id);
        self.guard(&key).await?;

        let snapshot = Snapshot {
            officers: Vec::new(),
            patrol: Some(patrol.clone()),
        };
        let completed_at = Utc::now();
        self.store
            .set_checkpoint_state(
                &patrol_id,
                &checkpoint_id,
                Some(completed_at),
                Some(SyncStatus::Pending),
            )
            .await;

        let request = CheckInRequest {
            patrol_id,
            checkpoint_id,
            completed_at,
            request_id: Uuid::new_v4(),
            device_id: self.config.device_id().map(str::to_string),
        };
        let fallback = OperationKind::CheckIn {
            patrol_id,
            checkpoint_id,
            completed_at,
            request_id: request.request_id,
            device_id: request.device_id.clone(),
        };
        let api = Arc::clone(&self.api);
        let outcome = self
            .finish(&key, snapshot, fallback, move || {
                let api = Arc::clone(&api);
                let request = request.clone();
                async move { api.submit_check_in(&request).await }
            })
            .await?;

        if outcome == ActionOutcome::Confirmed {
            self.store
                .set_checkpoint_state(
                    &patrol_id,
                    &checkpoint_id,
                    Some(completed_at),
                    Some(SyncStatus::Synced),
                )
                .await;
        }
        Ok(outcome)
    }

    /// Manual presence change. Break and unavailable are operator-set only;
    /// on- and off-duty are otherwise driven by deployment, so they are
    /// accepted here only when they agree with the officer's patrol link.
    /// Local-only: presence never round-trips to the remote store.
    pub async fn handle_set_presence(
        &self,
        officer_id: OfficerId,
        status: OfficerStatus,
    ) -> Result<(), DispatchError> {
        let officer = self
            .store
            .officer(&officer_id)
            .await
            .ok_or_else(|| DispatchError::validation("unknown officer"))?;

        let legal = match status {
            OfficerStatus::Break | OfficerStatus::Unavailable => true,
            OfficerStatus::OnDuty => officer.current_patrol.is_some(),
            OfficerStatus::OffDuty => officer.current_patrol.is_none(),
        };
        if !legal {
            return Err(DispatchError::validation(
                "presence change disagrees with the officer's patrol assignment",
            ));
        }

        self.store.set_officer_status(&officer_id, status).await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Protocol internals
    // -----------------------------------------------------------------------

    /// Dedup check + record, done after the preconditions pass. Every path
    /// out of the action afterwards must clear the key.
    async fn guard(&self, key: &str) -> Result<(), DispatchError> {
        if self.dedup.is_duplicate(key).await {
            return Err(DispatchError::validation(
                "an identical request is already in flight",
            ));
        }
        self.dedup.record(key).await;
        Ok(())
    }

    async fn assigned_officer_snapshot(&self, patrol: &Patrol) -> Vec<Officer> {
        match patrol.assigned_officer {
            Some(id) => self.store.officer(&id).await.into_iter().collect(),
            None => Vec::new(),
        }
    }

    /// Steps 5-8 of the protocol, shared by every entity operation.
    async fn finish<F, Fut>(
        &self,
        key: &str,
        snapshot: Snapshot,
        fallback: OperationKind,
        call: F,
    ) -> Result<ActionOutcome, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<MutationAck, RemoteError>>,
    {
        // Offline short-circuit: the queue takes ownership of the intent
        // and the optimistic state stands until replay settles it.
        if !self.monitor.is_online() {
            self.queue.enqueue(fallback).await?;
            self.dedup.clear(key).await;
            return Ok(ActionOutcome::Queued);
        }

        let result = retry(self.config.action_retry, call, RemoteError::is_retryable).await;
        match result {
            Ok(ack) => {
                if ack.version.is_some() {
                    self.store
                        .set_patrol_version(&fallback.patrol_id(), ack.version)
                        .await;
                }
                self.dedup.clear(key).await;
                Ok(ActionOutcome::Confirmed)
            }
            Err(error) if error.is_connectivity() => {
                // The intent is preserved for replay, not rolled back
                self.queue.enqueue(fallback).await?;
                self.dedup.clear(key).await;
                Ok(ActionOutcome::Queued)
            }
            Err(error) if error.is_conflict() => {
                // The remote store is authoritative on conflict; no merging
                tracing::info!(
                    kind = fallback.kind_name(),
                    patrol = %fallback.patrol_id(),
                    "version conflict, refreshing from remote"
                );
                self.refresh().await;
                self.dedup.clear(key).await;
                Err(DispatchError::conflict("patrol"))
            }
            Err(error) => {
                self.rollback(snapshot).await;
                self.dedup.clear(key).await;
                Err(map_remote_error(error))
            }
        }
    }

    async fn rollback(&self, snapshot: Snapshot) {
        for officer in snapshot.officers {
            self.store.restore_officer(officer).await;
        }
        if let Some(patrol) = snapshot.patrol {
            self.store.restore_patrol(patrol).await;
        }
    }

    /// Replace the local collections with the remote listings. Called when
    /// a version conflict proves the optimistic assumption wrong.
    async fn refresh(&self) {
        let officers = match self.api.fetch_officers().await {
            Ok(officers) => officers,
            Err(error) => {
                tracing::warn!(error = %error, "conflict refresh failed to fetch officers");
                return;
            }
        };
        let patrols = match self.api.fetch_patrols().await {
            Ok(patrols) => patrols,
            Err(error) => {
                tracing::warn!(error = %error, "conflict refresh failed to fetch patrols");
                return;
            }
        };
        self.store.replace_collections(officers, patrols).await;
        self.store.set_last_sync(Utc::now()).await;
    }
}

fn map_remote_error(error: RemoteError) -> DispatchError {
    match error {
        RemoteError::Connection(message) => DispatchError::network(message),
        RemoteError::Conflict => DispatchError::conflict("patrol"),
        RemoteError::Status { status, message } => DispatchError::server(status, message),
    }
}
