//! # Dispatch Engine
//!
//! Wires the store, executor, queue, sync service, and reconciler into one
//! object UI collaborators can hold. Construction injects the three
//! runtime-provided seams: the remote API, the durable storage surface,
//! and the connectivity monitor.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::actions::{ActionOutcome, DispatchActions};
use crate::config::Config;
use crate::error::DispatchError;
use crate::model::{CheckpointId, OfficerId, OfficerStatus, PatrolId};
use crate::net::ConnectivityMonitor;
use crate::offline::queue::{OfflineQueue, QueuedOperation};
use crate::offline::reconcile::Reconciler;
use crate::remote::PatrolApi;
use crate::storage::StorageAdapter;
use crate::store::DispatchStore;
use crate::sync::SyncService;

/// The assembled offline-first dispatch core
pub struct DispatchEngine {
    store: Arc<DispatchStore>,
    actions: DispatchActions,
    sync: SyncService,
    reconciler: Reconciler,
}

impl DispatchEngine {
    /// Assemble the engine around the injected runtime seams
    pub fn new(
        api: Arc<dyn PatrolApi>,
        storage: Arc<dyn StorageAdapter>,
        monitor: Arc<ConnectivityMonitor>,
        config: Config,
    ) -> Self {
        let store = Arc::new(DispatchStore::new());
        let queue = Arc::new(OfflineQueue::new(
            storage,
            Arc::clone(&api),
            Arc::clone(&store),
            Arc::clone(&monitor),
            config.queue_backoff,
        ));
        let actions = DispatchActions::new(
            Arc::clone(&store),
            api,
            Arc::clone(&queue),
            Arc::clone(&monitor),
            config.clone(),
        );
        let sync = SyncService::new(
            Arc::clone(&store),
            queue,
            Arc::clone(&monitor),
            config.clone(),
        );
        let reconciler = Reconciler::new(Arc::clone(&store), config.reconcile_debounce);

        Self {
            store,
            actions,
            sync,
            reconciler,
        }
    }

    /// Start the background sync loop and the reconciliation sweep
    pub fn start(&mut self) -> Result<(), DispatchError> {
        self.sync.start()?;
        self.reconciler.start();
        Ok(())
    }

    /// Stop the background tasks
    pub fn stop(&mut self) {
        self.sync.stop();
        self.reconciler.stop();
    }

    /// The shared state the engine operates on
    pub fn store(&self) -> &Arc<DispatchStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Action surface
    // -----------------------------------------------------------------------

    pub async fn handle_deploy_officer(
        &self,
        officer_id: OfficerId,
        patrol_id: PatrolId,
    ) -> Result<ActionOutcome, DispatchError> {
        self.actions
            .handle_deploy_officer(officer_id, patrol_id)
            .await
    }

    pub async fn handle_complete_patrol(
        &self,
        patrol_id: PatrolId,
    ) -> Result<ActionOutcome, DispatchError> {
        self.actions.handle_complete_patrol(patrol_id).await
    }

    pub async fn handle_reassign_officer(
        &self,
        patrol_id: PatrolId,
        officer_id: OfficerId,
    ) -> Result<ActionOutcome, DispatchError> {
        self.actions
            .handle_reassign_officer(patrol_id, officer_id)
            .await
    }

    pub async fn handle_cancel_patrol(
        &self,
        patrol_id: PatrolId,
    ) -> Result<ActionOutcome, DispatchError> {
        self.actions.handle_cancel_patrol(patrol_id).await
    }

    pub async fn handle_emergency_alert(
        &self,
        officer_id: Option<OfficerId>,
    ) -> Result<ActionOutcome, DispatchError> {
        self.actions.handle_emergency_alert(officer_id).await
    }

    pub async fn handle_checkpoint_check_in(
        &self,
        patrol_id: PatrolId,
        checkpoint_id: CheckpointId,
    ) -> Result<ActionOutcome, DispatchError> {
        self.actions
            .handle_checkpoint_check_in(patrol_id, checkpoint_id)
            .await
    }

    pub async fn handle_set_presence(
        &self,
        officer_id: OfficerId,
        status: OfficerStatus,
    ) -> Result<(), DispatchError> {
        self.actions.handle_set_presence(officer_id, status).await
    }

    // -----------------------------------------------------------------------
    // Queue introspection surface
    // -----------------------------------------------------------------------

    pub async fn pending_count(&self) -> Result<usize, DispatchError> {
        self.sync.pending_count().await
    }

    pub async fn failed_count(&self) -> Result<usize, DispatchError> {
        self.sync.failed_count().await
    }

    pub async fn retry_failed(&self) -> Result<usize, DispatchError> {
        self.sync.retry_failed().await
    }

    pub async fn remove_queued_check_in(&self, id: Uuid) -> Result<bool, DispatchError> {
        self.sync.remove_queued_check_in(id).await
    }

    pub async fn queued_operations(&self) -> Result<Vec<QueuedOperation>, DispatchError> {
        self.sync.queue_entries().await
    }

    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.sync.last_sync().await
    }
}
