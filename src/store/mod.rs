//! # Dispatch Store
//!
//! Central shared state for the officer and patrol collections. Every
//! component receives an `Arc<DispatchStore>` and mutates it only through
//! the typed operations below; there is no ambient global state.
//!
//! ## Features
//!
//! - **Typed Mutations**: Compound transitions applied under one lock
//! - **Change Signal**: A revision counter observers can subscribe to
//! - **Snapshots**: Exact entity copies for optimistic rollback
//! - **Refresh**: Wholesale collection replacement after a conflict
//!
//! ## Usage
//!
//! ```rust,no_run
//! use patrolsync::store::DispatchStore;
//! use patrolsync::model::{Officer, Patrol};
//!
//! # async fn example() {
//! let store = DispatchStore::new();
//! let officer = Officer::new("Rivera");
//! let patrol = Patrol::new("Harbor loop");
//! let (officer_id, patrol_id) = (officer.id, patrol.id);
//! store.insert_officer(officer).await;
//! store.insert_patrol(patrol).await;
//!
//! // Deploy applies both sides of the link atomically
//! store.apply_deploy(&officer_id, &patrol_id).await;
//! # }
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, RwLock};

use crate::model::{
    Checkpoint, CheckpointId, Officer, OfficerId, OfficerStatus, Patrol, PatrolId, PatrolStatus,
    SyncStatus,
};

/// Shared officer/patrol state with typed mutations
#[derive(Debug)]
pub struct DispatchStore {
    inner: RwLock<StoreInner>,
    /// Bumped after every effective mutation
    revision: watch::Sender<u64>,
}

#[derive(Debug, Default)]
struct StoreInner {
    officers: HashMap<OfficerId, Officer>,
    patrols: HashMap<PatrolId, Patrol>,
    alert_count: u64,
    last_sync: Option<DateTime<Utc>>,
}

impl DispatchStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: RwLock::new(StoreInner::default()),
            revision,
        }
    }

    /// Subscribe to the change signal. The receiver yields the current
    /// revision and wakes whenever an effective mutation lands.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn notify(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Clone an officer by id
    pub async fn officer(&self, id: &OfficerId) -> Option<Officer> {
        self.inner.read().await.officers.get(id).cloned()
    }

    /// Clone a patrol by id
    pub async fn patrol(&self, id: &PatrolId) -> Option<Patrol> {
        self.inner.read().await.patrols.get(id).cloned()
    }

    /// Clone the full officer collection
    pub async fn officers(&self) -> Vec<Officer> {
        self.inner.read().await.officers.values().cloned().collect()
    }

    /// Clone the full patrol collection
    pub async fn patrols(&self) -> Vec<Patrol> {
        self.inner.read().await.patrols.values().cloned().collect()
    }

    /// Number of emergency alerts raised this session
    pub async fn alert_count(&self) -> u64 {
        self.inner.read().await.alert_count
    }

    /// Timestamp of the last confirmed sync with the remote store
    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_sync
    }

    // -----------------------------------------------------------------------
    // Seeding and refresh
    // -----------------------------------------------------------------------

    /// Insert or overwrite an officer
    pub async fn insert_officer(&self, officer: Officer) {
        self.inner.write().await.officers.insert(officer.id, officer);
        self.notify();
    }

    /// Insert or overwrite a patrol
    pub async fn insert_patrol(&self, patrol: Patrol) {
        self.inner.write().await.patrols.insert(patrol.id, patrol);
        self.notify();
    }

    /// Replace both collections wholesale. Used when the remote store is
    /// taken as authoritative after a version conflict.
    pub async fn replace_collections(&self, officers: Vec<Officer>, patrols: Vec<Patrol>) {
        let mut inner = self.inner.write().await;
        inner.officers = officers.into_iter().map(|o| (o.id, o)).collect();
        inner.patrols = patrols.into_iter().map(|p| (p.id, p)).collect();
        drop(inner);
        self.notify();
    }

    /// Record a confirmed sync
    pub async fn set_last_sync(&self, at: DateTime<Utc>) {
        self.inner.write().await.last_sync = Some(at);
        self.notify();
    }

    // -----------------------------------------------------------------------
    // Optimistic transitions
    // -----------------------------------------------------------------------

    /// Put an officer on duty working a patrol, and the patrol in progress
    /// assigned to that officer, in one mutation.
    pub async fn apply_deploy(&self, officer_id: &OfficerId, patrol_id: &PatrolId) {
        let mut inner = self.inner.write().await;
        if let Some(officer) = inner.officers.get_mut(officer_id) {
            officer.status = OfficerStatus::OnDuty;
            officer.current_patrol = Some(*patrol_id);
        }
        if let Some(patrol) = inner.patrols.get_mut(patrol_id) {
            patrol.status = PatrolStatus::InProgress;
            patrol.assigned_officer = Some(*officer_id);
        }
        drop(inner);
        self.notify();
    }

    /// Move a patrol to a terminal status and release its officer.
    pub async fn apply_close(&self, patrol_id: &PatrolId, status: PatrolStatus) {
        let mut inner = self.inner.write().await;
        let released = inner.patrols.get_mut(patrol_id).and_then(|patrol| {
            patrol.status = status;
            patrol.assigned_officer.take()
        });
        if let Some(officer_id) = released {
            if let Some(officer) = inner.officers.get_mut(&officer_id) {
                officer.status = OfficerStatus::OffDuty;
                officer.current_patrol = None;
            }
        }
        drop(inner);
        self.notify();
    }

    /// Hand a patrol from one officer to another in one mutation.
    pub async fn apply_reassign(
        &self,
        patrol_id: &PatrolId,
        from: Option<OfficerId>,
        to: &OfficerId,
    ) {
        let mut inner = self.inner.write().await;
        if let Some(officer_id) = from {
            if let Some(officer) = inner.officers.get_mut(&officer_id) {
                officer.status = OfficerStatus::OffDuty;
                officer.current_patrol = None;
            }
        }
        if let Some(officer) = inner.officers.get_mut(to) {
            officer.status = OfficerStatus::OnDuty;
            officer.current_patrol = Some(*patrol_id);
        }
        if let Some(patrol) = inner.patrols.get_mut(patrol_id) {
            patrol.assigned_officer = Some(*to);
        }
        drop(inner);
        self.notify();
    }

    /// Manual presence change; leaves the patrol link untouched
    pub async fn set_officer_status(&self, officer_id: &OfficerId, status: OfficerStatus) {
        let mut inner = self.inner.write().await;
        let changed = match inner.officers.get_mut(officer_id) {
            Some(officer) if officer.status != status => {
                officer.status = status;
                true
            }
            _ => false,
        };
        drop(inner);
        if changed {
            self.notify();
        }
    }

    /// Record the version the remote store reported for a patrol
    pub async fn set_patrol_version(&self, patrol_id: &PatrolId, version: Option<i64>) {
        let mut inner = self.inner.write().await;
        let changed = match inner.patrols.get_mut(patrol_id) {
            Some(patrol) if patrol.version != version => {
                patrol.version = version;
                true
            }
            _ => false,
        };
        drop(inner);
        if changed {
            self.notify();
        }
    }

    /// Mark a checkpoint's local completion and sync status
    pub async fn set_checkpoint_state(
        &self,
        patrol_id: &PatrolId,
        checkpoint_id: &CheckpointId,
        completed_at: Option<DateTime<Utc>>,
        sync_status: Option<SyncStatus>,
    ) {
        let mut inner = self.inner.write().await;
        if let Some(patrol) = inner.patrols.get_mut(patrol_id) {
            if let Some(checkpoint) = patrol
                .checkpoints
                .iter_mut()
                .find(|c| c.id == *checkpoint_id)
            {
                checkpoint.completed_at = completed_at;
                checkpoint.sync_status = sync_status;
            }
        }
        drop(inner);
        self.notify();
    }

    /// Clone a checkpoint by id
    pub async fn checkpoint(
        &self,
        patrol_id: &PatrolId,
        checkpoint_id: &CheckpointId,
    ) -> Option<Checkpoint> {
        self.inner
            .read()
            .await
            .patrols
            .get(patrol_id)
            .and_then(|p| p.checkpoint(checkpoint_id).cloned())
    }

    /// Increment the emergency alert counter
    pub async fn increment_alerts(&self) {
        self.inner.write().await.alert_count += 1;
        self.notify();
    }

    /// Undo one optimistic alert increment
    pub async fn decrement_alerts(&self) {
        let mut inner = self.inner.write().await;
        inner.alert_count = inner.alert_count.saturating_sub(1);
        drop(inner);
        self.notify();
    }

    // -----------------------------------------------------------------------
    // Rollback and corrective mutations
    // -----------------------------------------------------------------------

    /// Restore an officer to a previously captured snapshot
    pub async fn restore_officer(&self, snapshot: Officer) {
        self.inner
            .write()
            .await
            .officers
            .insert(snapshot.id, snapshot);
        self.notify();
    }

    /// Restore a patrol to a previously captured snapshot
    pub async fn restore_patrol(&self, snapshot: Patrol) {
        self.inner
            .write()
            .await
            .patrols
            .insert(snapshot.id, snapshot);
        self.notify();
    }

    /// Corrective: force an officer off duty with no patrol reference.
    /// Returns false when the officer was already in that state.
    pub async fn force_off_duty(&self, officer_id: &OfficerId) -> bool {
        let mut inner = self.inner.write().await;
        let changed = match inner.officers.get_mut(officer_id) {
            Some(officer)
                if officer.status != OfficerStatus::OffDuty
                    || officer.current_patrol.is_some() =>
            {
                officer.status = OfficerStatus::OffDuty;
                officer.current_patrol = None;
                true
            }
            _ => false,
        };
        drop(inner);
        if changed {
            self.notify();
        }
        changed
    }

    /// Corrective: force an officer on duty working the given patrol.
    /// Returns false when the officer was already in that state.
    pub async fn force_on_duty(&self, officer_id: &OfficerId, patrol_id: &PatrolId) -> bool {
        let mut inner = self.inner.write().await;
        let changed = match inner.officers.get_mut(officer_id) {
            Some(officer)
                if officer.status != OfficerStatus::OnDuty
                    || officer.current_patrol != Some(*patrol_id) =>
            {
                officer.status = OfficerStatus::OnDuty;
                officer.current_patrol = Some(*patrol_id);
                true
            }
            _ => false,
        };
        drop(inner);
        if changed {
            self.notify();
        }
        changed
    }
}

impl Default for DispatchStore {
    fn default() -> Self {
        Self::new()
    }
}
