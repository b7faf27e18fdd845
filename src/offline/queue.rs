//! # Durable Offline Queue
//!
//! Persists mutations that could not reach the remote store and replays
//! them with bounded, idempotent retries once connectivity returns.
//!
//! ## Features
//!
//! - **Durable Entries**: The queue lives in storage and survives restarts
//! - **Idempotent Replay**: Each entry's `request_id` is resent unchanged,
//!   so at-least-once delivery applies at most once remotely
//! - **Per-Entry Backoff**: `min(base_delay * 2^retry_count, max_delay)`
//!   between attempts, 5 attempts before an entry is parked as failed
//! - **Manual Retry**: Failed entries stay visible until `retry_failed`
//! - **Check-In Tri-State**: Queued check-ins drive the checkpoint's
//!   pending/synced/failed indicator and support a user-visible undo
//!
//! Storage discipline: the persisted list is re-read immediately before
//! every write, so overlapping enqueue and flush calls never clobber each
//! other's entries.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use crate::config::RetrySettings;
use crate::error::DispatchError;
use crate::model::{CheckpointId, OfficerId, PatrolId, SyncStatus};
use crate::net::ConnectivityMonitor;
use crate::offline::retry::backoff_delay;
use crate::remote::{
    AlertRequest, CancelRequest, CheckInRequest, CompleteRequest, DeployRequest, MutationAck,
    PatrolApi, ReassignRequest, RemoteError,
};
use crate::storage::StorageAdapter;
use crate::store::DispatchStore;

/// Storage key holding the persisted queue
const STORAGE_KEY: &str = "patrolsync.offline_queue";

/// A queueable mutation, tagged by kind. Each variant carries only its
/// required fields plus the idempotency `request_id` resent on every
/// replay attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationKind {
    Deploy {
        patrol_id: PatrolId,
        officer_id: OfficerId,
        version: Option<i64>,
        request_id: Uuid,
    },
    Complete {
        patrol_id: PatrolId,
        version: Option<i64>,
        request_id: Uuid,
    },
    Reassign {
        patrol_id: PatrolId,
        officer_id: OfficerId,
        version: Option<i64>,
        request_id: Uuid,
    },
    Cancel {
        patrol_id: PatrolId,
        version: Option<i64>,
        request_id: Uuid,
    },
    CheckIn {
        patrol_id: PatrolId,
        checkpoint_id: CheckpointId,
        completed_at: DateTime<Utc>,
        request_id: Uuid,
        device_id: Option<String>,
    },
}

impl OperationKind {
    /// The idempotency key for this operation
    pub fn request_id(&self) -> Uuid {
        match self {
            OperationKind::Deploy { request_id, .. }
            | OperationKind::Complete { request_id, .. }
            | OperationKind::Reassign { request_id, .. }
            | OperationKind::Cancel { request_id, .. }
            | OperationKind::CheckIn { request_id, .. } => *request_id,
        }
    }

    /// Patrol this operation targets
    pub fn patrol_id(&self) -> PatrolId {
        match self {
            OperationKind::Deploy { patrol_id, .. }
            | OperationKind::Complete { patrol_id, .. }
            | OperationKind::Reassign { patrol_id, .. }
            | OperationKind::Cancel { patrol_id, .. }
            | OperationKind::CheckIn { patrol_id, .. } => *patrol_id,
        }
    }

    /// Stable name for logs
    pub fn kind_name(&self) -> &'static str {
        match self {
            OperationKind::Deploy { .. } => "deploy",
            OperationKind::Complete { .. } => "complete",
            OperationKind::Reassign { .. } => "reassign",
            OperationKind::Cancel { .. } => "cancel",
            OperationKind::CheckIn { .. } => "check_in",
        }
    }
}

/// A persisted queue entry with replay metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub id: Uuid,
    pub op: OperationKind,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
    pub last_error: Option<String>,
}

impl QueuedOperation {
    fn new(op: OperationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            op,
            enqueued_at: Utc::now(),
            retry_count: 0,
            last_attempt: None,
            sync_status: SyncStatus::Pending,
            last_error: None,
        }
    }
}

/// Outcome of one flush pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Entries whose replay was attempted
    pub attempted: usize,
    /// Entries confirmed and removed
    pub synced: usize,
    /// Entries newly parked as failed
    pub exhausted: usize,
}

/// Durable offline operation queue
pub struct OfflineQueue {
    storage: Arc<dyn StorageAdapter>,
    api: Arc<dyn PatrolApi>,
    store: Arc<DispatchStore>,
    monitor: Arc<ConnectivityMonitor>,
    backoff: RetrySettings,
    /// Serializes flush passes; enqueue does not take this lock
    flush_lock: Mutex<()>,
    /// Woken on enqueue so the sync service can flush promptly
    kick: Notify,
}

impl OfflineQueue {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        api: Arc<dyn PatrolApi>,
        store: Arc<DispatchStore>,
        monitor: Arc<ConnectivityMonitor>,
        backoff: RetrySettings,
    ) -> Self {
        Self {
            storage,
            api,
            store,
            monitor,
            backoff,
            flush_lock: Mutex::new(()),
            kick: Notify::new(),
        }
    }

    /// Wait until something is enqueued. Used by the sync service as one of
    /// its flush triggers.
    pub async fn kicked(&self) {
        self.kick.notified().await;
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    async fn load(&self) -> Result<Vec<QueuedOperation>, DispatchError> {
        match self.storage.get(STORAGE_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, entries: &[QueuedOperation]) -> Result<(), DispatchError> {
        let raw = serde_json::to_string(entries)?;
        self.storage.set(STORAGE_KEY, &raw).await
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Persist an operation for later replay. Returns the queue entry id.
    pub async fn enqueue(&self, op: OperationKind) -> Result<Uuid, DispatchError> {
        let entry = QueuedOperation::new(op);
        let id = entry.id;

        // Re-read right before writing so a concurrent enqueue is kept
        let mut entries = self.load().await?;
        tracing::info!(
            kind = entry.op.kind_name(),
            entry = %id,
            queued = entries.len() + 1,
            "operation queued for sync"
        );
        entries.push(entry);
        self.save(&entries).await?;

        self.kick.notify_one();
        Ok(id)
    }

    /// All persisted entries, for badges and queue inspection
    pub async fn entries(&self) -> Result<Vec<QueuedOperation>, DispatchError> {
        self.load().await
    }

    /// Entries still awaiting confirmation
    pub async fn pending_count(&self) -> Result<usize, DispatchError> {
        Ok(self
            .load()
            .await?
            .iter()
            .filter(|e| e.sync_status == SyncStatus::Pending)
            .count())
    }

    /// Entries parked after exhausting their retries
    pub async fn failed_count(&self) -> Result<usize, DispatchError> {
        Ok(self
            .load()
            .await?
            .iter()
            .filter(|e| e.sync_status == SyncStatus::Failed)
            .count())
    }

    /// Replay every due pending entry. No-op while offline.
    pub async fn flush(&self) -> Result<FlushSummary, DispatchError> {
        if !self.monitor.is_online() {
            return Ok(FlushSummary::default());
        }
        let _guard = self.flush_lock.lock().await;

        let entries = self.load().await?;
        let mut summary = FlushSummary::default();
        let mut completed: HashSet<Uuid> = HashSet::new();
        let mut updated: HashMap<Uuid, QueuedOperation> = HashMap::new();

        for mut entry in entries {
            if entry.sync_status != SyncStatus::Pending {
                continue;
            }
            if !self.is_due(&entry, Utc::now()) {
                continue;
            }

            summary.attempted += 1;
            match self.dispatch(&entry.op).await {
                Ok(ack) => {
                    summary.synced += 1;
                    completed.insert(entry.id);
                    self.apply_success(&entry.op, &ack).await;
                    tracing::debug!(entry = %entry.id, kind = entry.op.kind_name(), "queued operation synced");
                }
                Err(error) => {
                    entry.retry_count += 1;
                    entry.last_attempt = Some(Utc::now());
                    entry.last_error = Some(error.to_string());
                    if entry.retry_count >= self.backoff.max_retries {
                        entry.sync_status = SyncStatus::Failed;
                        summary.exhausted += 1;
                        self.apply_exhausted(&entry.op).await;
                        tracing::warn!(
                            entry = %entry.id,
                            kind = entry.op.kind_name(),
                            error = %error,
                            "queued operation exhausted its retries"
                        );
                    } else {
                        tracing::debug!(
                            entry = %entry.id,
                            retry_count = entry.retry_count,
                            error = %error,
                            "queued operation failed, will retry"
                        );
                    }
                    updated.insert(entry.id, entry);
                }
            }
        }

        // Re-read before writing: entries enqueued while we were replaying
        // must survive this save.
        let current = self.load().await?;
        let merged: Vec<QueuedOperation> = current
            .into_iter()
            .filter(|e| !completed.contains(&e.id))
            .map(|e| updated.remove(&e.id).unwrap_or(e))
            .collect();
        self.save(&merged).await?;

        Ok(summary)
    }

    /// Reset every failed entry to pending with a fresh retry budget and
    /// wake the flush loop. Returns the number of entries reset.
    pub async fn retry_failed(&self) -> Result<usize, DispatchError> {
        let mut entries = self.load().await?;
        let mut reset = 0;
        for entry in entries.iter_mut() {
            if entry.sync_status == SyncStatus::Failed {
                entry.sync_status = SyncStatus::Pending;
                entry.retry_count = 0;
                entry.last_attempt = None;
                entry.last_error = None;
                reset += 1;
                if let OperationKind::CheckIn {
                    patrol_id,
                    checkpoint_id,
                    completed_at,
                    ..
                } = &entry.op
                {
                    self.store
                        .set_checkpoint_state(
                            patrol_id,
                            checkpoint_id,
                            Some(*completed_at),
                            Some(SyncStatus::Pending),
                        )
                        .await;
                }
            }
        }
        if reset > 0 {
            self.save(&entries).await?;
            self.kick.notify_one();
        }
        Ok(reset)
    }

    /// User-visible undo for a queued check-in: drop the entry and revert
    /// the checkpoint to its unvisited state. Returns false when the entry
    /// was already gone.
    pub async fn remove_queued_check_in(&self, id: Uuid) -> Result<bool, DispatchError> {
        let mut entries = self.load().await?;
        let Some(position) = entries
            .iter()
            .position(|e| e.id == id && matches!(e.op, OperationKind::CheckIn { .. }))
        else {
            return Ok(false);
        };

        let entry = entries.remove(position);
        self.save(&entries).await?;

        if let OperationKind::CheckIn {
            patrol_id,
            checkpoint_id,
            ..
        } = entry.op
        {
            self.store
                .set_checkpoint_state(&patrol_id, &checkpoint_id, None, None)
                .await;
        }
        tracing::info!(entry = %id, "queued check-in removed by user");
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Replay internals
    // -----------------------------------------------------------------------

    fn is_due(&self, entry: &QueuedOperation, now: DateTime<Utc>) -> bool {
        match entry.last_attempt {
            None => true,
            Some(last) => {
                let wait = backoff_delay(&self.backoff, entry.retry_count);
                let wait = chrono::Duration::from_std(wait).unwrap_or_else(|_| {
                    chrono::Duration::milliseconds(self.backoff.max_delay.as_millis() as i64)
                });
                now.signed_duration_since(last) >= wait
            }
        }
    }

    async fn dispatch(&self, op: &OperationKind) -> Result<MutationAck, RemoteError> {
        match op {
            OperationKind::Deploy {
                patrol_id,
                officer_id,
                version,
                request_id,
            } => {
                self.api
                    .deploy_patrol(&DeployRequest {
                        patrol_id: *patrol_id,
                        officer_id: *officer_id,
                        version: *version,
                        request_id: *request_id,
                    })
                    .await
            }
            OperationKind::Complete {
                patrol_id,
                version,
                request_id,
            } => {
                self.api
                    .complete_patrol(&CompleteRequest {
                        patrol_id: *patrol_id,
                        version: *version,
                        request_id: *request_id,
                    })
                    .await
            }
            OperationKind::Reassign {
                patrol_id,
                officer_id,
                version,
                request_id,
            } => {
                self.api
                    .reassign_patrol(&ReassignRequest {
                        patrol_id: *patrol_id,
                        officer_id: *officer_id,
                        version: *version,
                        request_id: *request_id,
                    })
                    .await
            }
            OperationKind::Cancel {
                patrol_id,
                version,
                request_id,
            } => {
                self.api
                    .cancel_patrol(&CancelRequest {
                        patrol_id: *patrol_id,
                        version: *version,
                        request_id: *request_id,
                    })
                    .await
            }
            OperationKind::CheckIn {
                patrol_id,
                checkpoint_id,
                completed_at,
                request_id,
                device_id,
            } => {
                self.api
                    .submit_check_in(&CheckInRequest {
                        patrol_id: *patrol_id,
                        checkpoint_id: *checkpoint_id,
                        completed_at: *completed_at,
                        request_id: *request_id,
                        device_id: device_id.clone(),
                    })
                    .await
            }
        }
    }

    async fn apply_success(&self, op: &OperationKind, ack: &MutationAck) {
        if let OperationKind::CheckIn {
            patrol_id,
            checkpoint_id,
            completed_at,
            ..
        } = op
        {
            self.store
                .set_checkpoint_state(
                    patrol_id,
                    checkpoint_id,
                    Some(*completed_at),
                    Some(SyncStatus::Synced),
                )
                .await;
        }
        if ack.version.is_some() {
            self.store
                .set_patrol_version(&op.patrol_id(), ack.version)
                .await;
        }
    }

    async fn apply_exhausted(&self, op: &OperationKind) {
        if let OperationKind::CheckIn {
            patrol_id,
            checkpoint_id,
            completed_at,
            ..
        } = op
        {
            self.store
                .set_checkpoint_state(
                    patrol_id,
                    checkpoint_id,
                    Some(*completed_at),
                    Some(SyncStatus::Failed),
                )
                .await;
        }
    }
}
