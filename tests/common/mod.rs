//! Common test utilities and helpers
//!
//! Provides a scripted in-memory Remote Patrol Service with request-id
//! de-duplication, plus fixture wiring for the engine components.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use patrolsync::config::Config;
use patrolsync::model::{CheckpointId, Officer, OfficerId, Patrol, PatrolId, PatrolStatus};
use patrolsync::net::ConnectivityMonitor;
use patrolsync::offline::OfflineQueue;
use patrolsync::remote::{
    AlertRequest, CancelRequest, CheckInRequest, CompleteRequest, DeployRequest, MutationAck,
    PatrolApi, ReassignRequest, RemoteError,
};
use patrolsync::storage::MemoryStorage;
use patrolsync::store::DispatchStore;
use patrolsync::DispatchActions;

/// Server-side patrol record held by the mock service
#[derive(Debug, Clone)]
pub struct ServerPatrol {
    pub status: PatrolStatus,
    pub version: i64,
    pub assigned_officer: Option<OfficerId>,
    pub check_ins: Vec<CheckpointId>,
}

/// Scripted in-memory Remote Patrol Service.
///
/// Applies mutations to its own patrol table, enforces optimistic
/// concurrency on the echoed version, and de-duplicates by `request_id`
/// the way the real store would: a replayed request is acknowledged
/// without being applied twice.
pub struct MockPatrolService {
    patrols: Mutex<HashMap<PatrolId, ServerPatrol>>,
    seen_requests: Mutex<HashSet<Uuid>>,
    /// Errors popped one per call before the real handler runs
    script: Mutex<VecDeque<RemoteError>>,
    pub calls: AtomicUsize,
    /// Listings served to conflict refresh
    refresh_officers: Mutex<Vec<Officer>>,
    refresh_patrols: Mutex<Vec<Patrol>>,
    /// Artificial latency per call, for interleaving tests
    pub latency: Mutex<Duration>,
}

impl MockPatrolService {
    pub fn new() -> Self {
        Self {
            patrols: Mutex::new(HashMap::new()),
            seen_requests: Mutex::new(HashSet::new()),
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            refresh_officers: Mutex::new(Vec::new()),
            refresh_patrols: Mutex::new(Vec::new()),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    /// Seed a patrol on the server side
    pub fn seed_patrol(&self, id: PatrolId, version: i64) {
        self.patrols.lock().unwrap().insert(
            id,
            ServerPatrol {
                status: PatrolStatus::Scheduled,
                version,
                assigned_officer: None,
                check_ins: Vec::new(),
            },
        );
    }

    /// Read back a server-side patrol
    pub fn server_patrol(&self, id: &PatrolId) -> Option<ServerPatrol> {
        self.patrols.lock().unwrap().get(id).cloned()
    }

    /// Script the next `times` calls to fail with clones of `error`
    pub fn fail_next(&self, error: RemoteError, times: usize) {
        let mut script = self.script.lock().unwrap();
        for _ in 0..times {
            script.push_back(error.clone());
        }
    }

    /// Set the listings served to a conflict refresh
    pub fn set_refresh_state(&self, officers: Vec<Officer>, patrols: Vec<Patrol>) {
        *self.refresh_officers.lock().unwrap() = officers;
        *self.refresh_patrols.lock().unwrap() = patrols;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Record the call, apply latency, pop any scripted failure
    async fn begin(&self) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if latency > Duration::ZERO {
            tokio::time::sleep(latency).await;
        }
        match self.script.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Idempotency gate: true when this request was already applied
    fn already_applied(&self, request_id: Uuid) -> bool {
        !self.seen_requests.lock().unwrap().insert(request_id)
    }

    fn check_version(patrol: &ServerPatrol, echoed: Option<i64>) -> Result<(), RemoteError> {
        match echoed {
            Some(v) if v != patrol.version => Err(RemoteError::Conflict),
            _ => Ok(()),
        }
    }

    fn mutate<F>(
        &self,
        patrol_id: PatrolId,
        request_id: Uuid,
        version: Option<i64>,
        apply: F,
    ) -> Result<MutationAck, RemoteError>
    where
        F: FnOnce(&mut ServerPatrol),
    {
        let mut patrols = self.patrols.lock().unwrap();
        let patrol = patrols.get_mut(&patrol_id).ok_or(RemoteError::Status {
            status: 404,
            message: "no such patrol".to_string(),
        })?;

        if self.already_applied(request_id) {
            // Replayed delivery: acknowledge without reapplying
            return Ok(MutationAck {
                version: Some(patrol.version),
            });
        }

        Self::check_version(patrol, version)?;
        apply(patrol);
        patrol.version += 1;
        Ok(MutationAck {
            version: Some(patrol.version),
        })
    }
}

impl Default for MockPatrolService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PatrolApi for MockPatrolService {
    async fn deploy_patrol(&self, req: &DeployRequest) -> Result<MutationAck, RemoteError> {
        self.begin().await?;
        let officer_id = req.officer_id;
        self.mutate(req.patrol_id, req.request_id, req.version, |patrol| {
            patrol.status = PatrolStatus::InProgress;
            patrol.assigned_officer = Some(officer_id);
        })
    }

    async fn complete_patrol(&self, req: &CompleteRequest) -> Result<MutationAck, RemoteError> {
        self.begin().await?;
        self.mutate(req.patrol_id, req.request_id, req.version, |patrol| {
            patrol.status = PatrolStatus::Completed;
            patrol.assigned_officer = None;
        })
    }

    async fn reassign_patrol(&self, req: &ReassignRequest) -> Result<MutationAck, RemoteError> {
        self.begin().await?;
        let officer_id = req.officer_id;
        self.mutate(req.patrol_id, req.request_id, req.version, |patrol| {
            patrol.assigned_officer = Some(officer_id);
        })
    }

    async fn cancel_patrol(&self, req: &CancelRequest) -> Result<MutationAck, RemoteError> {
        self.begin().await?;
        self.mutate(req.patrol_id, req.request_id, req.version, |patrol| {
            patrol.status = PatrolStatus::Cancelled;
            patrol.assigned_officer = None;
        })
    }

    async fn raise_alert(&self, _req: &AlertRequest) -> Result<MutationAck, RemoteError> {
        self.begin().await?;
        Ok(MutationAck { version: None })
    }

    async fn submit_check_in(&self, req: &CheckInRequest) -> Result<MutationAck, RemoteError> {
        self.begin().await?;
        let checkpoint_id = req.checkpoint_id;
        self.mutate(req.patrol_id, req.request_id, None, |patrol| {
            patrol.check_ins.push(checkpoint_id);
        })
    }

    async fn fetch_officers(&self) -> Result<Vec<Officer>, RemoteError> {
        Ok(self.refresh_officers.lock().unwrap().clone())
    }

    async fn fetch_patrols(&self) -> Result<Vec<Patrol>, RemoteError> {
        Ok(self.refresh_patrols.lock().unwrap().clone())
    }
}

/// Wired-up engine components sharing one store, queue, and mock remote
pub struct TestHarness {
    pub actions: DispatchActions,
    pub store: Arc<DispatchStore>,
    pub queue: Arc<OfflineQueue>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub api: Arc<MockPatrolService>,
    pub storage: Arc<MemoryStorage>,
    pub officer_id: OfficerId,
    pub patrol_id: PatrolId,
}

/// Build a harness with one off-duty officer and one scheduled patrol,
/// seeded both locally (version 1) and on the mock server.
pub async fn harness(online: bool) -> TestHarness {
    let api = Arc::new(MockPatrolService::new());
    let store = Arc::new(DispatchStore::new());
    let monitor = Arc::new(ConnectivityMonitor::new(online));
    let config = Config::default();
    let storage = Arc::new(MemoryStorage::new());
    let queue = Arc::new(OfflineQueue::new(
        Arc::clone(&storage) as Arc<dyn patrolsync::storage::StorageAdapter>,
        Arc::clone(&api) as Arc<dyn PatrolApi>,
        Arc::clone(&store),
        Arc::clone(&monitor),
        config.queue_backoff,
    ));
    let actions = DispatchActions::new(
        Arc::clone(&store),
        Arc::clone(&api) as Arc<dyn PatrolApi>,
        Arc::clone(&queue),
        Arc::clone(&monitor),
        config,
    );

    let officer = Officer::new("Rivera");
    let mut patrol = Patrol::new("Harbor loop").with_checkpoint("Pier 7");
    patrol.version = Some(1);
    let (officer_id, patrol_id) = (officer.id, patrol.id);
    store.insert_officer(officer).await;
    store.insert_patrol(patrol).await;
    api.seed_patrol(patrol_id, 1);

    TestHarness {
        actions,
        store,
        queue,
        monitor,
        api,
        storage,
        officer_id,
        patrol_id,
    }
}

/// Storage key the queue persists under; tests use it to inspect and age
/// entries without waiting out real backoff windows.
pub const QUEUE_STORAGE_KEY: &str = "patrolsync.offline_queue";

/// Rewind every entry's `last_attempt` so its backoff window has elapsed.
pub async fn age_queue_entries(storage: &MemoryStorage, seconds: i64) {
    use patrolsync::offline::QueuedOperation;
    use patrolsync::storage::StorageAdapter;

    let raw = storage
        .get(QUEUE_STORAGE_KEY)
        .await
        .unwrap()
        .expect("queue persisted");
    let mut entries: Vec<QueuedOperation> = serde_json::from_str(&raw).unwrap();
    for entry in entries.iter_mut() {
        entry.last_attempt = entry
            .last_attempt
            .map(|t| t - chrono::Duration::seconds(seconds));
    }
    storage
        .set(QUEUE_STORAGE_KEY, &serde_json::to_string(&entries).unwrap())
        .await
        .unwrap();
}
