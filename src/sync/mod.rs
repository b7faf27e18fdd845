//! # Background Sync Service
//!
//! Drives the durable offline queue: a background task flushes pending
//! entries on a periodic schedule, immediately when something is enqueued
//! while online, and on every offline-to-online transition. The service
//! also exposes the queue introspection surface UI collaborators bind
//! badges to.
//!
//! ## Flush Triggers
//!
//! - **Enqueue**: the queue kicks the loop as soon as an entry lands
//! - **Connectivity**: the loop wakes when the runtime reports online
//! - **Periodic**: every 60s, widened to 120s under reduce-sync-frequency
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # async fn example(
//! #     store: Arc<patrolsync::store::DispatchStore>,
//! #     queue: Arc<patrolsync::offline::OfflineQueue>,
//! #     monitor: Arc<patrolsync::net::ConnectivityMonitor>,
//! # ) {
//! use patrolsync::config::Config;
//! use patrolsync::sync::SyncService;
//!
//! let mut service = SyncService::new(store, queue, monitor, Config::default());
//! service.start().expect("sync service already running");
//!
//! // Badge counts for the UI
//! let pending = service.pending_count().await.unwrap();
//! let failed = service.failed_count().await.unwrap();
//! # }
//! ```

pub mod scheduler;

pub use scheduler::FlushScheduler;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::Config;
use crate::error::DispatchError;
use crate::net::ConnectivityMonitor;
use crate::offline::queue::{FlushSummary, OfflineQueue};
use crate::store::DispatchStore;

/// Queue flush coordinator and introspection surface
pub struct SyncService {
    store: Arc<DispatchStore>,
    queue: Arc<OfflineQueue>,
    monitor: Arc<ConnectivityMonitor>,
    scheduler: Arc<FlushScheduler>,
    /// Background flush task handle
    task: Option<JoinHandle<()>>,
}

impl SyncService {
    pub fn new(
        store: Arc<DispatchStore>,
        queue: Arc<OfflineQueue>,
        monitor: Arc<ConnectivityMonitor>,
        config: Config,
    ) -> Self {
        Self {
            store,
            queue,
            monitor,
            scheduler: Arc::new(FlushScheduler::new(config.flush_interval())),
            task: None,
        }
    }

    /// Start the background flush loop
    pub fn start(&mut self) -> Result<(), DispatchError> {
        if self.task.is_some() {
            return Err(DispatchError::validation("sync service is already running"));
        }

        let store = Arc::clone(&self.store);
        let queue = Arc::clone(&self.queue);
        let scheduler = Arc::clone(&self.scheduler);
        let mut online = self.monitor.subscribe();

        self.task = Some(tokio::spawn(async move {
            loop {
                let wait = scheduler.time_until_next_flush().await;
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        if *online.borrow() {
                            Self::run_flush(&store, &queue, &scheduler, "periodic").await;
                        } else {
                            // Offline periodic ticks only re-arm the timer
                            scheduler.record_flush().await;
                        }
                    }
                    changed = online.changed() => {
                        if changed.is_err() {
                            // Monitor dropped; nothing left to wake us
                            break;
                        }
                        if *online.borrow_and_update() {
                            Self::run_flush(&store, &queue, &scheduler, "online transition").await;
                        }
                    }
                    _ = queue.kicked() => {
                        if *online.borrow() {
                            Self::run_flush(&store, &queue, &scheduler, "enqueue").await;
                        }
                    }
                }
            }
        }));
        Ok(())
    }

    /// Stop the background flush loop
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    async fn run_flush(
        store: &DispatchStore,
        queue: &OfflineQueue,
        scheduler: &FlushScheduler,
        trigger: &str,
    ) {
        match queue.flush().await {
            Ok(summary) => {
                if summary.attempted > 0 {
                    tracing::debug!(
                        trigger,
                        attempted = summary.attempted,
                        synced = summary.synced,
                        exhausted = summary.exhausted,
                        "queue flush finished"
                    );
                }
                // The local view is confirmed in sync only when nothing
                // was left behind by this pass
                if summary.synced == summary.attempted && summary.exhausted == 0 {
                    store.set_last_sync(Utc::now()).await;
                }
            }
            Err(error) => {
                tracing::error!(trigger, error = %error, "queue flush failed");
            }
        }
        scheduler.record_flush().await;
    }

    // -----------------------------------------------------------------------
    // Introspection surface
    // -----------------------------------------------------------------------

    /// Entries awaiting confirmation
    pub async fn pending_count(&self) -> Result<usize, DispatchError> {
        self.queue.pending_count().await
    }

    /// Entries parked after exhausting their retries
    pub async fn failed_count(&self) -> Result<usize, DispatchError> {
        self.queue.failed_count().await
    }

    /// Reset failed entries and flush immediately. Returns the number of
    /// entries given a fresh retry budget.
    pub async fn retry_failed(&self) -> Result<usize, DispatchError> {
        let reset = self.queue.retry_failed().await?;
        if reset > 0 {
            self.queue.flush().await?;
        }
        Ok(reset)
    }

    /// Undo a queued check-in before it syncs
    pub async fn remove_queued_check_in(&self, id: Uuid) -> Result<bool, DispatchError> {
        self.queue.remove_queued_check_in(id).await
    }

    /// Persisted queue entries, for inspection views
    pub async fn queue_entries(&self) -> Result<Vec<crate::offline::QueuedOperation>, DispatchError> {
        self.queue.entries().await
    }

    /// Timestamp of the last confirmed sync
    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.store.last_sync().await
    }

    /// Force an immediate flush outside the schedule
    pub async fn flush_now(&self) -> Result<FlushSummary, DispatchError> {
        if !self.monitor.is_online() {
            return Ok(FlushSummary::default());
        }
        let summary = self.queue.flush().await?;
        self.scheduler.record_flush().await;
        if summary.synced == summary.attempted && summary.exhausted == 0 {
            self.store.set_last_sync(Utc::now()).await;
        }
        Ok(summary)
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
