//! # State Reconciliation
//!
//! Detects and repairs drift between the officer and patrol collections.
//! Partial failures, external updates, and reloads can leave the two sides
//! of the duty link pointing past each other; the reconciler closes those
//! gaps with local corrective mutations only.
//!
//! Two rules, applied per pair:
//!
//! 1. An officer on duty whose referenced patrol is not in progress is
//!    forced off duty with the reference cleared. Patrol status is
//!    authoritative in this direction.
//! 2. An in-progress patrol whose assigned officer is not on duty working
//!    it forces that officer on duty with the reference set. The active
//!    assignment is authoritative in this direction.
//!
//! Corrections never call the remote store and each one is logged as an
//! anomaly. A sweep over consistent state is a no-op, so the debounced
//! re-run a correction itself triggers settles immediately.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::model::{OfficerStatus, PatrolStatus};
use crate::store::DispatchStore;

/// Corrections applied by one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Officers forced off duty (rule 1)
    pub forced_off_duty: usize,
    /// Officers forced on duty (rule 2)
    pub forced_on_duty: usize,
}

impl ReconcileReport {
    /// Whether the sweep found nothing to repair
    pub fn is_clean(&self) -> bool {
        self.forced_off_duty == 0 && self.forced_on_duty == 0
    }
}

/// Run one corrective sweep over the store
pub async fn reconcile_once(store: &DispatchStore) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    // Rule 1: patrol status is authoritative for the officer's duty flag
    for officer in store.officers().await {
        if officer.status != OfficerStatus::OnDuty {
            continue;
        }
        let Some(patrol_id) = officer.current_patrol else {
            continue;
        };
        let active = store
            .patrol(&patrol_id)
            .await
            .map(|p| p.status == PatrolStatus::InProgress)
            .unwrap_or(false);
        if !active && store.force_off_duty(&officer.id).await {
            report.forced_off_duty += 1;
            tracing::warn!(
                officer = %officer.id,
                patrol = %patrol_id,
                "anomaly: officer on duty for a patrol that is not in progress"
            );
        }
    }

    // Rule 2: an active assignment is authoritative for the officer
    for patrol in store.patrols().await {
        if patrol.status != PatrolStatus::InProgress {
            continue;
        }
        let Some(officer_id) = patrol.assigned_officer else {
            continue;
        };
        if store.force_on_duty(&officer_id, &patrol.id).await {
            report.forced_on_duty += 1;
            tracing::warn!(
                officer = %officer_id,
                patrol = %patrol.id,
                "anomaly: assigned officer was not on duty for an in-progress patrol"
            );
        }
    }

    report
}

/// Debounced background sweep over the store's change signal
pub struct Reconciler {
    store: Arc<DispatchStore>,
    debounce: Duration,
    task: Option<JoinHandle<()>>,
}

impl Reconciler {
    pub fn new(store: Arc<DispatchStore>, debounce: Duration) -> Self {
        Self {
            store,
            debounce,
            task: None,
        }
    }

    /// Start sweeping. Each burst of store changes is coalesced into one
    /// sweep after the debounce window.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        let store = Arc::clone(&self.store);
        let debounce = self.debounce;
        let mut changes = self.store.subscribe();

        self.task = Some(tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                tokio::time::sleep(debounce).await;
                // Swallow everything that arrived during the window
                changes.borrow_and_update();

                let report = reconcile_once(&store).await;
                if !report.is_clean() {
                    tracing::debug!(
                        forced_off_duty = report.forced_off_duty,
                        forced_on_duty = report.forced_on_duty,
                        "reconciliation sweep applied corrections"
                    );
                }
            }
        }));
    }

    /// Stop sweeping and release the store subscription
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        self.stop();
    }
}
