//! # Offline-First Core
//!
//! The failure-handling machinery behind the optimistic actions: retry with
//! exponential backoff, in-flight request de-duplication, durable operation
//! queuing, and corrective state reconciliation.
//!
//! ## Key Components
//!
//! - `retry.rs`: Bounded retry with exponential backoff
//! - `dedup.rs`: In-flight request guard
//! - `queue.rs`: Durable offline operation queue with idempotent replay
//! - `reconcile.rs`: Officer/patrol drift detection and repair
//!
//! ## How the pieces fit
//!
//! A user action flows through the executor in `crate::actions`: the dedup
//! cache rejects rapid duplicates, the retrier wraps the remote call, a
//! connectivity failure lands the operation in the queue, and the
//! reconciler sweeps up whatever inconsistency slips past all of that.

pub mod dedup;
pub mod queue;
pub mod reconcile;
pub mod retry;

// Re-export main types
pub use dedup::DedupCache;
pub use queue::{FlushSummary, OfflineQueue, OperationKind, QueuedOperation};
pub use reconcile::{reconcile_once, ReconcileReport, Reconciler};
pub use retry::{backoff_delay, retry};
