//! PatrolSync - Offline-First Dispatch Core
//!
//! PatrolSync keeps a local, interactive view of officers and patrols
//! consistent with a remote authoritative store under unreliable
//! connectivity, while giving the operator instant optimistic feedback.
//!
//! # Overview
//!
//! This library provides the core engine for a dispatch console:
//! - Optimistic actions with snapshot-based rollback
//! - Stale-version conflict detection with full resynchronization
//! - A durable offline queue with bounded, idempotent replay
//! - Request de-duplication against double-submitted actions
//! - A self-healing reconciliation sweep between the two collections
//!
//! # Module Structure
//!
//! - **`model`** - Officer, patrol, and checkpoint domain types
//! - **`store`** - Injected shared state with typed mutations
//! - **`actions`** - The optimistic action executor
//! - **`offline`** - Retry, dedup, durable queue, and reconciliation
//! - **`sync`** - Background flush service and queue introspection
//! - **`remote`** - The Remote Patrol Service boundary and HTTP adapter
//! - **`storage`** - Durable key-value surface (in-memory and SQLite)
//! - **`net`** - Online/offline connectivity signal
//! - **`engine`** - Everything assembled behind one object
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use patrolsync::config::Config;
//! use patrolsync::engine::DispatchEngine;
//! use patrolsync::net::ConnectivityMonitor;
//! use patrolsync::remote::http::HttpPatrolApi;
//! use patrolsync::storage::sqlite::SqliteStorage;
//!
//! # async fn example() -> Result<(), patrolsync::error::DispatchError> {
//! let config = Config::builder()
//!     .server_url("https://dispatch.example.net")
//!     .device_id("unit-12")
//!     .build()
//!     .expect("valid config");
//!
//! let api = Arc::new(HttpPatrolApi::new(config.clone()));
//! let storage = Arc::new(SqliteStorage::open("patrolsync.db").await?);
//! let monitor = Arc::new(ConnectivityMonitor::default());
//!
//! let mut engine = DispatchEngine::new(api, storage, Arc::clone(&monitor), config);
//! engine.start()?;
//!
//! // The runtime feeds connectivity transitions in
//! monitor.set_online(false);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! UI intents flow into the executor, which validates, snapshots, applies
//! the optimistic update, and issues the remote call through the backoff
//! retrier. Failures fan out by class: connectivity failures land in the
//! durable queue, version conflicts trigger a full refresh from the
//! remote store, and everything else rolls back to the snapshot. The
//! reconciler runs independently off the same store and closes whatever
//! gaps the executor cannot see.

pub mod actions;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod net;
pub mod offline;
pub mod remote;
pub mod storage;
pub mod store;
pub mod sync;

pub use actions::{ActionOutcome, DispatchActions};
pub use engine::DispatchEngine;
pub use error::DispatchError;
pub use store::DispatchStore;
