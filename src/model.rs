//! Domain types for officers, patrols, and checkpoints.
//!
//! The two collections are linked by a pair of references: an on-duty
//! officer points at its patrol through `current_patrol`, and an in-progress
//! patrol points back through `assigned_officer`. Partial failures can leave
//! the pair pointing past each other; the reconciler repairs that drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Officer identifier
pub type OfficerId = Uuid;

/// Patrol identifier
pub type PatrolId = Uuid;

/// Checkpoint identifier
pub type CheckpointId = Uuid;

/// Duty status of an officer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OfficerStatus {
    /// Not currently assigned
    OffDuty,
    /// Actively working an in-progress patrol
    OnDuty,
    /// On a break, manually set
    Break,
    /// Unavailable, manually set
    Unavailable,
}

/// Lifecycle status of a patrol
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatrolStatus {
    /// Created but not started
    Scheduled,
    /// Actively being worked
    InProgress,
    /// Finished successfully (terminal)
    Completed,
    /// Called off (terminal)
    Cancelled,
}

impl PatrolStatus {
    /// Whether this status admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, PatrolStatus::Completed | PatrolStatus::Cancelled)
    }
}

/// Synchronization status of a locally applied change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Applied locally, not yet confirmed by the server
    Pending,
    /// Confirmed by the server
    Synced,
    /// Exhausted its retries, needs manual retry
    Failed,
}

/// An officer in the local view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Officer {
    pub id: OfficerId,
    pub name: String,
    pub status: OfficerStatus,
    /// Patrol this officer is working, when on duty
    pub current_patrol: Option<PatrolId>,
}

impl Officer {
    /// Create an off-duty officer
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: OfficerStatus::OffDuty,
            current_patrol: None,
        }
    }
}

/// A patrol in the local view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patrol {
    pub id: PatrolId,
    pub name: String,
    pub status: PatrolStatus,
    /// Officer working this patrol, when in progress
    pub assigned_officer: Option<OfficerId>,
    /// Remote store version, echoed on every mutating call
    pub version: Option<i64>,
    pub checkpoints: Vec<Checkpoint>,
}

impl Patrol {
    /// Create a scheduled patrol
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: PatrolStatus::Scheduled,
            assigned_officer: None,
            version: None,
            checkpoints: Vec::new(),
        }
    }

    /// Add a checkpoint to this patrol
    pub fn with_checkpoint(mut self, label: impl Into<String>) -> Self {
        self.checkpoints.push(Checkpoint::new(label));
        self
    }

    /// Look up a checkpoint by id
    pub fn checkpoint(&self, id: &CheckpointId) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|c| c.id == *id)
    }
}

/// A checkpoint along a patrol route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub id: CheckpointId,
    pub label: String,
    /// When the checkpoint was checked in, locally or confirmed
    pub completed_at: Option<DateTime<Utc>>,
    /// Distinguishes locally-marked from server-confirmed check-ins
    pub sync_status: Option<SyncStatus>,
}

impl Checkpoint {
    /// Create an unvisited checkpoint
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            completed_at: None,
            sync_status: None,
        }
    }

    /// Whether the checkpoint has been checked in
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}
