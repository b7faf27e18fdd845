//! # Remote Patrol Service Boundary
//!
//! Defines the `PatrolApi` trait the engine calls for every remote
//! mutation, the request payload types, and the `RemoteError`
//! classification that drives retry and failure-branch decisions.
//!
//! Mutating requests echo the patrol `version` the client last saw; the
//! remote store answers with a conflict when its stored version has
//! advanced. Every request carries an idempotency `request_id` so an
//! at-least-once replay applies only once.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{CheckpointId, Officer, OfficerId, Patrol, PatrolId};

/// Transport-level failure classification
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// No response received at all
    #[error("connection failed: {0}")]
    Connection(String),

    /// The stored version has advanced past the one we echoed
    #[error("conflict: stored version has advanced")]
    Conflict,

    /// The remote store answered with a non-success status
    #[error("request rejected ({status}): {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or status text
        message: String,
    },
}

impl RemoteError {
    /// Whether no response was received (network down, timeout)
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RemoteError::Connection(_))
    }

    /// Whether the failure is a stale-version conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, RemoteError::Conflict)
    }

    /// Whether the failure is a 4xx-class rejection that will not succeed
    /// on repetition
    pub fn is_client_error(&self) -> bool {
        match self {
            RemoteError::Conflict => true,
            RemoteError::Status { status, .. } => (400..500).contains(status),
            RemoteError::Connection(_) => false,
        }
    }

    /// Default retry policy: retry connectivity failures and 5xx-class
    /// responses, never 4xx-class rejections.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Connection(_) => true,
            RemoteError::Conflict => false,
            RemoteError::Status { status, .. } => *status >= 500,
        }
    }
}

/// Acknowledgement returned by mutating endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationAck {
    /// New stored version, when the endpoint tracks one
    pub version: Option<i64>,
}

/// Deploy an officer onto a scheduled patrol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub patrol_id: PatrolId,
    pub officer_id: OfficerId,
    pub version: Option<i64>,
    pub request_id: Uuid,
}

/// Complete an in-progress patrol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub patrol_id: PatrolId,
    pub version: Option<i64>,
    pub request_id: Uuid,
}

/// Hand an in-progress patrol to a different officer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignRequest {
    pub patrol_id: PatrolId,
    pub officer_id: OfficerId,
    pub version: Option<i64>,
    pub request_id: Uuid,
}

/// Cancel a patrol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub patrol_id: PatrolId,
    pub version: Option<i64>,
    pub request_id: Uuid,
}

/// Raise an emergency alert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRequest {
    /// Officer raising the alert, when known
    pub officer_id: Option<OfficerId>,
    pub request_id: Uuid,
}

/// Check in at a patrol checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInRequest {
    pub patrol_id: PatrolId,
    pub checkpoint_id: CheckpointId,
    pub completed_at: DateTime<Utc>,
    pub request_id: Uuid,
    pub device_id: Option<String>,
}

/// Remote Patrol Service surface consumed by the engine
#[async_trait]
pub trait PatrolApi: Send + Sync {
    async fn deploy_patrol(&self, req: &DeployRequest) -> Result<MutationAck, RemoteError>;

    async fn complete_patrol(&self, req: &CompleteRequest) -> Result<MutationAck, RemoteError>;

    async fn reassign_patrol(&self, req: &ReassignRequest) -> Result<MutationAck, RemoteError>;

    async fn cancel_patrol(&self, req: &CancelRequest) -> Result<MutationAck, RemoteError>;

    async fn raise_alert(&self, req: &AlertRequest) -> Result<MutationAck, RemoteError>;

    async fn submit_check_in(&self, req: &CheckInRequest) -> Result<MutationAck, RemoteError>;

    /// Authoritative officer listing, used for conflict refresh
    async fn fetch_officers(&self) -> Result<Vec<Officer>, RemoteError>;

    /// Authoritative patrol listing, used for conflict refresh
    async fn fetch_patrols(&self) -> Result<Vec<Patrol>, RemoteError>;
}
