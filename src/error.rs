//! Dispatch Error Types
//!
//! This module defines the error taxonomy for the dispatch engine. Each
//! variant corresponds to a distinct recovery path: validation errors are
//! rejected before any mutation, conflicts trigger a full refresh, network
//! errors are queued for replay, and server errors are rolled back after
//! retries exhaust.
//!
//! # Error Categories
//!
//! - `Validation` - Illegal transition or missing entity, never retried
//! - `Conflict` - Stale version, optimistic state discarded and refreshed
//! - `Network` - No response received, operation queued for durable replay
//! - `Server` - Remote 5xx failure after retries, rolled back
//! - `QueueExhausted` - Queued entry ran out of retries, needs manual retry
//! - `Storage` / `Serialization` - Local persistence failures
//!
//! # Usage
//!
//! ```rust
//! use patrolsync::error::DispatchError;
//!
//! // Create a validation error
//! let error = DispatchError::validation("officer must be off duty to deploy");
//! ```
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync` and can be safely shared across thread boundaries.
use thiserror::Error;

/// Errors surfaced by the dispatch engine
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Illegal transition or missing entity, rejected before any mutation
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message
        message: String,
    },

    /// The remote store holds a newer version of the entity
    #[error("Conflict: {entity} was updated elsewhere")]
    Conflict {
        /// The entity whose version was stale
        entity: String,
    },

    /// No response received from the remote store
    #[error("Network error: {message}")]
    Network {
        /// Human-readable error message
        message: String,
    },

    /// The remote store answered with a server-side failure
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP-equivalent status code
        status: u16,
        /// Human-readable error message
        message: String,
    },

    /// A queued operation exceeded its retry budget
    #[error("Queued operation {id} exhausted its retries")]
    QueueExhausted {
        /// The queue entry id
        id: uuid::Uuid,
    },

    /// Durable storage failure
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable error message
        message: String,
    },

    /// Payload serialization or deserialization failure
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },
}

impl DispatchError {
    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new conflict error
    pub fn conflict(entity: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
        }
    }

    /// Create a new network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new server error
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Create a new storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON error: {}", err),
        }
    }
}
