//! Cloud provisioning error types

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the provisioning core
///
/// Nothing in this crate retries or swallows one of these: every variant is
/// returned to the caller, which owns the decision of what to do next.
#[derive(Error, Debug)]
pub enum CloudError {
    /// The remote client failed to talk to the API (network, auth, 5xx...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote API reported that the object does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A create found an object that is already there
    #[error("Resource already exists: {0} - it must be imported to be managed")]
    AlreadyExists(String),

    #[error("Invalid resource id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    /// The reconciler observed a state outside both the pending and target sets
    #[error("Unexpected state {state:?} (expected one of {expected:?})")]
    UnexpectedState { state: String, expected: Vec<String> },

    #[error(
        "Timed out after {timeout:?} waiting for state to become {target:?} (last state: {last_state:?})"
    )]
    Timeout {
        timeout: Duration,
        last_state: Option<String>,
        target: Vec<String>,
    },

    #[error("Unsupported provider {namespace:?} (supported: {})", supported.join(", "))]
    UnsupportedProvider {
        namespace: String,
        supported: Vec<String>,
    },

    #[error("No matching private endpoint connection found for {endpoint:?} on {target}")]
    NoMatchingConnection { endpoint: String, target: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn invalid_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        CloudError::InvalidId {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is the remote API's "not found" kind
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CloudError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
