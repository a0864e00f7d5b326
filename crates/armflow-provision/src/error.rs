//! Provisioning error types

use crate::phase::ProvisionPhase;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The request is not valid; nothing was sent to the remote API
    #[error("Invalid private endpoint {id}: {reason}")]
    InvalidRequest { id: String, reason: String },

    /// The operation failed in `phase`
    #[error("{phase} {id}: {source}")]
    Failed {
        phase: ProvisionPhase,
        id: String,
        #[source]
        source: armflow_cloud::CloudError,
    },
}

impl ProvisionError {
    /// The underlying core error, if the operation reached the remote API
    pub fn cloud_error(&self) -> Option<&armflow_cloud::CloudError> {
        match self {
            ProvisionError::Failed { source, .. } => Some(source),
            ProvisionError::InvalidRequest { .. } => None,
        }
    }

    pub fn phase(&self) -> Option<ProvisionPhase> {
        match self {
            ProvisionError::Failed { phase, .. } => Some(*phase),
            ProvisionError::InvalidRequest { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
