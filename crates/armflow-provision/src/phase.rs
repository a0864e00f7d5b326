//! Provisioning phases

use crate::error::ProvisionError;
use armflow_cloud::{CloudError, ResourceId};
use serde::{Deserialize, Serialize};

/// Phase of a private endpoint operation
///
/// ```text
/// Requested ─► Creating ─► Provisioned ─► Approving ─► Approved
///     │                       ▲
///     ├──────► Updating ──────┘
///     │
///     └──────► Deleting ─► Deleted
///
/// any phase ─► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionPhase {
    Requested,
    Creating,
    Updating,
    Provisioned,
    Approving,
    Approved,
    Deleting,
    Deleted,
    Failed,
}

impl ProvisionPhase {
    pub fn can_advance_to(self, next: ProvisionPhase) -> bool {
        use ProvisionPhase::*;
        matches!(
            (self, next),
            (Requested, Creating)
                | (Creating, Provisioned)
                | (Requested, Updating)
                | (Updating, Provisioned)
                | (Provisioned, Approving)
                | (Approving, Approving)
                | (Approving, Approved)
                | (Requested, Deleting)
                | (Deleting, Deleted)
        ) || (next == Failed && self != Failed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProvisionPhase::Provisioned
                | ProvisionPhase::Approved
                | ProvisionPhase::Deleted
                | ProvisionPhase::Failed
        )
    }
}

impl std::fmt::Display for ProvisionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisionPhase::Requested => write!(f, "requested"),
            ProvisionPhase::Creating => write!(f, "creating"),
            ProvisionPhase::Updating => write!(f, "updating"),
            ProvisionPhase::Provisioned => write!(f, "provisioned"),
            ProvisionPhase::Approving => write!(f, "approving"),
            ProvisionPhase::Approved => write!(f, "approved"),
            ProvisionPhase::Deleting => write!(f, "deleting"),
            ProvisionPhase::Deleted => write!(f, "deleted"),
            ProvisionPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Tracks the phase of one operation and logs its transitions
#[derive(Debug)]
pub(crate) struct PhaseTracker<'a> {
    id: &'a ResourceId,
    phase: ProvisionPhase,
}

impl<'a> PhaseTracker<'a> {
    pub(crate) fn new(id: &'a ResourceId) -> Self {
        tracing::debug!("{}: {}", id, ProvisionPhase::Requested);
        Self {
            id,
            phase: ProvisionPhase::Requested,
        }
    }

    pub(crate) fn phase(&self) -> ProvisionPhase {
        self.phase
    }

    pub(crate) fn advance(&mut self, next: ProvisionPhase) {
        debug_assert!(
            self.phase.can_advance_to(next),
            "invalid transition {} -> {}",
            self.phase,
            next
        );
        tracing::info!("{}: {} -> {}", self.id, self.phase, next);
        self.phase = next;
    }

    /// Fail the operation in its current phase
    pub(crate) fn fail(&self, source: CloudError) -> ProvisionError {
        tracing::warn!(
            "{}: {} -> {}: {}",
            self.id,
            self.phase,
            ProvisionPhase::Failed,
            source
        );
        ProvisionError::Failed {
            phase: self.phase,
            id: self.id.to_string(),
            source,
        }
    }
}
