//! Approval strategy trait definition

use crate::family::ProviderFamily;
use crate::record::{ConnectionRecord, NameComparison};
use armflow_cloud::{ResourceClient, ResourceId, Result};
use async_trait::async_trait;

/// Backend-specific half of the approval handshake
///
/// Each supported [`ProviderFamily`] has one implementation. Strategies only
/// know how their backend shapes listing and approval; matching, selection
/// and confirmation are the dispatcher's job and are identical for all.
#[async_trait]
pub trait ApprovalStrategy: Send + Sync {
    fn family(&self) -> ProviderFamily;

    /// Rule for comparing the derived endpoint name with the expected one
    fn name_comparison(&self) -> NameComparison;

    /// List the connection records of `target`
    async fn list(
        &self,
        client: &dyn ResourceClient,
        target: &ResourceId,
    ) -> Result<Vec<ConnectionRecord>>;

    /// Move `record` to the approved status with the given audit description
    ///
    /// Not assumed idempotent: callers must not retry a failed approval.
    async fn approve(
        &self,
        client: &dyn ResourceClient,
        target: &ResourceId,
        record: &ConnectionRecord,
        description: &str,
    ) -> Result<()>;
}
