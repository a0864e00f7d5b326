//! SQL logical servers
//!
//! Records are a child collection of the server; approval patches only the
//! connection state.

use super::list_child_records;
use crate::family::ProviderFamily;
use crate::record::{ConnectionRecord, NameComparison, approved_state};
use crate::strategy::ApprovalStrategy;
use armflow_cloud::{ResourceClient, ResourceId, Result};
use async_trait::async_trait;
use serde_json::json;

pub struct SqlStrategy;

#[async_trait]
impl ApprovalStrategy for SqlStrategy {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Sql
    }

    fn name_comparison(&self) -> NameComparison {
        NameComparison::CaseInsensitive
    }

    async fn list(
        &self,
        client: &dyn ResourceClient,
        target: &ResourceId,
    ) -> Result<Vec<ConnectionRecord>> {
        list_child_records(client, target).await
    }

    async fn approve(
        &self,
        client: &dyn ResourceClient,
        _target: &ResourceId,
        record: &ConnectionRecord,
        description: &str,
    ) -> Result<()> {
        let patch = json!({
            "properties": {
                "privateLinkServiceConnectionState": approved_state(description)
            }
        });
        client.update(&record.id, &patch).await?;
        Ok(())
    }
}
