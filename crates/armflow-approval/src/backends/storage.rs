//! Storage accounts
//!
//! Records are a child collection of the account; approval replaces the
//! record with a PUT.

use super::list_child_records;
use crate::family::ProviderFamily;
use crate::record::{ConnectionRecord, NameComparison, STATUS_APPROVED};
use crate::strategy::ApprovalStrategy;
use armflow_cloud::{ResourceClient, ResourceId, Result};
use async_trait::async_trait;
use serde_json::json;

pub struct StorageStrategy;

#[async_trait]
impl ApprovalStrategy for StorageStrategy {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::Storage
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
        let body = json!({
            "properties": {
                "privateEndpoint": record.raw.pointer("/properties/privateEndpoint"),
                "privateLinkServiceConnectionState": {
                    "status": STATUS_APPROVED,
                    "description": description,
                    "actionRequired": "None",
                }
            }
        });
        client.create_or_update(&record.id, &body).await?;
        Ok(())
    }
}
