//! Cosmos DB accounts
//!
//! Records are a child collection of the account. A replacement must carry
//! the record's `groupId` or the service rejects it.

use super::list_child_records;
use crate::family::ProviderFamily;
use crate::record::{ConnectionRecord, NameComparison, approved_state};
use crate::strategy::ApprovalStrategy;
use armflow_cloud::{CloudError, ResourceClient, ResourceId, Result};
use async_trait::async_trait;
use serde_json::{Value, json};

pub struct CosmosDbStrategy;

#[async_trait]
impl ApprovalStrategy for CosmosDbStrategy {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::CosmosDb
    }

    fn name_comparison(&self) -> NameComparison {
        NameComparison::Exact
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
        let group_id = record
            .raw
            .pointer("/properties/groupId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CloudError::InvalidConfig(format!("connection {} has no groupId", record.id))
            })?;

        let body = json!({
            "properties": {
                "groupId": group_id,
                "privateLinkServiceConnectionState": approved_state(description)
            }
        });
        client.create_or_update(&record.id, &body).await?;
        Ok(())
    }
}
