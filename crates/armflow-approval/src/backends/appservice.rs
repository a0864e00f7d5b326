//! App Service sites
//!
//! Records are a child collection of the site; approval replaces the record
//! and must state that no further action is required.

use super::list_child_records;
use crate::family::ProviderFamily;
use crate::record::{ConnectionRecord, NameComparison, STATUS_APPROVED};
use crate::strategy::ApprovalStrategy;
use armflow_cloud::{ResourceClient, ResourceId, Result};
use async_trait::async_trait;
use serde_json::json;

pub struct AppServiceStrategy;

#[async_trait]
impl ApprovalStrategy for AppServiceStrategy {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::AppService
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
                "privateLinkServiceConnectionState": {
                    "status": STATUS_APPROVED,
                    "description": description,
                    "actionsRequired": "",
                }
            }
        });
        client.create_or_update(&record.id, &body).await?;
        Ok(())
    }
}
