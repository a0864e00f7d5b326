//! Key Vault vaults
//!
//! Records are embedded in the vault document under
//! `properties.privateEndpointConnections`. Approval re-reads the vault and
//! patches the embedded list with the matched entry updated.

use crate::family::ProviderFamily;
use crate::record::{ConnectionRecord, NameComparison, approved_state};
use crate::strategy::ApprovalStrategy;
use armflow_cloud::{CloudError, ResourceClient, ResourceId, Result};
use async_trait::async_trait;
use serde_json::{Value, json};

const EMBEDDED: &str = "/properties/privateEndpointConnections";

pub struct KeyVaultStrategy;

fn embedded_connections(vault: &Value) -> Vec<Value> {
    vault
        .pointer(EMBEDDED)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

#[async_trait]
impl ApprovalStrategy for KeyVaultStrategy {
    fn family(&self) -> ProviderFamily {
        ProviderFamily::KeyVault
    }

    fn name_comparison(&self) -> NameComparison {
        NameComparison::Exact
    }

    async fn list(
        &self,
        client: &dyn ResourceClient,
        target: &ResourceId,
    ) -> Result<Vec<ConnectionRecord>> {
        let vault = client.get(target).await?;
        embedded_connections(&vault)
            .into_iter()
            .map(ConnectionRecord::from_value)
            .collect()
    }

    async fn approve(
        &self,
        client: &dyn ResourceClient,
        target: &ResourceId,
        record: &ConnectionRecord,
        description: &str,
    ) -> Result<()> {
        let vault = client.get(target).await?;
        let mut connections = embedded_connections(&vault);

        let entry = connections
            .iter_mut()
            .find(|c| {
                c.get("id")
                    .and_then(Value::as_str)
                    .and_then(|id| ResourceId::parse_insensitively(id).ok())
                    .is_some_and(|id| id == record.id)
            })
            .ok_or_else(|| CloudError::NotFound(record.id.to_string()))?;

        if let Some(properties) = entry.get_mut("properties").and_then(Value::as_object_mut) {
            properties.insert(
                "privateLinkServiceConnectionState".to_string(),
                approved_state(description),
            );
        } else {
            return Err(CloudError::InvalidConfig(format!(
                "connection {} has no properties",
                record.id
            )));
        }

        let patch = json!({ "properties": { "privateEndpointConnections": connections } });
        client.update(target, &patch).await?;
        Ok(())
    }
}
