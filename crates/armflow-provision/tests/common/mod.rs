#![allow(dead_code)]

use armflow_cloud::{LockRegistry, MemoryClient, ResourceClient, ResourceGroupId, ResourceId};
use armflow_config::Settings;
use armflow_provision::{
    PrivateDnsZoneGroup, PrivateEndpointProvisioner, PrivateEndpointRequest, ServiceConnection,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

pub fn resource_group(name: &str) -> ResourceGroupId {
    ResourceGroupId::new("0000", name)
}

pub fn endpoint_id(name: &str) -> ResourceId {
    resource_group("network").resource("Microsoft.Network", "privateEndpoints", name)
}

pub fn subnet_id() -> String {
    resource_group("network")
        .resource("Microsoft.Network", "virtualNetworks", "vnet1")
        .child("subnets", "default")
        .to_string()
}

pub fn storage_account(name: &str) -> ResourceId {
    resource_group("rg1").resource("Microsoft.Storage", "storageAccounts", name)
}

pub fn service_connection(name: &str, target: &ResourceId) -> ServiceConnection {
    ServiceConnection {
        name: name.to_string(),
        target_id: Some(target.to_string()),
        target_alias: None,
        subresource_names: vec!["blob".to_string()],
        is_manual: false,
        request_message: None,
        auto_approve: false,
    }
}

pub fn request(name: &str, connections: Vec<ServiceConnection>) -> PrivateEndpointRequest {
    PrivateEndpointRequest {
        id: endpoint_id(name),
        location: "westeurope".to_string(),
        subnet_id: subnet_id(),
        connections,
        private_dns_zone_group: None,
        tags: BTreeMap::new(),
    }
}

pub fn private_dns_zone(name: &str) -> ResourceId {
    resource_group("dns").resource("Microsoft.Network", "privateDnsZones", name)
}

pub fn dns_zone_group(name: &str, zones: &[&ResourceId]) -> PrivateDnsZoneGroup {
    PrivateDnsZoneGroup {
        name: name.to_string(),
        private_dns_zone_ids: zones.iter().map(|z| z.to_string()).collect(),
    }
}

/// Fast polling and short budgets
pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.timeouts.create_secs = 600;
    settings.timeouts.read_secs = 60;
    settings.timeouts.update_secs = 600;
    settings.timeouts.delete_secs = 600;
    settings.polling.min_interval_ms = 1_000;
    settings.polling.continuous_target_occurrence = 2;
    settings.approval.description = "Approved by test".to_string();
    settings
}

pub struct Harness {
    pub client: Arc<MemoryClient>,
    pub locks: Arc<LockRegistry>,
    pub provisioner: PrivateEndpointProvisioner,
}

pub fn harness_with(client: MemoryClient, settings: Settings) -> Harness {
    let client = Arc::new(client);
    let locks = Arc::new(LockRegistry::new());
    let provisioner = PrivateEndpointProvisioner::new(
        client.clone() as Arc<dyn ResourceClient>,
        locks.clone(),
        settings,
    );
    Harness {
        client,
        locks,
        provisioner,
    }
}

pub fn harness() -> Harness {
    harness_with(MemoryClient::new(), settings())
}

/// Store `target` with one pending connection record from `endpoint`
pub fn seed_pending_connection(client: &MemoryClient, target: &ResourceId, endpoint: &ResourceId) -> ResourceId {
    client.insert(target, json!({ "properties": {} }));
    let id = target.child("privateEndpointConnections", &format!("{}.1", endpoint.name()));
    client.insert(
        &id,
        json!({
            "properties": {
                "privateEndpoint": { "id": endpoint.to_string() },
                "privateLinkServiceConnectionState": { "status": "Pending", "description": "" }
            }
        }),
    );
    id
}

pub fn status_of(document: &Value) -> &str {
    document["properties"]["privateLinkServiceConnectionState"]["status"]
        .as_str()
        .unwrap_or_default()
}
