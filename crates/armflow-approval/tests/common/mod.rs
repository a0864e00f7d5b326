#![allow(dead_code)]

use armflow_approval::{ApprovalDispatcher, ApprovalSettings};
use armflow_cloud::{MemoryClient, ResourceClient, ResourceGroupId, ResourceId};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub fn resource_group(name: &str) -> ResourceGroupId {
    ResourceGroupId::new("0000", name)
}

pub fn endpoint_id(name: &str) -> ResourceId {
    resource_group("network").resource("Microsoft.Network", "privateEndpoints", name)
}

/// A connection record document below `target`
pub fn connection(
    target: &ResourceId,
    name: &str,
    endpoint: Option<&ResourceId>,
    status: &str,
) -> (ResourceId, Value) {
    let id = target.child("privateEndpointConnections", name);
    let mut properties = json!({
        "privateLinkServiceConnectionState": { "status": status, "description": "" }
    });
    if let Some(endpoint) = endpoint {
        // services echo endpoint ids back with lower-cased keys
        properties["privateEndpoint"] =
            json!({ "id": endpoint.to_string().replace("resourceGroups", "resourcegroups") });
    }
    let document = json!({ "id": id.to_string(), "properties": properties });
    (id, document)
}

/// Store `target` and its connection records as a child collection
pub fn seed_children(client: &MemoryClient, target: &ResourceId, records: &[(ResourceId, Value)]) {
    client.insert(target, json!({ "properties": {} }));
    for (id, document) in records {
        client.insert(id, document.clone());
    }
}

pub fn settings() -> ApprovalSettings {
    ApprovalSettings {
        description: "Approved by test".to_string(),
        min_interval: Duration::from_secs(1),
        poll_interval: None,
        continuous_target_occurrence: 2,
    }
}

pub fn dispatcher(client: &Arc<MemoryClient>) -> ApprovalDispatcher {
    ApprovalDispatcher::new(client.clone() as Arc<dyn ResourceClient>, settings())
}

pub fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(600)
}

pub fn status_of(document: &Value) -> &str {
    document["properties"]["privateLinkServiceConnectionState"]["status"]
        .as_str()
        .unwrap_or_default()
}
