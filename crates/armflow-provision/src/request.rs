//! Private endpoint requests

use crate::error::{ProvisionError, Result};
use armflow_cloud::ResourceId;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Child collection holding an endpoint's DNS zone groups
pub const DNS_ZONE_GROUPS: &str = "privateDnsZoneGroups";

const PRIVATE_DNS_ZONE_TYPE: &str = "Microsoft.Network/privateDnsZones";
const ALIAS_SUFFIX: &str = ".azure.privatelinkservice";
const MAX_REQUEST_MESSAGE: usize = 140;

/// Desired private endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateEndpointRequest {
    pub id: ResourceId,
    pub location: String,
    pub subnet_id: String,
    /// At most one connection
    pub connections: Vec<ServiceConnection>,
    #[serde(default)]
    pub private_dns_zone_group: Option<PrivateDnsZoneGroup>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Connection from the endpoint to a target service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConnection {
    pub name: String,
    /// Id of the target resource; exclusive with `target_alias`
    #[serde(default)]
    pub target_id: Option<String>,
    /// Private link service alias of the target; exclusive with `target_id`
    #[serde(default)]
    pub target_alias: Option<String>,
    #[serde(default)]
    pub subresource_names: Vec<String>,
    #[serde(default)]
    pub is_manual: bool,
    #[serde(default)]
    pub request_message: Option<String>,
    /// Approve the target's connection record once the endpoint exists
    #[serde(default)]
    pub auto_approve: bool,
}

impl ServiceConnection {
    /// The `privateLinkServiceId` sent for this connection
    pub fn service_id(&self) -> &str {
        self.target_id
            .as_deref()
            .or(self.target_alias.as_deref())
            .unwrap_or_default()
    }
}

/// Single DNS zone group attached to the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateDnsZoneGroup {
    pub name: String,
    pub private_dns_zone_ids: Vec<String>,
}

impl PrivateDnsZoneGroup {
    fn zone_ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.private_dns_zone_ids
            .iter()
            .filter_map(|raw| ResourceId::parse_insensitively(raw).ok())
    }

    /// Request body for the remote API
    pub fn to_body(&self) -> Value {
        let configs: Vec<Value> = self
            .zone_ids()
            .map(|zone| {
                json!({
                    "name": zone.name(),
                    "properties": { "privateDnsZoneId": zone.to_string() }
                })
            })
            .collect();
        json!({ "properties": { "privateDnsZoneConfigs": configs } })
    }

    /// Whether an existing group document already has this name and these zones
    pub fn matches(&self, document: &Value) -> bool {
        if document.get("name").and_then(Value::as_str) != Some(self.name.as_str()) {
            return false;
        }
        let wanted: std::collections::BTreeSet<String> =
            self.zone_ids().map(|zone| zone.lock_key()).collect();
        wanted == zone_keys(document)
    }
}

/// Lower-cased zone ids configured in a DNS zone group document
fn zone_keys(document: &Value) -> std::collections::BTreeSet<String> {
    document
        .pointer("/properties/privateDnsZoneConfigs")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|c| c.pointer("/properties/privateDnsZoneId"))
        .filter_map(Value::as_str)
        .filter_map(|raw| ResourceId::parse_insensitively(raw).ok())
        .map(|zone| zone.lock_key())
        .collect()
}

/// Where a connection points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    Resource(ResourceId),
    /// Private link service alias; the owning resource is not known
    Alias(String),
}

impl ConnectionTarget {
    pub fn resource(&self) -> Option<&ResourceId> {
        match self {
            ConnectionTarget::Resource(id) => Some(id),
            ConnectionTarget::Alias(_) => None,
        }
    }
}

/// `{prefix}.{guid}.{region}.azure.privatelinkservice`
pub fn is_private_link_alias(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    let Some(head) = lower.strip_suffix(ALIAS_SUFFIX) else {
        return false;
    };
    let labels: Vec<&str> = head.split('.').collect();
    labels.len() >= 3
        && labels.iter().all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
}

impl PrivateEndpointRequest {
    fn invalid(&self, reason: impl Into<String>) -> ProvisionError {
        ProvisionError::InvalidRequest {
            id: self.id.to_string(),
            reason: reason.into(),
        }
    }

    /// Check the request and resolve every connection target, in order
    pub fn validate(&self) -> Result<Vec<ConnectionTarget>> {
        match self.connections.len() {
            0 => return Err(self.invalid("a service connection is required")),
            1 => {}
            n => {
                return Err(self.invalid(format!(
                    "expected a single service connection but got {}",
                    n
                )));
            }
        }
        if self.location.trim().is_empty() {
            return Err(self.invalid("location must not be empty"));
        }
        ResourceId::parse_insensitively(&self.subnet_id)
            .map_err(|e| self.invalid(format!("subnet_id: {}", e)))?;
        if let Some(group) = &self.private_dns_zone_group {
            self.validate_dns_zone_group(group)?;
        }

        self.connections
            .iter()
            .map(|connection| self.validate_connection(connection))
            .collect()
    }

    fn validate_connection(&self, connection: &ServiceConnection) -> Result<ConnectionTarget> {
        let name = &connection.name;
        if name.trim().is_empty() {
            return Err(self.invalid("service connection name must not be empty"));
        }

        let message = connection.request_message.as_deref().unwrap_or_default();
        if connection.is_manual {
            if message.trim().is_empty() {
                return Err(self.invalid(format!(
                    "service connection {:?} is manual, so request_message must not be empty",
                    name
                )));
            }
            if message.chars().count() > MAX_REQUEST_MESSAGE {
                return Err(self.invalid(format!(
                    "service connection {:?}: request_message exceeds {} characters",
                    name, MAX_REQUEST_MESSAGE
                )));
            }
        } else if !message.is_empty() {
            return Err(self.invalid(format!(
                "service connection {:?}: request_message cannot be set unless the connection is manual",
                name
            )));
        }

        let target = match (&connection.target_id, &connection.target_alias) {
            (Some(id), None) => ResourceId::parse_insensitively(id)
                .map(ConnectionTarget::Resource)
                .map_err(|e| self.invalid(format!("service connection {:?} target: {}", name, e)))?,
            (None, Some(alias)) if is_private_link_alias(alias) => {
                ConnectionTarget::Alias(alias.clone())
            }
            (None, Some(alias)) => {
                return Err(self.invalid(format!(
                    "service connection {:?}: {:?} is not a private link service alias",
                    name, alias
                )));
            }
            _ => {
                return Err(self.invalid(format!(
                    "service connection {:?} needs exactly one of target_id and target_alias",
                    name
                )));
            }
        };

        if connection.auto_approve && target.resource().is_none() {
            return Err(self.invalid(format!(
                "service connection {:?}: auto_approve needs a target_id, the owner of an alias is unknown",
                name
            )));
        }
        Ok(target)
    }

    fn validate_dns_zone_group(&self, group: &PrivateDnsZoneGroup) -> Result<()> {
        if group.name.trim().is_empty() {
            return Err(self.invalid("private DNS zone group name must not be empty"));
        }
        if group.private_dns_zone_ids.is_empty() {
            return Err(self.invalid(format!(
                "private DNS zone group {:?} needs at least one zone",
                group.name
            )));
        }
        for raw in &group.private_dns_zone_ids {
            let zone = ResourceId::parse_insensitively(raw)
                .map_err(|e| self.invalid(format!("private DNS zone: {}", e)))?;
            if !zone.is_type(PRIVATE_DNS_ZONE_TYPE) {
                return Err(self.invalid(format!(
                    "{} is not a private DNS zone",
                    zone
                )));
            }
        }
        Ok(())
    }

    /// Id of the requested DNS zone group, if any
    pub fn dns_zone_group_id(&self) -> Option<ResourceId> {
        self.private_dns_zone_group
            .as_ref()
            .map(|group| self.id.child(DNS_ZONE_GROUPS, &group.name))
    }

    /// Request body for the remote API
    pub fn to_body(&self) -> Value {
        let expand = |manual: bool| -> Vec<Value> {
            self.connections
                .iter()
                .filter(|c| c.is_manual == manual)
                .map(|c| {
                    let mut properties = json!({
                        "privateLinkServiceId": c.service_id(),
                        "groupIds": c.subresource_names,
                    });
                    if let Some(message) = c.request_message.as_deref().filter(|_| manual) {
                        properties["requestMessage"] = json!(message);
                    }
                    json!({ "name": c.name, "properties": properties })
                })
                .collect()
        };

        json!({
            "location": self.location,
            "tags": self.tags,
            "properties": {
                "subnet": { "id": self.subnet_id },
                "privateLinkServiceConnections": expand(false),
                "manualPrivateLinkServiceConnections": expand(true),
            }
        })
    }
}

/// Targets referenced by an existing endpoint document
///
/// Ids that do not parse (private link aliases) are skipped.
pub fn connection_targets(object: &Value) -> Vec<ResourceId> {
    ["privateLinkServiceConnections", "manualPrivateLinkServiceConnections"]
        .iter()
        .filter_map(|key| object.pointer(&format!("/properties/{}", key)))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|c| c.pointer("/properties/privateLinkServiceId"))
        .filter_map(Value::as_str)
        .filter_map(|raw| ResourceId::parse_insensitively(raw).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBNET: &str = "/subscriptions/0000/resourceGroups/network/providers/Microsoft.Network/virtualNetworks/vnet1/subnets/default";
    const ACCOUNT: &str = "/subscriptions/0000/resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/acct1";
    const ZONE: &str = "/subscriptions/0000/resourceGroups/dns/providers/Microsoft.Network/privateDnsZones/privatelink.blob.core.windows.net";
    const ALIAS: &str = "myservice.00000000-0000-0000-0000-000000000000.westeurope.azure.privatelinkservice";

    fn request(connections: Vec<ServiceConnection>) -> PrivateEndpointRequest {
        PrivateEndpointRequest {
            id: ResourceId::parse(
                "/subscriptions/0000/resourceGroups/network/providers/Microsoft.Network/privateEndpoints/pe1",
            )
            .unwrap(),
            location: "westeurope".to_string(),
            subnet_id: SUBNET.to_string(),
            connections,
            private_dns_zone_group: None,
            tags: BTreeMap::new(),
        }
    }

    fn connection(name: &str, is_manual: bool, message: Option<&str>) -> ServiceConnection {
        ServiceConnection {
            name: name.to_string(),
            target_id: Some(ACCOUNT.to_string()),
            target_alias: None,
            subresource_names: vec!["blob".to_string()],
            is_manual,
            request_message: message.map(str::to_string),
            auto_approve: false,
        }
    }

    fn alias_connection() -> ServiceConnection {
        let mut c = connection("c1", false, None);
        c.target_id = None;
        c.target_alias = Some(ALIAS.to_string());
        c
    }

    #[test]
    fn test_validate_parses_targets() {
        let targets = request(vec![connection("c1", false, None)]).validate().unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].resource().unwrap().to_string(), ACCOUNT);
    }

    #[test]
    fn test_manual_connection_requires_message() {
        let err = request(vec![connection("c1", true, Some("  "))])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("request_message"));

        assert!(
            request(vec![connection("c1", true, Some("please"))])
                .validate()
                .is_ok()
        );

        let long = "x".repeat(141);
        assert!(request(vec![connection("c1", true, Some(&long))]).validate().is_err());
    }

    #[test]
    fn test_message_rejected_on_automatic_connection() {
        let err = request(vec![connection("c1", false, Some("please"))])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("cannot be set unless the connection is manual"));
    }

    #[test]
    fn test_single_connection_only() {
        let err = request(vec![
            connection("c1", false, None),
            connection("c2", false, None),
        ])
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("single service connection"));
        assert!(request(vec![]).validate().is_err());
    }

    #[test]
    fn test_invalid_target_is_rejected() {
        let mut bad = connection("c1", false, None);
        bad.target_id = Some("acct1".to_string());
        assert!(matches!(
            request(vec![bad]).validate(),
            Err(ProvisionError::InvalidRequest { .. })
        ));

        let mut both = alias_connection();
        both.target_id = Some(ACCOUNT.to_string());
        assert!(request(vec![both]).validate().is_err());
    }

    #[test]
    fn test_alias_target() {
        let targets = request(vec![alias_connection()]).validate().unwrap();
        assert_eq!(targets[0], ConnectionTarget::Alias(ALIAS.to_string()));

        let body = request(vec![alias_connection()]).to_body();
        assert_eq!(
            body["properties"]["privateLinkServiceConnections"][0]["properties"]["privateLinkServiceId"],
            ALIAS
        );
        assert!(connection_targets(&body).is_empty());

        let mut bad = alias_connection();
        bad.target_alias = Some("myservice.azure.privatelinkservice".to_string());
        assert!(request(vec![bad]).validate().is_err());
    }

    #[test]
    fn test_auto_approve_needs_resource_target() {
        let mut c = alias_connection();
        c.auto_approve = true;
        let err = request(vec![c]).validate().unwrap_err();
        assert!(err.to_string().contains("auto_approve"));
    }

    #[test]
    fn test_dns_zone_group_validation() {
        let mut req = request(vec![connection("c1", false, None)]);
        req.private_dns_zone_group = Some(PrivateDnsZoneGroup {
            name: "default".to_string(),
            private_dns_zone_ids: vec![ACCOUNT.to_string()],
        });
        assert!(req.validate().unwrap_err().to_string().contains("not a private DNS zone"));

        req.private_dns_zone_group = Some(PrivateDnsZoneGroup {
            name: "default".to_string(),
            private_dns_zone_ids: vec![ZONE.to_string()],
        });
        assert!(req.validate().is_ok());
        assert_eq!(
            req.dns_zone_group_id().unwrap().to_string(),
            format!("{}/privateDnsZoneGroups/default", req.id)
        );
    }

    #[test]
    fn test_dns_zone_group_body_and_match() {
        let group = PrivateDnsZoneGroup {
            name: "default".to_string(),
            private_dns_zone_ids: vec![ZONE.to_string()],
        };
        let mut document = group.to_body();
        let config = &document["properties"]["privateDnsZoneConfigs"][0];
        assert_eq!(config["name"], "privatelink.blob.core.windows.net");
        assert_eq!(config["properties"]["privateDnsZoneId"], ZONE);

        document["name"] = json!("default");
        assert!(group.matches(&document));
        document["name"] = json!("other");
        assert!(!group.matches(&document));
    }

    #[test]
    fn test_body_for_manual_connection() {
        let body = request(vec![connection("manual", true, Some("please"))]).to_body();

        let auto = &body["properties"]["privateLinkServiceConnections"];
        let manual = &body["properties"]["manualPrivateLinkServiceConnections"];
        assert!(auto.as_array().unwrap().is_empty());
        assert_eq!(manual[0]["name"], "manual");
        assert_eq!(manual[0]["properties"]["requestMessage"], "please");
        assert_eq!(body["properties"]["subnet"]["id"], SUBNET);
    }

    #[test]
    fn test_connection_targets_from_document() {
        let body = request(vec![connection("manual", true, Some("please"))]).to_body();
        let targets = connection_targets(&body);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].to_string(), ACCOUNT);
    }
}
