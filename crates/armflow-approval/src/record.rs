//! Private endpoint connection records

use armflow_cloud::{CloudError, ResourceId, Result};
use serde_json::{Value, json};

pub const STATUS_PENDING: &str = "Pending";
pub const STATUS_APPROVED: &str = "Approved";

/// How a backend compares private endpoint names
///
/// Backends disagree on whether the endpoint name they echo back keeps the
/// caller's casing, so each strategy names its rule explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameComparison {
    Exact,
    CaseInsensitive,
}

impl NameComparison {
    pub fn matches(&self, left: &str, right: &str) -> bool {
        match self {
            NameComparison::Exact => left == right,
            NameComparison::CaseInsensitive => left.eq_ignore_ascii_case(right),
        }
    }
}

/// A connection record as listed by a backend
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    pub id: ResourceId,
    /// Raw id of the private endpoint on the other side, if any
    pub private_endpoint_id: Option<String>,
    pub status: String,
    /// The document as returned by the backend
    pub raw: Value,
}

impl ConnectionRecord {
    /// Read a record in the common
    /// `properties.privateEndpoint.id` / `properties.privateLinkServiceConnectionState`
    /// layout
    pub fn from_value(raw: Value) -> Result<Self> {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| CloudError::invalid_id(raw.to_string(), "connection record has no id"))?;
        let id = ResourceId::parse_insensitively(id)?;

        let private_endpoint_id = raw
            .pointer("/properties/privateEndpoint/id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let status = raw
            .pointer("/properties/privateLinkServiceConnectionState/status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            id,
            private_endpoint_id,
            status,
            raw,
        })
    }

    /// Name of the private endpoint this record belongs to
    ///
    /// `None` when the record carries no endpoint; an endpoint id that does
    /// not parse is an error.
    pub fn endpoint_name(&self) -> Result<Option<String>> {
        self.private_endpoint_id
            .as_deref()
            .map(|raw| ResourceId::parse_insensitively(raw).map(|id| id.name().to_string()))
            .transpose()
    }

    pub fn is_approved(&self) -> bool {
        self.status == STATUS_APPROVED
    }
}

/// `privateLinkServiceConnectionState` body marking a connection approved
pub fn approved_state(description: &str) -> Value {
    json!({
        "status": STATUS_APPROVED,
        "description": description,
    })
}
