//! Remote resource client trait definition

use crate::error::Result;
use crate::id::ResourceId;
use async_trait::async_trait;
use serde_json::Value;

/// Client for the remote resource-management API
///
/// Implementations own transport, authentication and retries of transient
/// transport failures. Objects travel as raw JSON documents; the provisioning
/// core only reads the handful of fields it needs to converge.
///
/// A missing object must be reported as [`CloudError::NotFound`] so callers
/// can tell an existence check apart from a failing request.
///
/// [`CloudError::NotFound`]: crate::error::CloudError::NotFound
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Fetch a single object
    async fn get(&self, id: &ResourceId) -> Result<Value>;

    /// List the children of `parent` of the given type
    /// (e.g. `privateEndpointConnections`)
    async fn list(&self, parent: &ResourceId, child_type: &str) -> Result<Vec<Value>>;

    /// Create or fully replace an object (PUT)
    async fn create_or_update(&self, id: &ResourceId, body: &Value) -> Result<Value>;

    /// Partially update an object (PATCH)
    async fn update(&self, id: &ResourceId, patch: &Value) -> Result<Value>;

    /// Delete an object. The removal may complete asynchronously.
    async fn delete(&self, id: &ResourceId) -> Result<()>;
}

/// Read `properties.provisioningState` from an object
pub fn provisioning_state(object: &Value) -> Option<&str> {
    object
        .pointer("/properties/provisioningState")
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provisioning_state() {
        let object = json!({ "properties": { "provisioningState": "Succeeded" } });
        assert_eq!(provisioning_state(&object), Some("Succeeded"));
        assert_eq!(provisioning_state(&json!({})), None);
    }
}
