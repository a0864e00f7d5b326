//! Provider families that can approve private endpoint connections

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend service family, discriminated by provider namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderFamily {
    /// `Microsoft.Storage`
    Storage,
    /// `Microsoft.KeyVault`
    KeyVault,
    /// `Microsoft.Sql`
    Sql,
    /// `Microsoft.DocumentDB`
    CosmosDb,
    /// `Microsoft.Web`
    AppService,
    /// Any namespace without an approval strategy
    Unknown(String),
}

impl ProviderFamily {
    /// Every family with an approval strategy
    pub const SUPPORTED: [ProviderFamily; 5] = [
        ProviderFamily::Storage,
        ProviderFamily::KeyVault,
        ProviderFamily::Sql,
        ProviderFamily::CosmosDb,
        ProviderFamily::AppService,
    ];

    /// Classify a provider namespace (case-insensitive)
    pub fn from_namespace(namespace: &str) -> Self {
        Self::SUPPORTED
            .into_iter()
            .find(|family| family.namespace().eq_ignore_ascii_case(namespace))
            .unwrap_or_else(|| ProviderFamily::Unknown(namespace.to_string()))
    }

    pub fn namespace(&self) -> &str {
        match self {
            ProviderFamily::Storage => "Microsoft.Storage",
            ProviderFamily::KeyVault => "Microsoft.KeyVault",
            ProviderFamily::Sql => "Microsoft.Sql",
            ProviderFamily::CosmosDb => "Microsoft.DocumentDB",
            ProviderFamily::AppService => "Microsoft.Web",
            ProviderFamily::Unknown(namespace) => namespace,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, ProviderFamily::Unknown(_))
    }

    pub fn supported_namespaces() -> Vec<String> {
        Self::SUPPORTED
            .iter()
            .map(|family| family.namespace().to_string())
            .collect()
    }
}

impl fmt::Display for ProviderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_namespace_ignores_case() {
        assert_eq!(
            ProviderFamily::from_namespace("microsoft.storage"),
            ProviderFamily::Storage
        );
        assert_eq!(
            ProviderFamily::from_namespace("Microsoft.DocumentDB"),
            ProviderFamily::CosmosDb
        );
        assert_eq!(
            ProviderFamily::from_namespace("MICROSOFT.WEB"),
            ProviderFamily::AppService
        );
    }

    #[test]
    fn test_unknown_namespace() {
        let family = ProviderFamily::from_namespace("Microsoft.Cache");
        assert_eq!(family, ProviderFamily::Unknown("Microsoft.Cache".to_string()));
        assert!(!family.is_supported());
        assert_eq!(family.to_string(), "Microsoft.Cache");
    }

    #[test]
    fn test_supported_namespaces() {
        let supported = ProviderFamily::supported_namespaces();
        assert_eq!(supported.len(), 5);
        assert!(supported.contains(&"Microsoft.KeyVault".to_string()));
    }
}
