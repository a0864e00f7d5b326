//! Resource identifiers and scopes
//!
//! Identifiers follow the resource manager path layout:
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}[/{type}/{name}...]
//! ```
//!
//! The fixed keys (`subscriptions`, `resourceGroups`, `providers`) and the
//! resource type segments are case-insensitive: two ids that differ only in
//! the casing of those keys are equal. Names are compared exactly.

use crate::error::{CloudError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const SUBSCRIPTIONS: &str = "subscriptions";
const RESOURCE_GROUPS: &str = "resourceGroups";
const PROVIDERS: &str = "providers";

/// A `{type}/{name}` pair below the provider namespace
#[derive(Debug, Clone)]
pub struct Segment {
    pub resource_type: String,
    pub name: String,
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.resource_type.eq_ignore_ascii_case(&other.resource_type) && self.name == other.name
    }
}

impl Eq for Segment {}

/// Subscription scope: `/subscriptions/{sub}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionId(pub String);

impl SubscriptionId {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self(subscription_id.into())
    }

    pub fn parse(input: &str) -> Result<Self> {
        let parts = split_path(input)?;
        if parts.len() != 2 {
            return Err(CloudError::invalid_id(input, "expected /subscriptions/{sub}"));
        }
        expect_key(input, parts[0], SUBSCRIPTIONS, false)?;
        Ok(Self::new(parts[1]))
    }

    pub fn resource_group(&self, name: impl Into<String>) -> ResourceGroupId {
        ResourceGroupId::new(&self.0, name)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", SUBSCRIPTIONS, self.0)
    }
}

/// Resource group scope: `/subscriptions/{sub}/resourceGroups/{rg}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroupId {
    pub subscription_id: String,
    pub resource_group: String,
}

impl ResourceGroupId {
    pub fn new(subscription_id: impl Into<String>, resource_group: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let parts = split_path(input)?;
        if parts.len() != 4 {
            return Err(CloudError::invalid_id(
                input,
                "expected /subscriptions/{sub}/resourceGroups/{rg}",
            ));
        }
        expect_key(input, parts[0], SUBSCRIPTIONS, false)?;
        expect_key(input, parts[2], RESOURCE_GROUPS, false)?;
        Ok(Self::new(parts[1], parts[3]))
    }

    /// Build a top-level resource id inside this resource group
    pub fn resource(
        &self,
        namespace: impl Into<String>,
        resource_type: impl Into<String>,
        name: impl Into<String>,
    ) -> ResourceId {
        ResourceId {
            subscription_id: self.subscription_id.clone(),
            resource_group: self.resource_group.clone(),
            namespace: namespace.into(),
            segments: vec![Segment {
                resource_type: resource_type.into(),
                name: name.into(),
            }],
        }
    }
}

impl fmt::Display for ResourceGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{}/{}/{}/{}",
            SUBSCRIPTIONS, self.subscription_id, RESOURCE_GROUPS, self.resource_group
        )
    }
}

/// Fully qualified identifier of a resource (possibly nested)
#[derive(Debug, Clone)]
pub struct ResourceId {
    subscription_id: String,
    resource_group: String,
    namespace: String,
    /// Never empty
    segments: Vec<Segment>,
}

impl ResourceId {
    /// Parse an id whose fixed keys use their canonical casing
    pub fn parse(input: &str) -> Result<Self> {
        Self::parse_with(input, false)
    }

    /// Parse an id accepting any casing of the fixed keys
    ///
    /// Some services echo ids back with `resourcegroups` or `Providers`;
    /// the parsed value always renders in canonical casing.
    pub fn parse_insensitively(input: &str) -> Result<Self> {
        Self::parse_with(input, true)
    }

    fn parse_with(input: &str, insensitive: bool) -> Result<Self> {
        let parts = split_path(input)?;
        if parts.len() < 8 || parts.len() % 2 != 0 {
            return Err(CloudError::invalid_id(
                input,
                "expected /subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}",
            ));
        }
        expect_key(input, parts[0], SUBSCRIPTIONS, insensitive)?;
        expect_key(input, parts[2], RESOURCE_GROUPS, insensitive)?;
        expect_key(input, parts[4], PROVIDERS, insensitive)?;

        let segments = parts[6..]
            .chunks(2)
            .map(|pair| Segment {
                resource_type: pair[0].to_string(),
                name: pair[1].to_string(),
            })
            .collect();

        Ok(Self {
            subscription_id: parts[1].to_string(),
            resource_group: parts[3].to_string(),
            namespace: parts[5].to_string(),
            segments,
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    pub fn subscription(&self) -> SubscriptionId {
        SubscriptionId::new(&self.subscription_id)
    }

    pub fn resource_group_id(&self) -> ResourceGroupId {
        ResourceGroupId::new(&self.subscription_id, &self.resource_group)
    }

    /// Provider namespace, e.g. `Microsoft.Storage`
    pub fn provider_namespace(&self) -> &str {
        &self.namespace
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Full type path, e.g. `Microsoft.Sql/servers/databases`
    pub fn resource_type(&self) -> String {
        let mut out = self.namespace.clone();
        for segment in &self.segments {
            out.push('/');
            out.push_str(&segment.resource_type);
        }
        out
    }

    /// Name of the innermost resource
    pub fn name(&self) -> &str {
        // segments is never empty
        &self.segments[self.segments.len() - 1].name
    }

    /// Whether this id is of the given full type (case-insensitive)
    pub fn is_type(&self, resource_type: &str) -> bool {
        self.resource_type().eq_ignore_ascii_case(resource_type)
    }

    /// The enclosing resource, or `None` for a top-level resource
    pub fn parent(&self) -> Option<ResourceId> {
        if self.segments.len() < 2 {
            return None;
        }
        let mut parent = self.clone();
        parent.segments.pop();
        Some(parent)
    }

    /// The outermost resource below the provider namespace
    pub fn top_level(&self) -> ResourceId {
        let mut top = self.clone();
        top.segments.truncate(1);
        top
    }

    pub fn child(&self, resource_type: impl Into<String>, name: impl Into<String>) -> ResourceId {
        let mut child = self.clone();
        child.segments.push(Segment {
            resource_type: resource_type.into(),
            name: name.into(),
        });
        child
    }

    /// Lower-cased canonical rendering, used as a lock name
    pub fn lock_key(&self) -> String {
        self.to_string().to_lowercase()
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.subscription_id == other.subscription_id
            && self.resource_group == other.resource_group
            && self.namespace.eq_ignore_ascii_case(&other.namespace)
            && self.segments == other.segments
    }
}

impl Eq for ResourceId {}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{}/{}/{}/{}/{}/{}",
            SUBSCRIPTIONS,
            self.subscription_id,
            RESOURCE_GROUPS,
            self.resource_group,
            PROVIDERS,
            self.namespace
        )?;
        for segment in &self.segments {
            write!(f, "/{}/{}", segment.resource_type, segment.name)?;
        }
        Ok(())
    }
}

impl FromStr for ResourceId {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ResourceId::parse_insensitively(&raw).map_err(serde::de::Error::custom)
    }
}

fn split_path(input: &str) -> Result<Vec<&str>> {
    let trimmed = input.trim();
    let Some(path) = trimmed.strip_prefix('/') else {
        return Err(CloudError::invalid_id(input, "must start with '/'"));
    };
    let path = path.strip_suffix('/').unwrap_or(path);
    let parts: Vec<&str> = path.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(CloudError::invalid_id(input, "contains an empty segment"));
    }
    Ok(parts)
}

fn expect_key(input: &str, found: &str, key: &str, insensitive: bool) -> Result<()> {
    let matches = if insensitive {
        found.eq_ignore_ascii_case(key)
    } else {
        found == key
    };
    if matches {
        Ok(())
    } else {
        Err(CloudError::invalid_id(
            input,
            format!("expected segment {:?}, found {:?}", key, found),
        ))
    }
}
