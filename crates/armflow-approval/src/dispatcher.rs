//! Approval dispatcher
//!
//! Completes the handshake for a freshly provisioned private endpoint:
//!
//! 1. classify the target's provider namespace into a [`ProviderFamily`]
//! 2. select that family's strategy, or fail with `UnsupportedProvider`
//! 3. list the target's connection records
//! 4. match the first record whose endpoint name equals the expected one
//! 5. approve it (once; a failure is returned, never retried)
//! 6. reconcile the record from "Pending" to "Approved"

use crate::backends::strategy_for;
use crate::family::ProviderFamily;
use crate::record::{ConnectionRecord, STATUS_APPROVED, STATUS_PENDING};
use crate::strategy::ApprovalStrategy;
use armflow_cloud::{
    CloudError, Observation, ReconcileSpec, ResourceClient, ResourceId, Result, reconcile,
};
use armflow_config::Settings;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Tuning for the dispatcher
#[derive(Debug, Clone)]
pub struct ApprovalSettings {
    /// Audit description written on approved records
    pub description: String,
    pub min_interval: Duration,
    pub poll_interval: Option<Duration>,
    pub continuous_target_occurrence: u32,
}

impl From<&Settings> for ApprovalSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            description: settings.approval.description.clone(),
            min_interval: settings.polling.min_interval(),
            poll_interval: settings.polling.poll_interval(),
            continuous_target_occurrence: settings.polling.continuous_target_occurrence,
        }
    }
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// Outcome of a completed approval
#[derive(Debug, Clone)]
pub struct ApprovedConnection {
    pub family: ProviderFamily,
    /// The record as last observed, in the approved state
    pub record: ConnectionRecord,
}

/// Dispatches approvals to the strategy of the target's provider family
pub struct ApprovalDispatcher {
    client: Arc<dyn ResourceClient>,
    settings: ApprovalSettings,
}

impl ApprovalDispatcher {
    pub fn new(client: Arc<dyn ResourceClient>, settings: ApprovalSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> &ApprovalSettings {
        &self.settings
    }

    /// Select the strategy for `target`
    pub fn select(&self, target: &ResourceId) -> Result<&'static dyn ApprovalStrategy> {
        let family = ProviderFamily::from_namespace(target.provider_namespace());
        strategy_for(&family).ok_or_else(|| CloudError::UnsupportedProvider {
            namespace: family.namespace().to_string(),
            supported: ProviderFamily::supported_namespaces(),
        })
    }

    /// Approve the connection between `endpoint` (named `endpoint_name`) and
    /// `target`, and wait until the backend reports it approved.
    pub async fn approve_connection(
        &self,
        endpoint: &ResourceId,
        target: &ResourceId,
        endpoint_name: &str,
        deadline: Instant,
    ) -> Result<ApprovedConnection> {
        let strategy = self.select(target)?;
        let family = strategy.family();
        tracing::info!(
            "Approving connection of {} on {} ({})",
            endpoint,
            target,
            family
        );

        let client = self.client.as_ref();
        let records = strategy.list(client, target).await?;
        let record = find_match(strategy, &records, endpoint_name)?.ok_or_else(|| {
            CloudError::NoMatchingConnection {
                endpoint: endpoint_name.to_string(),
                target: target.to_string(),
            }
        })?;
        tracing::debug!("Matched connection {} ({})", record.id, record.status);

        if record.is_approved() {
            tracing::debug!("Connection {} is already approved", record.id);
        } else {
            strategy
                .approve(client, target, record, &self.settings.description)
                .await?;
        }

        let spec = ReconcileSpec::new([STATUS_PENDING], [STATUS_APPROVED], deadline)
            .with_min_interval(self.settings.min_interval)
            .with_poll_interval(self.settings.poll_interval)
            .with_continuous_target_occurrence(self.settings.continuous_target_occurrence);

        let record_id = record.id.clone();
        let observed = reconcile(&spec, || {
            let record_id = record_id.clone();
            async move {
                let records = strategy.list(client, target).await?;
                Ok::<_, CloudError>(match records.into_iter().find(|r| r.id == record_id) {
                    Some(record) => {
                        let status = record.status.clone();
                        Observation::found(record, status)
                    }
                    None => Observation::Gone,
                })
            }
        })
        .await?;

        let record = observed
            .into_object()
            .ok_or_else(|| CloudError::NotFound(record_id.to_string()))?;
        tracing::info!("Connection {} approved", record.id);

        Ok(ApprovedConnection { family, record })
    }
}

/// First record whose endpoint name matches under the strategy's policy
///
/// A record whose endpoint id does not parse is skipped; its error is
/// returned only when no other record matches.
fn find_match<'a>(
    strategy: &dyn ApprovalStrategy,
    records: &'a [ConnectionRecord],
    endpoint_name: &str,
) -> Result<Option<&'a ConnectionRecord>> {
    let policy = strategy.name_comparison();
    let mut unparseable = None;
    for record in records {
        let name = match record.endpoint_name() {
            Ok(Some(name)) => name,
            Ok(None) => continue,
            Err(e) => {
                tracing::debug!("Skipping connection {}: {}", record.id, e);
                unparseable.get_or_insert(e);
                continue;
            }
        };
        if policy.matches(&name, endpoint_name) {
            return Ok(Some(record));
        }
    }
    match unparseable {
        Some(e) => Err(e),
        None => Ok(None),
    }
}
