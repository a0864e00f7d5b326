//! Private endpoint provisioner
//!
//! Drives a private endpoint through its lifecycle against the remote API:
//!
//! - **create**: validate, check for an existing object, lock the target
//!   resources, create, wait for "Succeeded", attach the DNS zone group,
//!   then approve the connections flagged `auto_approve`
//! - **read**: fetch the object, `None` when it is gone
//! - **update**: fetch, lock, replace the endpoint keeping its application
//!   security groups, wait for "Succeeded", replace a changed DNS zone group
//! - **delete**: lock the target resources, delete the DNS zone groups, then
//!   the endpoint, and wait until it is gone
//!
//! Target resources are locked for the whole mutation so that concurrent
//! operations against one target (which all append to its connection list)
//! run one at a time. Alias targets have no known owner and are not locked.
//! Locks are released on every exit path.

use crate::error::Result;
use crate::phase::{PhaseTracker, ProvisionPhase};
use crate::request::{ConnectionTarget, DNS_ZONE_GROUPS, PrivateEndpointRequest, connection_targets};
use armflow_approval::{ApprovalDispatcher, ApprovalSettings, ApprovedConnection};
use armflow_cloud::{
    CloudError, LockRegistry, Observation, ReconcileSpec, ResourceClient, ResourceId,
    provisioning_state, reconcile,
};
use armflow_config::Settings;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;

const PENDING_CREATE: [&str; 3] = ["Creating", "Provisioning", "Updating"];
const SUCCEEDED: &str = "Succeeded";
const PENDING_DELETE: [&str; 3] = ["Deleting", "Succeeded", "Updating"];
const APPLICATION_SECURITY_GROUPS: &str = "applicationSecurityGroups";

/// A private endpoint that reached its target phase
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedEndpoint {
    pub id: ResourceId,
    pub phase: ProvisionPhase,
    /// The object as last observed
    pub object: Value,
    #[serde(skip)]
    pub approvals: Vec<ApprovedConnection>,
    pub provisioned_at: DateTime<Utc>,
}

pub struct PrivateEndpointProvisioner {
    client: Arc<dyn ResourceClient>,
    locks: Arc<LockRegistry>,
    approvals: ApprovalDispatcher,
    settings: Settings,
}

fn lock_names<'a>(targets: impl IntoIterator<Item = &'a ResourceId>) -> Vec<String> {
    targets
        .into_iter()
        .map(|target| target.top_level().lock_key())
        .collect()
}

impl PrivateEndpointProvisioner {
    pub fn new(client: Arc<dyn ResourceClient>, locks: Arc<LockRegistry>, settings: Settings) -> Self {
        let approvals = ApprovalDispatcher::new(client.clone(), ApprovalSettings::from(&settings));
        Self {
            client,
            locks,
            approvals,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn convergence(&self, spec: ReconcileSpec) -> ReconcileSpec {
        let polling = &self.settings.polling;
        spec.with_min_interval(polling.min_interval())
            .with_poll_interval(polling.poll_interval())
            .with_continuous_target_occurrence(polling.continuous_target_occurrence)
            .with_not_found_checks(polling.not_found_checks)
    }

    /// Fetch `id` as a reconcile observation
    async fn observe(&self, id: &ResourceId) -> armflow_cloud::Result<Observation<Value>> {
        match self.client.get(id).await {
            Ok(object) => {
                let state = provisioning_state(&object).unwrap_or_default().to_string();
                Ok(Observation::found(object, state))
            }
            Err(e) if e.is_not_found() => Ok(Observation::Gone),
            Err(e) => Err(e),
        }
    }

    /// Wait for `id` to report "Succeeded"
    async fn converge(&self, id: &ResourceId, deadline: Instant) -> armflow_cloud::Result<Value> {
        let spec = self.convergence(ReconcileSpec::new(PENDING_CREATE, [SUCCEEDED], deadline));
        let observed = reconcile(&spec, || self.observe(id)).await?;
        Ok(observed.into_object().unwrap_or_default())
    }

    async fn wait_gone(&self, id: &ResourceId, deadline: Instant) -> armflow_cloud::Result<()> {
        let spec = self.convergence(ReconcileSpec::until_gone(PENDING_DELETE, deadline));
        reconcile(&spec, || self.observe(id)).await?;
        Ok(())
    }

    /// Validate `request` and make sure every auto-approved target is supported
    fn precheck(
        &self,
        request: &PrivateEndpointRequest,
        phase: &PhaseTracker<'_>,
    ) -> Result<Vec<ConnectionTarget>> {
        let targets = request.validate()?;
        for (connection, target) in request.connections.iter().zip(&targets) {
            if let (true, Some(target)) = (connection.auto_approve, target.resource()) {
                self.approvals.select(target).map_err(|e| phase.fail(e))?;
            }
        }
        Ok(targets)
    }

    /// Create the endpoint and approve its flagged connections
    pub async fn create(&self, request: &PrivateEndpointRequest) -> Result<ProvisionedEndpoint> {
        let deadline = Instant::now() + self.settings.timeouts.create();
        let mut phase = PhaseTracker::new(&request.id);
        let targets = self.precheck(request, &phase)?;

        match self.client.get(&request.id).await {
            Ok(_) => return Err(phase.fail(CloudError::AlreadyExists(request.id.to_string()))),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(phase.fail(e)),
        }

        let names = lock_names(targets.iter().filter_map(ConnectionTarget::resource));
        let locks = self.locks.lock_multiple(&names).await;
        let result = self
            .create_locked(request, &targets, deadline, &mut phase)
            .await;
        locks.unlock();
        result
    }

    async fn create_locked(
        &self,
        request: &PrivateEndpointRequest,
        targets: &[ConnectionTarget],
        deadline: Instant,
        phase: &mut PhaseTracker<'_>,
    ) -> Result<ProvisionedEndpoint> {
        let id = &request.id;

        phase.advance(ProvisionPhase::Creating);
        self.client
            .create_or_update(id, &request.to_body())
            .await
            .map_err(|e| phase.fail(e))?;
        let object = self.converge(id, deadline).await.map_err(|e| phase.fail(e))?;
        self.create_dns_zone_group(request, deadline)
            .await
            .map_err(|e| phase.fail(e))?;
        phase.advance(ProvisionPhase::Provisioned);

        self.approve(request, targets, object, deadline, phase).await
    }

    /// Replace the endpoint with `request`
    ///
    /// Application security groups associated out of band are kept. The DNS
    /// zone group is deleted and recreated only when it changed.
    pub async fn update(&self, request: &PrivateEndpointRequest) -> Result<ProvisionedEndpoint> {
        let deadline = Instant::now() + self.settings.timeouts.update();
        let mut phase = PhaseTracker::new(&request.id);
        let targets = self.precheck(request, &phase)?;

        let existing = self
            .client
            .get(&request.id)
            .await
            .map_err(|e| phase.fail(e))?;

        let previous = connection_targets(&existing);
        let names = lock_names(
            targets
                .iter()
                .filter_map(ConnectionTarget::resource)
                .chain(&previous),
        );
        let locks = self.locks.lock_multiple(&names).await;
        let result = self
            .update_locked(request, &existing, &targets, deadline, &mut phase)
            .await;
        locks.unlock();
        result
    }

    async fn update_locked(
        &self,
        request: &PrivateEndpointRequest,
        existing: &Value,
        targets: &[ConnectionTarget],
        deadline: Instant,
        phase: &mut PhaseTracker<'_>,
    ) -> Result<ProvisionedEndpoint> {
        let id = &request.id;

        phase.advance(ProvisionPhase::Updating);
        let mut body = request.to_body();
        if let Some(groups) = existing.pointer(&format!("/properties/{}", APPLICATION_SECURITY_GROUPS)) {
            body["properties"][APPLICATION_SECURITY_GROUPS] = groups.clone();
        }
        self.client
            .create_or_update(id, &body)
            .await
            .map_err(|e| phase.fail(e))?;
        let object = self.converge(id, deadline).await.map_err(|e| phase.fail(e))?;
        self.replace_dns_zone_group(request, deadline)
            .await
            .map_err(|e| phase.fail(e))?;
        phase.advance(ProvisionPhase::Provisioned);

        self.approve(request, targets, object, deadline, phase).await
    }

    /// Approve the flagged connections of a provisioned endpoint
    async fn approve(
        &self,
        request: &PrivateEndpointRequest,
        targets: &[ConnectionTarget],
        mut object: Value,
        deadline: Instant,
        phase: &mut PhaseTracker<'_>,
    ) -> Result<ProvisionedEndpoint> {
        let id = &request.id;

        let mut approvals = Vec::new();
        for (connection, target) in request.connections.iter().zip(targets) {
            let Some(target) = target.resource().filter(|_| connection.auto_approve) else {
                continue;
            };
            phase.advance(ProvisionPhase::Approving);
            let approved = self
                .approvals
                .approve_connection(id, target, id.name(), deadline)
                .await
                .map_err(|e| phase.fail(e))?;
            approvals.push(approved);
        }

        if !approvals.is_empty() {
            phase.advance(ProvisionPhase::Approved);
            object = self.client.get(id).await.map_err(|e| phase.fail(e))?;
        }

        Ok(ProvisionedEndpoint {
            id: id.clone(),
            phase: phase.phase(),
            object,
            approvals,
            provisioned_at: Utc::now(),
        })
    }

    /// Create the requested DNS zone group, if any, and wait for it
    async fn create_dns_zone_group(
        &self,
        request: &PrivateEndpointRequest,
        deadline: Instant,
    ) -> armflow_cloud::Result<()> {
        let (Some(group), Some(group_id)) = (&request.private_dns_zone_group, request.dns_zone_group_id())
        else {
            return Ok(());
        };
        tracing::info!("Creating DNS zone group {}", group_id);
        self.client
            .create_or_update(&group_id, &group.to_body())
            .await?;
        self.converge(&group_id, deadline).await?;
        Ok(())
    }

    /// DNS zone groups currently attached to `endpoint`
    async fn dns_zone_groups(&self, endpoint: &ResourceId) -> armflow_cloud::Result<Vec<Value>> {
        match self.client.list(endpoint, DNS_ZONE_GROUPS).await {
            Ok(groups) => Ok(groups),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn delete_dns_zone_groups(
        &self,
        groups: &[Value],
        deadline: Instant,
    ) -> armflow_cloud::Result<()> {
        for group in groups {
            let Some(raw) = group.get("id").and_then(Value::as_str) else {
                continue;
            };
            let group_id = ResourceId::parse_insensitively(raw)?;
            tracing::info!("Deleting DNS zone group {}", group_id);
            self.client.delete(&group_id).await?;
            self.wait_gone(&group_id, deadline).await?;
        }
        Ok(())
    }

    /// An endpoint has at most one DNS zone group, so a change is a delete
    /// followed by a create
    async fn replace_dns_zone_group(
        &self,
        request: &PrivateEndpointRequest,
        deadline: Instant,
    ) -> armflow_cloud::Result<()> {
        let existing = self.dns_zone_groups(&request.id).await?;
        let unchanged = match &request.private_dns_zone_group {
            Some(group) => existing.len() == 1 && group.matches(&existing[0]),
            None => existing.is_empty(),
        };
        if unchanged {
            tracing::debug!("DNS zone group of {} is unchanged", request.id);
            return Ok(());
        }
        self.delete_dns_zone_groups(&existing, deadline).await?;
        self.create_dns_zone_group(request, deadline).await
    }

    /// Fetch the endpoint; `None` when it no longer exists
    pub async fn read(&self, id: &ResourceId) -> Result<Option<Value>> {
        let timeout = self.settings.timeouts.read();
        let phase = PhaseTracker::new(id);

        let fetched = tokio::time::timeout(timeout, self.client.get(id))
            .await
            .map_err(|_| {
                phase.fail(CloudError::Timeout {
                    timeout,
                    last_state: None,
                    target: Vec::new(),
                })
            })?;

        match fetched {
            Ok(object) => Ok(Some(object)),
            Err(e) if e.is_not_found() => {
                tracing::info!("{} is gone", id);
                Ok(None)
            }
            Err(e) => Err(phase.fail(e)),
        }
    }

    /// Delete the endpoint and wait until it is gone
    ///
    /// Deleting an endpoint that does not exist succeeds.
    pub async fn delete(&self, id: &ResourceId) -> Result<()> {
        let deadline = Instant::now() + self.settings.timeouts.delete();
        let mut phase = PhaseTracker::new(id);

        let existing = match self.client.get(id).await {
            Ok(object) => object,
            Err(e) if e.is_not_found() => {
                tracing::info!("{} is already gone", id);
                return Ok(());
            }
            Err(e) => return Err(phase.fail(e)),
        };

        let names = lock_names(&connection_targets(&existing));
        let locks = self.locks.lock_multiple(&names).await;
        let result = self.delete_locked(id, deadline, &mut phase).await;
        locks.unlock();
        result
    }

    async fn delete_locked(
        &self,
        id: &ResourceId,
        deadline: Instant,
        phase: &mut PhaseTracker<'_>,
    ) -> Result<()> {
        phase.advance(ProvisionPhase::Deleting);
        let groups = self.dns_zone_groups(id).await.map_err(|e| phase.fail(e))?;
        self.delete_dns_zone_groups(&groups, deadline)
            .await
            .map_err(|e| phase.fail(e))?;

        self.client.delete(id).await.map_err(|e| phase.fail(e))?;
        self.wait_gone(id, deadline).await.map_err(|e| phase.fail(e))?;

        phase.advance(ProvisionPhase::Deleted);
        Ok(())
    }
}
