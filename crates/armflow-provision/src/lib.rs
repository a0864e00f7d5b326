//! Private endpoint provisioning for armflow
//!
//! Ties the core building blocks together: a [`PrivateEndpointRequest`] is
//! validated, its target resources are locked through the shared
//! [`LockRegistry`](armflow_cloud::LockRegistry), the endpoint is created and
//! reconciled to "Succeeded", and connections flagged `auto_approve` are
//! handed to the [`ApprovalDispatcher`](armflow_approval::ApprovalDispatcher).
//!
//! # Example
//!
//! ```ignore
//! use armflow_cloud::LockRegistry;
//! use armflow_provision::PrivateEndpointProvisioner;
//! use std::sync::Arc;
//!
//! let settings = armflow_config::load_settings()?;
//! let provisioner = PrivateEndpointProvisioner::new(client, Arc::new(LockRegistry::new()), settings);
//!
//! let endpoint = provisioner.create(&request).await?;
//! println!("{} is {}", endpoint.id, endpoint.phase);
//! ```

pub mod error;
pub mod phase;
pub mod provisioner;
pub mod request;

pub use error::{ProvisionError, Result};
pub use phase::ProvisionPhase;
pub use provisioner::{PrivateEndpointProvisioner, ProvisionedEndpoint};
pub use request::{
    ConnectionTarget, PrivateDnsZoneGroup, PrivateEndpointRequest, ServiceConnection,
    connection_targets, is_private_link_alias,
};
