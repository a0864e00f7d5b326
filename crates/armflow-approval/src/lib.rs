//! Private endpoint connection approval for armflow
//!
//! After a private endpoint is provisioned against a target resource, the
//! target's service holds a connection record in the "Pending" state. This
//! crate finds that record and approves it. Every backend service stores and
//! mutates these records differently, so each supported provider family has
//! its own [`ApprovalStrategy`], selected by the target's provider namespace.
//!
//! # Supported Providers
//!
//! - **Storage** (`Microsoft.Storage`): child collection, PUT
//! - **Key Vault** (`Microsoft.KeyVault`): embedded in the vault, PATCH
//! - **SQL** (`Microsoft.Sql`): child collection, PATCH
//! - **Cosmos DB** (`Microsoft.DocumentDB`): child collection, PUT with group id
//! - **App Service** (`Microsoft.Web`): child collection, PUT
//!
//! Any other namespace fails with `CloudError::UnsupportedProvider`.
//!
//! # Example
//!
//! ```ignore
//! use armflow_approval::{ApprovalDispatcher, ApprovalSettings};
//!
//! let dispatcher = ApprovalDispatcher::new(client, ApprovalSettings::default());
//! let approved = dispatcher
//!     .approve_connection(&endpoint_id, &storage_account_id, "pe1", deadline)
//!     .await?;
//! assert!(approved.record.is_approved());
//! ```

pub mod backends;
pub mod dispatcher;
pub mod family;
pub mod record;
pub mod strategy;

pub use backends::strategy_for;
pub use dispatcher::{ApprovalDispatcher, ApprovalSettings, ApprovedConnection};
pub use family::ProviderFamily;
pub use record::{ConnectionRecord, NameComparison, STATUS_APPROVED, STATUS_PENDING};
pub use strategy::ApprovalStrategy;
