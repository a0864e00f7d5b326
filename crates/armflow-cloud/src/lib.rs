//! armflow cloud core
//!
//! The coordination layer shared by every armflow operation against the
//! remote resource-management API.
//!
//! # Components
//!
//! - **Identifiers**: [`ResourceId`] parsing and its [`SubscriptionId`] / [`ResourceGroupId`] scopes
//! - **Remote client**: the [`ResourceClient`] trait, plus the in-memory
//!   [`MemoryClient`]
//! - **Named locks**: [`LockRegistry`] serializes mutations of one resource
//! - **Reconciler**: [`reconcile`] waits for an object to converge
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │        armflow-provision / armflow-approval      │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 armflow-cloud                    │
//! │  ┌──────────────┐  ┌──────────────┐             │
//! │  │ LockRegistry │  │  reconcile   │             │
//! │  └──────────────┘  └──────┬───────┘             │
//! │  ┌──────────────┐  ┌──────▼───────┐             │
//! │  │  ResourceId  │  │ResourceClient│             │
//! │  └──────────────┘  └──────────────┘             │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod error;
pub mod id;
pub mod locks;
pub mod memory;
pub mod reconcile;

// Re-exports
pub use client::{ResourceClient, provisioning_state};
pub use error::{CloudError, Result};
pub use id::{ResourceGroupId, ResourceId, Segment, SubscriptionId};
pub use locks::{LockRegistry, LockSet, NamedLock};
pub use memory::{Call, MemoryClient, Operation};
pub use reconcile::{Observation, Poll, ReconcileSpec, reconcile};
