//! Backend approval strategies

mod appservice;
mod cosmos;
mod keyvault;
mod sql;
mod storage;

pub use appservice::AppServiceStrategy;
pub use cosmos::CosmosDbStrategy;
pub use keyvault::KeyVaultStrategy;
pub use sql::SqlStrategy;
pub use storage::StorageStrategy;

use crate::family::ProviderFamily;
use crate::record::ConnectionRecord;
use crate::strategy::ApprovalStrategy;
use armflow_cloud::{ResourceClient, ResourceId, Result};

/// Child collection holding connection records
pub(crate) const CONNECTIONS: &str = "privateEndpointConnections";

/// The strategy for a family; `None` for [`ProviderFamily::Unknown`]
pub fn strategy_for(family: &ProviderFamily) -> Option<&'static dyn ApprovalStrategy> {
    match family {
        ProviderFamily::Storage => Some(&StorageStrategy),
        ProviderFamily::KeyVault => Some(&KeyVaultStrategy),
        ProviderFamily::Sql => Some(&SqlStrategy),
        ProviderFamily::CosmosDb => Some(&CosmosDbStrategy),
        ProviderFamily::AppService => Some(&AppServiceStrategy),
        ProviderFamily::Unknown(_) => None,
    }
}

/// List records kept as a child collection of `target`
pub(crate) async fn list_child_records(
    client: &dyn ResourceClient,
    target: &ResourceId,
) -> Result<Vec<ConnectionRecord>> {
    client
        .list(target, CONNECTIONS)
        .await?
        .into_iter()
        .map(ConnectionRecord::from_value)
        .collect()
}
