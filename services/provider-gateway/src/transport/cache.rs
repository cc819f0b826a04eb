//! Tenant-scoped cache of client managers.
//!
//! Each (tenant, service kind, provider, flow, version) combination gets
//! an independent manager with independent connection pools; authorization
//! and data-fetch traffic are isolated on purpose since fetch traffic is
//! much higher volume.

use crate::tenant::{CallFlow, ProviderVersion, ServiceKind, TenantIdentity};
use crate::transport::factory::SecureClientFactory;
use crate::transport::manager::ClientManager;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Key under which one client manager is cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientCacheKey {
    /// Tenant scope (client id for clients, group id for group tenants).
    pub tenant_id: Uuid,
    /// AIS or PIS.
    pub service_kind: ServiceKind,
    /// Provider the manager serves.
    pub provider_key: String,
    /// Data-fetch or authorization flow.
    pub flow: CallFlow,
    /// Provider integration version.
    pub provider_version: ProviderVersion,
}

/// Caches client managers per tenant/provider combination.
///
/// Identical keys always yield the same manager instance for the life of
/// the process; managers are never evicted.
pub struct ClientManagerCache {
    factory: Arc<SecureClientFactory>,
    managers: Mutex<HashMap<ClientCacheKey, Arc<ClientManager>>>,
}

impl ClientManagerCache {
    /// Creates a cache that builds managers through `factory`.
    #[must_use]
    pub fn new(factory: Arc<SecureClientFactory>) -> Self {
        Self {
            factory,
            managers: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the manager for the given combination, creating it at most
    /// once.
    pub async fn for_tenant_provider(
        &self,
        tenant: &TenantIdentity,
        service_kind: ServiceKind,
        provider_key: &str,
        flow: CallFlow,
        provider_version: ProviderVersion,
    ) -> Arc<ClientManager> {
        let key = ClientCacheKey {
            tenant_id: tenant.cache_tenant_id(),
            service_kind,
            provider_key: provider_key.to_string(),
            flow,
            provider_version,
        };

        let mut managers = self.managers.lock().await;
        managers
            .entry(key)
            .or_insert_with(|| {
                info!(
                    subject = %tenant.subject(),
                    provider = provider_key,
                    service_kind = service_kind.as_str(),
                    flow = flow.as_str(),
                    version = %provider_version,
                    "cached a new client manager"
                );
                Arc::new(ClientManager::new(
                    self.factory.clone(),
                    tenant.clone(),
                    provider_key,
                    flow,
                ))
            })
            .clone()
    }
}
