//! Lazy, idempotent registration of breaker bundles.

use crate::circuit_breaker::command::ProviderCommand;
use crate::circuit_breaker::{BreakerBundle, ProvidersCircuitBreaker};
use crate::config::ResilienceConfigRegistry;
use crate::tenant::TenantIdentity;
use gateway_common::BreakerMetrics;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Identity under which one breaker bundle is registered.
///
/// The grouping id decides shared fate: PSD2-licensed tenants isolate by
/// client id, everyone else shares the breaker of their client group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CircuitBreakerIdentity {
    provider_name: String,
    redirect_url_id: Uuid,
    command: ProviderCommand,
    grouping_id: Uuid,
}

impl CircuitBreakerIdentity {
    /// Derives the identity for one call.
    #[must_use]
    pub fn new(
        tenant: &TenantIdentity,
        provider_key: &str,
        command: ProviderCommand,
        redirect_url_id: Uuid,
    ) -> Self {
        Self {
            provider_name: provider_key.replace('_', ""),
            redirect_url_id,
            command,
            grouping_id: tenant.grouping_id(),
        }
    }

    /// The breaker name: `provider-redirectId-command`.
    #[must_use]
    pub fn breaker_name(&self) -> String {
        format!(
            "{}-{}-{}",
            self.provider_name,
            self.redirect_url_id,
            self.command.command_name()
        )
    }

    /// The resilience-config lookup key: `provider-command`.
    #[must_use]
    pub fn config_key(&self) -> String {
        format!("{}-{}", self.provider_name, self.command.command_name())
    }

    /// The id along which this breaker is shared.
    #[must_use]
    pub fn grouping_id(&self) -> Uuid {
        self.grouping_id
    }
}

/// Creates and retrieves breaker bundles per identity.
///
/// Identical identities always yield the same bundle for the process
/// lifetime; settings are looked up by provider+command with a global
/// default fallback.
pub struct CircuitBreakerFactory {
    configs: ResilienceConfigRegistry,
    metrics: Arc<BreakerMetrics>,
    registry: Mutex<HashMap<CircuitBreakerIdentity, Arc<BreakerBundle>>>,
}

impl CircuitBreakerFactory {
    /// Creates a factory with the given config registry and metrics.
    #[must_use]
    pub fn new(configs: ResilienceConfigRegistry, metrics: Arc<BreakerMetrics>) -> Self {
        Self {
            configs,
            metrics,
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the breaker wrapper for one call, registering the bundle on
    /// first use.
    #[must_use]
    pub fn create(
        &self,
        tenant: &TenantIdentity,
        provider_key: &str,
        command: ProviderCommand,
        redirect_url_id: Uuid,
    ) -> ProvidersCircuitBreaker {
        let identity = CircuitBreakerIdentity::new(tenant, provider_key, command, redirect_url_id);

        let bundle = self
            .registry
            .lock()
            .entry(identity.clone())
            .or_insert_with(|| {
                let settings = self.configs.settings_for(&identity.config_key()).clone();
                info!(
                    breaker = %identity.breaker_name(),
                    provider = provider_key,
                    service_kind = command.service_kind().as_str(),
                    grouping_id = %identity.grouping_id(),
                    "registered a new circuit breaker"
                );
                Arc::new(BreakerBundle::new(
                    identity.breaker_name(),
                    settings,
                    self.metrics.clone(),
                ))
            })
            .clone();

        ProvidersCircuitBreaker::new(bundle)
    }
}
