//! Assembly of fully configured outbound clients.
//!
//! The factory owns everything shared between clients: the key service,
//! the rotation-auditing verifier (one trust record set for the whole
//! process), the proxy policy, connection tuning, metrics and the raw-data
//! sink. `build` produces one [`ManagedClient`] wired with TLS, pool,
//! timeouts, redirect policy, proxy route and the ordered interceptor
//! chain.

use crate::config::ProviderConnectionConfig;
use crate::crypto::KeyService;
use crate::error::GatewayError;
use crate::intercept::{
    AuthorizationFlowPublishingInterceptor, CallInterceptor, FetchDataPublishingInterceptor,
    MetricsInterceptor, RawDataSink,
};
use crate::tenant::{CallFlow, TenantIdentity};
use crate::transport::keep_alive::KeepAlivePolicy;
use crate::transport::manager::{ClientConfiguration, ManagedClient};
use crate::transport::proxy::ProxySelector;
use crate::transport::tls;
use gateway_common::apply_http_config;
use gateway_common::OutboundCallMetrics;
use reqwest::redirect;
use rustls::client::danger::ServerCertVerifier;
use std::sync::Arc;

/// Maximum redirects followed when redirect handling is enabled.
const MAX_REDIRECTS: usize = 10;

/// Builds fully configured outbound HTTP clients.
pub struct SecureClientFactory {
    key_service: Arc<dyn KeyService>,
    verifier: Arc<dyn ServerCertVerifier>,
    proxy_selector: Arc<dyn ProxySelector>,
    connection: ProviderConnectionConfig,
    metrics: Arc<OutboundCallMetrics>,
    raw_data: Arc<dyn RawDataSink>,
}

impl SecureClientFactory {
    /// Creates a factory over the shared collaborators.
    #[must_use]
    pub fn new(
        key_service: Arc<dyn KeyService>,
        verifier: Arc<dyn ServerCertVerifier>,
        proxy_selector: Arc<dyn ProxySelector>,
        connection: ProviderConnectionConfig,
        metrics: Arc<OutboundCallMetrics>,
        raw_data: Arc<dyn RawDataSink>,
    ) -> Self {
        Self {
            key_service,
            verifier,
            proxy_selector,
            connection,
            metrics,
            raw_data,
        }
    }

    /// Builds one managed client.
    ///
    /// With key material in the configuration, the private key is fetched
    /// through the key service and presented together with the supplied
    /// chain for client authentication; without it the client offers no
    /// client certificate.
    ///
    /// # Errors
    ///
    /// Returns a key-resolution error, or [`GatewayError::ClientBuild`]
    /// when TLS or pool assembly fails.
    pub async fn build(
        &self,
        tenant: &TenantIdentity,
        provider_key: &str,
        flow: CallFlow,
        configuration: &ClientConfiguration,
    ) -> Result<ManagedClient, GatewayError> {
        let tls_config = match configuration.key_material() {
            Some(reference) => {
                let key = self
                    .key_service
                    .private_transport_key(tenant, reference.private_transport_kid())
                    .await?;
                tls::build_client_config(self.verifier.clone(), Some((reference, &key)))?
            }
            None => tls::build_client_config(self.verifier.clone(), None)?,
        };

        let http_config = self
            .connection
            .http_config(configuration.default_keep_alive());
        let mut builder = apply_http_config(reqwest::Client::builder(), &http_config)
            .use_preconfigured_tls(tls_config)
            .redirect(if configuration.disable_redirect_handling() {
                redirect::Policy::none()
            } else {
                redirect::Policy::limited(MAX_REDIRECTS)
            });

        if let Some(customizer) = configuration.customizer() {
            builder = customizer(builder);
        }

        builder = match self.proxy_selector.proxy_for(provider_key) {
            Some(proxy_url) => {
                let proxy =
                    reqwest::Proxy::all(proxy_url).map_err(|e| GatewayError::ClientBuild {
                        reason: format!("invalid egress proxy: {e}"),
                    })?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        let http = builder.build().map_err(|e| GatewayError::ClientBuild {
            reason: e.to_string(),
        })?;

        Ok(ManagedClient::new(
            http,
            self.interceptors(tenant, provider_key, flow),
            KeepAlivePolicy::with_default_timeout(configuration.default_keep_alive()),
        ))
    }

    /// The ordered interceptor chain for one client: the flow's raw-data
    /// publisher first, metrics last.
    fn interceptors(
        &self,
        tenant: &TenantIdentity,
        provider_key: &str,
        flow: CallFlow,
    ) -> Vec<Arc<dyn CallInterceptor>> {
        let publisher: Arc<dyn CallInterceptor> = match flow {
            CallFlow::DataFetch => Arc::new(FetchDataPublishingInterceptor::new(
                provider_key,
                tenant.subject(),
                self.raw_data.clone(),
            )),
            CallFlow::Authorization => Arc::new(AuthorizationFlowPublishingInterceptor::new(
                provider_key,
                tenant.subject(),
                self.raw_data.clone(),
            )),
        };
        vec![
            publisher,
            Arc::new(MetricsInterceptor::new(provider_key, self.metrics.clone())),
        ]
    }
}
