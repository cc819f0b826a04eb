//! Managed outbound clients and the per-tenant client manager.
//!
//! A [`ManagedClient`] is bound to either no client certificate or one
//! specific key-material reference, and lives for the process lifetime
//! once created. A [`ClientManager`] hands out managed clients for one
//! (tenant, service kind, provider, flow, version) combination: exactly
//! one plain-TLS client, plus one mutual-TLS client per distinct
//! key-material reference.

use crate::error::{GatewayError, ProviderError};
use crate::intercept::{CallInterceptor, Exchange};
use crate::tenant::{CallFlow, TenantIdentity};
use crate::transport::factory::SecureClientFactory;
use crate::transport::keep_alive::{DEFAULT_KEEP_ALIVE, KeepAlivePolicy};
use crate::transport::KeyMaterialReference;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Url};
use rustls_pki_types::CertificateDer;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Buffered response from a provider exchange.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Fully buffered response body.
    pub body: Vec<u8>,
}

impl ProviderResponse {
    /// Body interpreted as UTF-8, lossily.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Per-caller hook to finish client assembly (extra default headers,
/// provider-specific tweaks). Applied once, at construction.
pub type ClientCustomizer =
    Arc<dyn Fn(reqwest::ClientBuilder) -> reqwest::ClientBuilder + Send + Sync>;

/// How a managed client should be assembled.
#[derive(Clone)]
pub struct ClientConfiguration {
    key_material: Option<KeyMaterialReference>,
    disable_redirect_handling: bool,
    default_keep_alive: Duration,
    customizer: Option<ClientCustomizer>,
}

impl std::fmt::Debug for ClientConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfiguration")
            .field("key_material", &self.key_material)
            .field("disable_redirect_handling", &self.disable_redirect_handling)
            .field("default_keep_alive", &self.default_keep_alive)
            .field("customizer", &self.customizer.is_some())
            .finish()
    }
}

impl ClientConfiguration {
    /// A client without a client certificate.
    #[must_use]
    pub fn plain() -> Self {
        Self {
            key_material: None,
            disable_redirect_handling: false,
            default_keep_alive: DEFAULT_KEEP_ALIVE,
            customizer: None,
        }
    }

    /// A mutual-TLS client presenting the given key material.
    #[must_use]
    pub fn mutual_tls(reference: KeyMaterialReference) -> Self {
        Self {
            key_material: Some(reference),
            disable_redirect_handling: false,
            default_keep_alive: DEFAULT_KEEP_ALIVE,
            customizer: None,
        }
    }

    /// Never follow redirects. Required for flows where a redirect must be
    /// inspected rather than followed.
    #[must_use]
    pub fn with_disabled_redirects(mut self) -> Self {
        self.disable_redirect_handling = true;
        self
    }

    /// Overrides the default keep-alive window.
    #[must_use]
    pub fn with_default_keep_alive(mut self, default_keep_alive: Duration) -> Self {
        self.default_keep_alive = default_keep_alive;
        self
    }

    /// Finishes client assembly with a caller-supplied customization.
    #[must_use]
    pub fn with_customizer(
        mut self,
        customizer: impl Fn(reqwest::ClientBuilder) -> reqwest::ClientBuilder + Send + Sync + 'static,
    ) -> Self {
        self.customizer = Some(Arc::new(customizer));
        self
    }

    /// The key material, if this is a mutual-TLS configuration.
    #[must_use]
    pub fn key_material(&self) -> Option<&KeyMaterialReference> {
        self.key_material.as_ref()
    }

    /// Whether redirect handling is disabled.
    #[must_use]
    pub fn disable_redirect_handling(&self) -> bool {
        self.disable_redirect_handling
    }

    /// The default keep-alive window.
    #[must_use]
    pub fn default_keep_alive(&self) -> Duration {
        self.default_keep_alive
    }

    /// The caller-supplied customizer, if any.
    #[must_use]
    pub fn customizer(&self) -> Option<&ClientCustomizer> {
        self.customizer.as_ref()
    }
}

/// A ready-to-use outbound HTTP client with its interceptor chain.
///
/// Shared by all callers using the same cache key; connection pools inside
/// are thread-safe.
pub struct ManagedClient {
    http: reqwest::Client,
    interceptors: Vec<Arc<dyn CallInterceptor>>,
    keep_alive: KeepAlivePolicy,
}

impl ManagedClient {
    pub(crate) fn new(
        http: reqwest::Client,
        mut interceptors: Vec<Arc<dyn CallInterceptor>>,
        keep_alive: KeepAlivePolicy,
    ) -> Self {
        interceptors.sort_by_key(|interceptor| interceptor.order());
        Self {
            http,
            interceptors,
            keep_alive,
        }
    }

    /// Starts building a request against this client.
    #[must_use]
    pub fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http.request(method, url)
    }

    /// Builds and executes a request through the interceptor chain.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Misuse`] when the request cannot be built
    /// and [`ProviderError::Exchange`] on wire failures.
    pub async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<ProviderResponse, GatewayError> {
        let request = builder.build().map_err(|e| {
            GatewayError::Provider(ProviderError::Misuse {
                reason: e.to_string(),
            })
        })?;
        self.execute(request).await
    }

    /// Executes a request through the interceptor chain.
    ///
    /// The response body is fully buffered so interceptors observe the
    /// final wire outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Exchange`] on wire failures; interceptors
    /// run for those too.
    pub async fn execute(
        &self,
        request: reqwest::Request,
    ) -> Result<ProviderResponse, GatewayError> {
        let method = request.method().clone();
        let url = request.url().clone();
        let started = Instant::now();

        let outcome = match self.http.execute(request).await {
            Ok(response) => {
                let status = response.status();
                let headers = response.headers().clone();
                self.inspect_keep_alive(&headers);
                match response.bytes().await {
                    Ok(body) => Ok(ProviderResponse {
                        status,
                        headers,
                        body: body.to_vec(),
                    }),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(response) => {
                let exchange = Exchange {
                    method: &method,
                    url: &url,
                    status: Some(response.status),
                    body: Some(&response.body),
                    elapsed,
                };
                for interceptor in &self.interceptors {
                    interceptor.on_exchange(&exchange).await;
                }
                Ok(response)
            }
            Err(wire_error) => {
                let exchange = Exchange {
                    method: &method,
                    url: &url,
                    status: None,
                    body: None,
                    elapsed,
                };
                for interceptor in &self.interceptors {
                    interceptor.on_exchange(&exchange).await;
                }
                Err(GatewayError::Provider(ProviderError::Exchange {
                    reason: wire_error.without_url().to_string(),
                }))
            }
        }
    }

    fn inspect_keep_alive(&self, headers: &HeaderMap) {
        let advertised = headers.get("keep-alive").and_then(|v| v.to_str().ok());
        let effective = self.keep_alive.effective_timeout(advertised);
        if effective < self.keep_alive.default_timeout() {
            debug!(
                advertised_secs = effective.as_secs(),
                default_secs = self.keep_alive.default_timeout().as_secs(),
                "peer advertises a shorter keep-alive window than the default"
            );
        }
    }
}

/// Hands out managed clients for one tenant/provider/flow combination.
pub struct ClientManager {
    factory: Arc<SecureClientFactory>,
    tenant: TenantIdentity,
    provider_key: String,
    flow: CallFlow,
    /// The one client without a client certificate. Only one "no-cert"
    /// identity exists per manager, hence a dedicated slot rather than a
    /// map entry.
    plain_client: Mutex<Option<Arc<ManagedClient>>>,
    /// One client per key-material reference.
    mutual_tls_clients: Mutex<HashMap<KeyMaterialReference, Arc<ManagedClient>>>,
}

impl ClientManager {
    pub(crate) fn new(
        factory: Arc<SecureClientFactory>,
        tenant: TenantIdentity,
        provider_key: impl Into<String>,
        flow: CallFlow,
    ) -> Self {
        Self {
            factory,
            tenant,
            provider_key: provider_key.into(),
            flow,
            plain_client: Mutex::new(None),
            mutual_tls_clients: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the managed client for `configuration`, building it on
    /// first use.
    ///
    /// At most one client is ever constructed per unique configuration
    /// key; concurrent first callers all receive the same instance.
    ///
    /// # Errors
    ///
    /// Returns a key or client-assembly error from the first construction.
    pub async fn manage(
        &self,
        configuration: ClientConfiguration,
    ) -> Result<Arc<ManagedClient>, GatewayError> {
        match configuration.key_material() {
            Some(reference) => {
                let reference = reference.clone();
                self.manage_mutual_tls_client(reference, configuration).await
            }
            None => self.manage_plain_client(configuration).await,
        }
    }

    /// Shorthand for a mutual-TLS client with default options.
    ///
    /// # Errors
    ///
    /// Returns a key or client-assembly error from the first construction.
    pub async fn manage_mutual_tls(
        &self,
        private_transport_kid: Uuid,
        certificate_chain: Vec<CertificateDer<'static>>,
    ) -> Result<Arc<ManagedClient>, GatewayError> {
        self.manage(ClientConfiguration::mutual_tls(KeyMaterialReference::new(
            private_transport_kid,
            certificate_chain,
        )))
        .await
    }

    async fn manage_plain_client(
        &self,
        configuration: ClientConfiguration,
    ) -> Result<Arc<ManagedClient>, GatewayError> {
        let mut slot = self.plain_client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = Arc::new(
            self.factory
                .build(&self.tenant, &self.provider_key, self.flow, &configuration)
                .await?,
        );
        *slot = Some(client.clone());
        info!(
            subject = %self.tenant.subject(),
            provider = %self.provider_key,
            "created a new managed client in the cache"
        );
        Ok(client)
    }

    async fn manage_mutual_tls_client(
        &self,
        reference: KeyMaterialReference,
        configuration: ClientConfiguration,
    ) -> Result<Arc<ManagedClient>, GatewayError> {
        // The lock is held across the build so concurrent first callers
        // for the same reference cannot observe two live clients.
        let mut clients = self.mutual_tls_clients.lock().await;
        if let Some(client) = clients.get(&reference) {
            return Ok(client.clone());
        }
        let client = Arc::new(
            self.factory
                .build(&self.tenant, &self.provider_key, self.flow, &configuration)
                .await?,
        );
        clients.insert(reference.clone(), client.clone());
        info!(
            subject = %self.tenant.subject(),
            provider = %self.provider_key,
            private_transport_kid = %reference.private_transport_kid(),
            chain_len = reference.certificate_chain().len(),
            "created a new managed client for mutual TLS in the cache"
        );
        Ok(client)
    }
}
