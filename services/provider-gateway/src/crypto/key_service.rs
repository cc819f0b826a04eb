//! Key resolution against a backing key store (HSM or secret vault).
//!
//! Lookups are deterministic and idempotent: repeated calls with the same
//! tenant and key id return the same key material, so callers can cache
//! what they build from it. Backing-store failures never surface as raw
//! transport errors — a key either resolves or it is not found.

use crate::tenant::TenantIdentity;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

/// Private key material resolved from the backing store.
///
/// Holds the PKCS#8 DER encoding; the bytes are never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct TransportKey {
    der: Vec<u8>,
}

impl TransportKey {
    /// Wraps PKCS#8 DER key material.
    #[must_use]
    pub fn from_pkcs8_der(der: Vec<u8>) -> Self {
        Self { der }
    }

    /// The PKCS#8 DER encoding.
    #[must_use]
    pub fn pkcs8_der(&self) -> &[u8] {
        &self.der
    }
}

impl std::fmt::Debug for TransportKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportKey")
            .field("der", &"<redacted>")
            .finish()
    }
}

/// What a key is used for. Only affects error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPurpose {
    /// TLS client authentication.
    Transport,
    /// Request/payload signing.
    Signing,
}

impl std::fmt::Display for KeyPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Signing => write!(f, "signing"),
        }
    }
}

/// Key resolution failures visible to callers.
#[derive(Error, Debug)]
pub enum KeyError {
    /// The requested key/tenant combination cannot be resolved. Terminal
    /// for the current call; never retried automatically.
    #[error("unable to retrieve private {purpose} key for kid {kid}")]
    KeyNotFound {
        /// What the key was needed for.
        purpose: KeyPurpose,
        /// The requested key id.
        kid: Uuid,
    },
}

/// Resolves a tenant's private keys by tenant identity and key id.
#[async_trait]
pub trait KeyService: Send + Sync {
    /// Resolves the private transport (mTLS) key.
    async fn private_transport_key(
        &self,
        tenant: &TenantIdentity,
        kid: Uuid,
    ) -> Result<TransportKey, KeyError>;

    /// Resolves the private signing key.
    async fn private_signing_key(
        &self,
        tenant: &TenantIdentity,
        kid: Uuid,
    ) -> Result<TransportKey, KeyError>;
}

/// Store-level failure. Not part of the public contract: callers of
/// [`KeyService`] only ever see [`KeyError`].
#[derive(Error, Debug)]
#[error("key store unavailable: {reason}")]
pub struct KeyStoreError {
    /// Description of the store failure.
    pub reason: String,
}

/// Backing key store (HSM, vault). Keys are addressed by alias.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Fetches PKCS#8 DER key material by alias. `Ok(None)` means the
    /// alias does not exist.
    async fn fetch(&self, alias: &str) -> Result<Option<Vec<u8>>, KeyStoreError>;
}

/// In-memory key store for tests and local development.
#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryKeyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts key material under an alias.
    pub fn insert(&self, alias: impl Into<String>, pkcs8_der: Vec<u8>) {
        self.keys.write().insert(alias.into(), pkcs8_der);
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn fetch(&self, alias: &str) -> Result<Option<Vec<u8>>, KeyStoreError> {
        Ok(self.keys.read().get(alias).cloned())
    }
}

/// Cache key: keys are scoped to the client group, so tenants of the same
/// group addressing the same kid resolve to the same material.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeyReference {
    client_group_id: Uuid,
    kid: Uuid,
}

/// [`KeyService`] backed by a [`KeyStore`], with a per-reference cache.
///
/// Each store lookup may mint a fresh copy of the key material; the cache
/// guarantees at most one [`TransportKey`] instance per reference for the
/// process lifetime.
pub struct VaultKeyService {
    store: Arc<dyn KeyStore>,
    cache: Mutex<HashMap<KeyReference, TransportKey>>,
}

impl VaultKeyService {
    /// Creates a key service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn key_alias(tenant: &TenantIdentity, kid: Uuid) -> String {
        format!("{}_{}", tenant.client_group_id(), kid)
    }

    async fn resolve(
        &self,
        tenant: &TenantIdentity,
        kid: Uuid,
        purpose: KeyPurpose,
    ) -> Result<TransportKey, KeyError> {
        let reference = KeyReference {
            client_group_id: tenant.client_group_id(),
            kid,
        };

        let mut cache = self.cache.lock().await;
        if let Some(key) = cache.get(&reference) {
            return Ok(key.clone());
        }

        let alias = Self::key_alias(tenant, kid);
        let fetched = match self.store.fetch(&alias).await {
            Ok(fetched) => fetched,
            Err(store_error) => {
                warn!(
                    kid = %kid,
                    purpose = %purpose,
                    error = %store_error,
                    "exception occurred while looking up key in the key store"
                );
                None
            }
        };

        match fetched {
            Some(der) => {
                let key = TransportKey::from_pkcs8_der(der);
                cache.insert(reference, key.clone());
                Ok(key)
            }
            None => Err(KeyError::KeyNotFound { purpose, kid }),
        }
    }
}

#[async_trait]
impl KeyService for VaultKeyService {
    async fn private_transport_key(
        &self,
        tenant: &TenantIdentity,
        kid: Uuid,
    ) -> Result<TransportKey, KeyError> {
        self.resolve(tenant, kid, KeyPurpose::Transport).await
    }

    async fn private_signing_key(
        &self,
        tenant: &TenantIdentity,
        kid: Uuid,
    ) -> Result<TransportKey, KeyError> {
        self.resolve(tenant, kid, KeyPurpose::Signing).await
    }
}
