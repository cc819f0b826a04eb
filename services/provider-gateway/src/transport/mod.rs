//! Mutual-TLS client lifecycle: trust decisions, client construction and
//! per-tenant caching.

pub mod cache;
pub mod factory;
pub mod keep_alive;
pub mod manager;
pub mod proxy;
pub mod tls;
pub mod trust;

pub use cache::{ClientCacheKey, ClientManagerCache};
pub use factory::SecureClientFactory;
pub use keep_alive::KeepAlivePolicy;
pub use manager::{
    ClientConfiguration, ClientCustomizer, ClientManager, ManagedClient, ProviderResponse,
};
pub use proxy::{DirectProxySelector, ProxySelector, StaticProxySelector};
pub use trust::{
    AuditSink, CertificateRotationEvent, InMemoryTrustRecords, RotationAuditingVerifier,
    TracingAuditSink, TrustRecords,
};

use rustls_pki_types::CertificateDer;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A transport key id plus its ordered X.509 chain.
///
/// The private key alone does not uniquely describe a TLS client identity:
/// a rotated certificate can reuse the same key, so the chain is part of
/// the identity. Equality and hashing are structural — key id plus a
/// byte-for-byte comparison of the full chain.
#[derive(Clone)]
pub struct KeyMaterialReference {
    private_transport_kid: Uuid,
    certificate_chain: Vec<CertificateDer<'static>>,
}

impl KeyMaterialReference {
    /// Creates a reference from a key id and its certificate chain.
    #[must_use]
    pub fn new(private_transport_kid: Uuid, certificate_chain: Vec<CertificateDer<'static>>) -> Self {
        Self {
            private_transport_kid,
            certificate_chain,
        }
    }

    /// The transport key id.
    #[must_use]
    pub fn private_transport_kid(&self) -> Uuid {
        self.private_transport_kid
    }

    /// The ordered certificate chain, leaf first.
    #[must_use]
    pub fn certificate_chain(&self) -> &[CertificateDer<'static>] {
        &self.certificate_chain
    }
}

impl PartialEq for KeyMaterialReference {
    fn eq(&self, other: &Self) -> bool {
        self.private_transport_kid == other.private_transport_kid
            && self.certificate_chain.len() == other.certificate_chain.len()
            && self
                .certificate_chain
                .iter()
                .zip(&other.certificate_chain)
                .all(|(a, b)| a.as_ref() == b.as_ref())
    }
}

impl Eq for KeyMaterialReference {}

impl Hash for KeyMaterialReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.private_transport_kid.hash(state);
        self.certificate_chain.len().hash(state);
        for cert in &self.certificate_chain {
            cert.as_ref().hash(state);
        }
    }
}

impl std::fmt::Debug for KeyMaterialReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterialReference")
            .field("private_transport_kid", &self.private_transport_kid)
            .field("certificate_chain_len", &self.certificate_chain.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn chain(bytes: &[&[u8]]) -> Vec<CertificateDer<'static>> {
        bytes
            .iter()
            .map(|b| CertificateDer::from(b.to_vec()))
            .collect()
    }

    #[test]
    fn test_equal_for_same_kid_and_chain() {
        let kid = Uuid::new_v4();
        let a = KeyMaterialReference::new(kid, chain(&[b"leaf", b"intermediate"]));
        let b = KeyMaterialReference::new(kid, chain(&[b"leaf", b"intermediate"]));

        assert_eq!(a, b);

        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn test_distinct_for_different_chain() {
        let kid = Uuid::new_v4();
        let a = KeyMaterialReference::new(kid, chain(&[b"leaf"]));
        let b = KeyMaterialReference::new(kid, chain(&[b"rotated-leaf"]));

        assert_ne!(a, b);
    }

    #[test]
    fn test_distinct_for_different_kid() {
        let material = chain(&[b"leaf"]);
        let a = KeyMaterialReference::new(Uuid::new_v4(), material.clone());
        let b = KeyMaterialReference::new(Uuid::new_v4(), material);

        assert_ne!(a, b);
    }
}
