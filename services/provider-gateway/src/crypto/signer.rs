//! Payload signing backed by the key service.

use crate::crypto::{KeyService, TransportKey};
use crate::error::GatewayError;
use crate::tenant::TenantIdentity;
use async_trait::async_trait;
use ring::rand::SystemRandom;
use ring::signature::{self, EcdsaKeyPair, RsaKeyPair};
use std::sync::Arc;
use uuid::Uuid;

/// Signature algorithms offered to provider integrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    Rs256,
    /// RSASSA-PKCS1-v1_5 with SHA-512.
    Rs512,
    /// RSASSA-PSS with SHA-256.
    Ps256,
    /// ECDSA P-256 with SHA-256 (ASN.1 encoded).
    Es256,
}

impl std::fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Rs256 => "RS256",
            Self::Rs512 => "RS512",
            Self::Ps256 => "PS256",
            Self::Es256 => "ES256",
        };
        write!(f, "{name}")
    }
}

/// Signs payloads on behalf of a tenant.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Signs `payload` with the tenant's key `kid` using `algorithm`.
    ///
    /// Failures carry the key id and algorithm for audit, never the
    /// payload.
    async fn sign(
        &self,
        payload: &[u8],
        kid: Uuid,
        algorithm: SignatureAlgorithm,
    ) -> Result<Vec<u8>, GatewayError>;
}

/// [`Signer`] that resolves keys through a [`KeyService`].
pub struct KeyServiceSigner {
    keys: Arc<dyn KeyService>,
    tenant: TenantIdentity,
}

impl KeyServiceSigner {
    /// Creates a signer for one tenant.
    #[must_use]
    pub fn new(keys: Arc<dyn KeyService>, tenant: TenantIdentity) -> Self {
        Self { keys, tenant }
    }

    fn sign_with_key(
        key: &TransportKey,
        payload: &[u8],
        kid: Uuid,
        algorithm: SignatureAlgorithm,
    ) -> Result<Vec<u8>, GatewayError> {
        let rng = SystemRandom::new();
        match algorithm {
            SignatureAlgorithm::Rs256 | SignatureAlgorithm::Rs512 | SignatureAlgorithm::Ps256 => {
                let key_pair = RsaKeyPair::from_pkcs8(key.pkcs8_der())
                    .map_err(|e| signing_failed(kid, algorithm, e.to_string()))?;
                let padding: &'static dyn signature::RsaEncoding = match algorithm {
                    SignatureAlgorithm::Rs256 => &signature::RSA_PKCS1_SHA256,
                    SignatureAlgorithm::Rs512 => &signature::RSA_PKCS1_SHA512,
                    _ => &signature::RSA_PSS_SHA256,
                };
                let mut sig = vec![0u8; key_pair.public().modulus_len()];
                key_pair
                    .sign(padding, &rng, payload, &mut sig)
                    .map_err(|e| signing_failed(kid, algorithm, e.to_string()))?;
                Ok(sig)
            }
            SignatureAlgorithm::Es256 => {
                let key_pair = EcdsaKeyPair::from_pkcs8(
                    &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
                    key.pkcs8_der(),
                    &rng,
                )
                .map_err(|e| signing_failed(kid, algorithm, e.to_string()))?;
                let sig = key_pair
                    .sign(&rng, payload)
                    .map_err(|e| signing_failed(kid, algorithm, e.to_string()))?;
                Ok(sig.as_ref().to_vec())
            }
        }
    }
}

#[async_trait]
impl Signer for KeyServiceSigner {
    async fn sign(
        &self,
        payload: &[u8],
        kid: Uuid,
        algorithm: SignatureAlgorithm,
    ) -> Result<Vec<u8>, GatewayError> {
        let key = self.keys.private_signing_key(&self.tenant, kid).await?;
        Self::sign_with_key(&key, payload, kid, algorithm)
    }
}

fn signing_failed(kid: Uuid, algorithm: SignatureAlgorithm, reason: String) -> GatewayError {
    GatewayError::SigningFailed {
        kid,
        algorithm,
        source: reason.into(),
    }
}
