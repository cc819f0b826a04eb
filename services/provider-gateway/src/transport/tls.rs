//! TLS client configuration for outbound provider traffic.
//!
//! Negotiation is restricted to TLS 1.2/1.3 with an explicit,
//! security-reviewed cipher-suite allow-list; the runtime default suite
//! list is never used.

use crate::crypto::TransportKey;
use crate::error::GatewayError;
use crate::transport::KeyMaterialReference;
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use rustls::{CipherSuite, ClientConfig};
use rustls_pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use std::sync::Arc;

/// Sanctioned cipher suites.
///
/// The CBC suites that were also sanctioned are not implemented by
/// rustls:
/// `TLS_DHE_RSA_WITH_AES_256_CBC_SHA256`,
/// `TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384`,
/// `TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA384`.
const ALLOWED_SUITES: &[CipherSuite] = &[
    // TLSv1.2
    CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
    CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
    CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
    CipherSuite::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
    // TLSv1.3
    CipherSuite::TLS13_AES_256_GCM_SHA384,
    CipherSuite::TLS13_CHACHA20_POLY1305_SHA256,
    CipherSuite::TLS13_AES_128_GCM_SHA256,
];

fn restricted_provider() -> CryptoProvider {
    let mut provider = rustls::crypto::ring::default_provider();
    provider
        .cipher_suites
        .retain(|suite| ALLOWED_SUITES.contains(&suite.suite()));
    provider
}

/// Builds the rustls client config for one outbound client.
///
/// With key material present the client authenticates with exactly that
/// private key and certificate chain; without it, no client certificate is
/// offered. Hostname/chain verification goes through `verifier`.
pub(crate) fn build_client_config(
    verifier: Arc<dyn ServerCertVerifier>,
    key_material: Option<(&KeyMaterialReference, &TransportKey)>,
) -> Result<ClientConfig, GatewayError> {
    let builder = ClientConfig::builder_with_provider(Arc::new(restricted_provider()))
        .with_protocol_versions(&[&rustls::version::TLS12, &rustls::version::TLS13])
        .map_err(|e| GatewayError::ClientBuild {
            reason: format!("unsupported protocol versions: {e}"),
        })?
        .dangerous()
        .with_custom_certificate_verifier(verifier);

    match key_material {
        Some((reference, key)) => {
            let chain = reference.certificate_chain().to_vec();
            let key_der =
                PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.pkcs8_der().to_vec()));
            builder
                .with_client_auth_cert(chain, key_der)
                .map_err(|e| GatewayError::ClientBuild {
                    reason: format!("client key material rejected: {e}"),
                })
        }
        None => Ok(builder.with_no_client_auth()),
    }
}
