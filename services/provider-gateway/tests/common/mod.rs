//! Shared fixtures for integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use provider_gateway::config::ProviderConnectionConfig;
use provider_gateway::crypto::{InMemoryKeyStore, VaultKeyService};
use provider_gateway::intercept::{ChannelRawDataSink, RawCallRecord};
use provider_gateway::tenant::TenantIdentity;
use provider_gateway::transport::{
    AuditSink, CertificateRotationEvent, InMemoryTrustRecords, RotationAuditingVerifier,
    SecureClientFactory,
};
use provider_gateway::transport::{ClientManagerCache, DirectProxySelector};
use gateway_common::OutboundCallMetrics;
use prometheus::Registry;
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair};
use rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rustls::{DigitallySignedStruct, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Delegate verifier with a switchable verdict.
#[derive(Debug)]
pub struct StubDelegate {
    accept: bool,
}

impl StubDelegate {
    pub fn accepting() -> Self {
        Self { accept: true }
    }

    pub fn rejecting() -> Self {
        Self { accept: false }
    }
}

impl ServerCertVerifier for StubDelegate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if self.accept {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::General("hostname mismatch".to_string()))
        }
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::RSA_PSS_SHA256,
        ]
    }
}

/// Audit sink that records every event.
#[derive(Default)]
pub struct RecordingAuditSink {
    pub events: Mutex<Vec<CertificateRotationEvent>>,
}

impl AuditSink for RecordingAuditSink {
    fn emit(&self, event: CertificateRotationEvent) {
        self.events.lock().push(event);
    }
}

/// A valid PKCS#8 private key for client-auth tests.
pub fn generated_ec_key() -> Vec<u8> {
    EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &SystemRandom::new())
        .unwrap()
        .as_ref()
        .to_vec()
}

pub fn certificate_chain(bytes: &[&[u8]]) -> Vec<CertificateDer<'static>> {
    bytes
        .iter()
        .map(|b| CertificateDer::from(b.to_vec()))
        .collect()
}

pub struct TestGateway {
    pub cache: ClientManagerCache,
    pub store: Arc<InMemoryKeyStore>,
    pub registry: Registry,
    pub raw_data_rx: mpsc::Receiver<RawCallRecord>,
}

/// Full transport stack over an in-memory key store and an accepting
/// trust delegate.
pub fn test_gateway() -> TestGateway {
    let store = Arc::new(InMemoryKeyStore::new());
    let registry = Registry::new();
    let metrics = Arc::new(OutboundCallMetrics::new(&registry).unwrap());
    let (sink, raw_data_rx) = ChannelRawDataSink::new(16);
    let verifier = Arc::new(RotationAuditingVerifier::new(
        Arc::new(StubDelegate::accepting()),
        Arc::new(InMemoryTrustRecords::new()),
        Arc::new(RecordingAuditSink::default()),
    ));

    let factory = SecureClientFactory::new(
        Arc::new(VaultKeyService::new(store.clone())),
        verifier,
        Arc::new(DirectProxySelector),
        ProviderConnectionConfig::default(),
        metrics,
        Arc::new(sink),
    );

    TestGateway {
        cache: ClientManagerCache::new(Arc::new(factory)),
        store,
        registry,
        raw_data_rx,
    }
}

/// Registers transport key material for a tenant and returns the kid.
pub fn register_transport_key(store: &InMemoryKeyStore, tenant: &TenantIdentity) -> Uuid {
    let kid = Uuid::new_v4();
    store.insert(
        format!("{}_{}", tenant.client_group_id(), kid),
        generated_ec_key(),
    );
    kid
}
