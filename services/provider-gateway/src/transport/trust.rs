//! Trust-on-first-use certificate-rotation detection.
//!
//! Base verification (chain, hostname) always decides first; this layer
//! only remembers which leaf certificates each hostname has presented
//! before and audits rotations. A rotation is explicitly not an error:
//! continuity takes priority, the new certificate is trusted and the old
//! ones remain accepted.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::{DigitallySignedStruct, Error as TlsError, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

/// How an offered certificate relates to what was trusted before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustObservation {
    /// First certificate ever seen for this hostname.
    FirstUse,
    /// Certificate was trusted before.
    Known,
    /// Hostname has a record, but not this certificate.
    Rotated {
        /// The previously trusted certificates, DER-encoded.
        previously_trusted: Vec<Vec<u8>>,
    },
}

/// Per-hostname record of previously trusted leaf certificates.
///
/// The compare-then-insert must be atomic per hostname: concurrent
/// first-use races for the same hostname may not lose updates.
pub trait TrustRecords: Send + Sync {
    /// Records `cert` as trusted for `hostname` and reports how it relates
    /// to the prior record.
    fn observe(&self, hostname: &str, cert: &[u8]) -> TrustObservation;
}

/// In-memory trust records.
///
/// Grows monotonically — certificates are never evicted. Deployments
/// talking to an unbounded set of hostnames should bound or replace this
/// store.
#[derive(Default)]
pub struct InMemoryTrustRecords {
    per_host: Mutex<HashMap<String, Arc<HashSet<Vec<u8>>>>>,
}

impl InMemoryTrustRecords {
    /// Creates an empty record store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrustRecords for InMemoryTrustRecords {
    fn observe(&self, hostname: &str, cert: &[u8]) -> TrustObservation {
        let mut per_host = self.per_host.lock();
        match per_host.get(hostname) {
            None => {
                let mut initial = HashSet::new();
                initial.insert(cert.to_vec());
                per_host.insert(hostname.to_string(), Arc::new(initial));
                TrustObservation::FirstUse
            }
            Some(trusted) if trusted.contains(cert) => TrustObservation::Known,
            Some(trusted) => {
                let previously_trusted: Vec<Vec<u8>> = trusted.iter().cloned().collect();
                // Union, not replacement: an old certificate that later
                // reappears is still accepted.
                let mut extended: HashSet<Vec<u8>> = trusted.as_ref().clone();
                extended.insert(cert.to_vec());
                per_host.insert(hostname.to_string(), Arc::new(extended));
                TrustObservation::Rotated { previously_trusted }
            }
        }
    }
}

/// Audit event emitted when a peer rotates its server certificate.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateRotationEvent {
    /// Hostname that presented the new certificate.
    pub hostname: String,
    /// Previously trusted certificates, base64, comma-joined.
    pub old_certs: String,
    /// The newly trusted certificate, base64.
    pub new_cert: String,
    /// When the rotation was observed.
    pub observed_at: DateTime<Utc>,
}

/// Receives certificate-rotation audit events.
///
/// Sinks are fire-and-forget: emitting must never influence the trust
/// decision that produced the event.
pub trait AuditSink: Send + Sync {
    /// Emits one event.
    fn emit(&self, event: CertificateRotationEvent);
}

/// Default sink: structured warn log.
#[derive(Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: CertificateRotationEvent) {
        // The event must be logged at all costs; an encoding failure is
        // swallowed rather than allowed to surface into the trust decision.
        let payload = serde_json::to_string(&event)
            .unwrap_or_else(|_| "<failed to encode>".to_string());
        warn!(
            hostname = %event.hostname,
            event = %payload,
            "one of our peers rotated their server certificate, trusting the new certificate"
        );
    }
}

/// Certificate verifier that layers trust-on-first-use rotation auditing
/// over a delegate.
///
/// If the delegate does not trust the peer, all bets are off: the
/// connection fails and nothing is recorded or audited.
pub struct RotationAuditingVerifier {
    delegate: Arc<dyn ServerCertVerifier>,
    records: Arc<dyn TrustRecords>,
    audit: Arc<dyn AuditSink>,
}

impl RotationAuditingVerifier {
    /// Wraps a delegate verifier.
    #[must_use]
    pub fn new(
        delegate: Arc<dyn ServerCertVerifier>,
        records: Arc<dyn TrustRecords>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            delegate,
            records,
            audit,
        }
    }

    fn hostname_of(server_name: &ServerName<'_>) -> String {
        match server_name {
            ServerName::DnsName(name) => name.as_ref().to_string(),
            ServerName::IpAddress(addr) => std::net::IpAddr::from(*addr).to_string(),
            other => format!("{other:?}"),
        }
    }
}

impl std::fmt::Debug for RotationAuditingVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationAuditingVerifier").finish()
    }
}

impl ServerCertVerifier for RotationAuditingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        self.delegate
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)?;

        let hostname = Self::hostname_of(server_name);
        if let TrustObservation::Rotated { previously_trusted } =
            self.records.observe(&hostname, end_entity.as_ref())
        {
            let old_certs = previously_trusted
                .iter()
                .map(|cert| BASE64.encode(cert))
                .collect::<Vec<_>>()
                .join(",");
            self.audit.emit(CertificateRotationEvent {
                hostname,
                old_certs,
                new_cert: BASE64.encode(end_entity.as_ref()),
                observed_at: Utc::now(),
            });
        }

        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        self.delegate.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        self.delegate.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.delegate.supported_verify_schemes()
    }
}
