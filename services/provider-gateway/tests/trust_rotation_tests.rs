//! Trust-on-first-use behavior at the verifier level.

mod common;

use common::{RecordingAuditSink, StubDelegate};
use provider_gateway::transport::{InMemoryTrustRecords, RotationAuditingVerifier};
use rustls::client::danger::ServerCertVerifier;
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use std::sync::Arc;
use std::time::Duration;

const HOSTNAME: &str = "api.bank.example";

fn verify(
    verifier: &RotationAuditingVerifier,
    hostname: &str,
    cert: &[u8],
) -> Result<(), rustls::Error> {
    let end_entity = CertificateDer::from(cert.to_vec());
    let server_name = ServerName::try_from(hostname.to_string()).unwrap();
    verifier
        .verify_server_cert(
            &end_entity,
            &[],
            &server_name,
            &[],
            UnixTime::since_unix_epoch(Duration::from_secs(1_750_000_000)),
        )
        .map(|_| ())
}

fn rotation_verifier(delegate: StubDelegate) -> (RotationAuditingVerifier, Arc<RecordingAuditSink>) {
    let audit = Arc::new(RecordingAuditSink::default());
    let verifier = RotationAuditingVerifier::new(
        Arc::new(delegate),
        Arc::new(InMemoryTrustRecords::new()),
        audit.clone(),
    );
    (verifier, audit)
}

#[test]
fn test_first_use_trusts_without_audit() {
    let (verifier, audit) = rotation_verifier(StubDelegate::accepting());

    assert!(verify(&verifier, HOSTNAME, b"cert-a").is_ok());
    assert!(audit.events.lock().is_empty());
}

#[test]
fn test_repeat_use_trusts_without_audit() {
    let (verifier, audit) = rotation_verifier(StubDelegate::accepting());

    assert!(verify(&verifier, HOSTNAME, b"cert-a").is_ok());
    assert!(verify(&verifier, HOSTNAME, b"cert-a").is_ok());
    assert!(audit.events.lock().is_empty());
}

#[test]
fn test_rotation_trusts_and_audits_once() {
    let (verifier, audit) = rotation_verifier(StubDelegate::accepting());
    verify(&verifier, HOSTNAME, b"cert-a").unwrap();

    assert!(verify(&verifier, HOSTNAME, b"cert-b").is_ok());

    let events = audit.events.lock();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.hostname, HOSTNAME);

    use base64::Engine;
    let b64 = base64::engine::general_purpose::STANDARD;
    assert_eq!(event.old_certs, b64.encode(b"cert-a"));
    assert_eq!(event.new_cert, b64.encode(b"cert-b"));
}

#[test]
fn test_old_certificate_still_trusted_after_rotation() {
    let (verifier, audit) = rotation_verifier(StubDelegate::accepting());
    verify(&verifier, HOSTNAME, b"cert-a").unwrap();
    verify(&verifier, HOSTNAME, b"cert-b").unwrap();

    assert!(verify(&verifier, HOSTNAME, b"cert-a").is_ok());
    assert!(verify(&verifier, HOSTNAME, b"cert-b").is_ok());

    // Only the rotation itself was audited.
    assert_eq!(audit.events.lock().len(), 1);
}

#[test]
fn test_base_verification_failure_is_fatal_and_unrecorded() {
    let (verifier, audit) = rotation_verifier(StubDelegate::rejecting());

    assert!(verify(&verifier, HOSTNAME, b"cert-a").is_err());
    assert!(verify(&verifier, HOSTNAME, b"cert-a").is_err());
    assert!(audit.events.lock().is_empty());
}

#[test]
fn test_hostnames_have_independent_records() {
    let (verifier, audit) = rotation_verifier(StubDelegate::accepting());

    verify(&verifier, "a.bank.example", b"cert-a").unwrap();
    verify(&verifier, "b.bank.example", b"cert-b").unwrap();

    assert!(audit.events.lock().is_empty());
}

#[test]
fn test_concurrent_first_use_races_do_not_lose_updates() {
    let (verifier, audit) = rotation_verifier(StubDelegate::accepting());
    let verifier = Arc::new(verifier);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let verifier = verifier.clone();
            std::thread::spawn(move || verify(&verifier, HOSTNAME, b"cert-a"))
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap().is_ok());
    }

    // All threads offered the same certificate: whatever the interleaving,
    // nothing may look like a rotation.
    assert!(audit.events.lock().is_empty());
}
