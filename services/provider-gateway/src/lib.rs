//! Secure outbound call infrastructure for banking-provider integrations.
//!
//! This crate is the core of the provider gateway: it owns the pieces of an
//! outbound call that have security or isolation consequences, and leaves
//! routing, DTO mapping and event plumbing to its collaborators.
//!
//! - [`crypto`] — tenant key resolution against a backing key store, and
//!   payload signing
//! - [`transport`] — mutual-TLS client construction, trust-on-first-use
//!   certificate-rotation detection, and per-tenant client caching
//! - [`circuit_breaker`] — per-command bulkhead / time-limit / circuit
//!   breaker wrapping with tenant-group fate sharing
//! - [`intercept`] — latency metrics and raw-payload publication attached
//!   to every outbound call

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuit_breaker;
pub mod config;
pub mod crypto;
pub mod error;
pub mod intercept;
pub mod tenant;
pub mod transport;

pub use circuit_breaker::{CircuitBreakerError, CircuitBreakerFactory, ProvidersCircuitBreaker};
pub use crypto::{KeyError, KeyService, Signer};
pub use error::{GatewayError, ProviderError};
pub use tenant::{CallFlow, ProviderVersion, ServiceKind, TenantIdentity};
pub use transport::{ClientManagerCache, KeyMaterialReference, ManagedClient};
