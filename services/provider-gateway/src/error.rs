//! Gateway error taxonomy and cause-chain dispatch.
//!
//! Callers of the public interfaces see either a successful result, a
//! well-typed key/signing error, or the circuit-breaker wrapper's fallback
//! — never a raw low-level network error leaking through this layer.

use crate::circuit_breaker::CircuitBreakerError;
use crate::crypto::{KeyError, SignatureAlgorithm};
use gateway_common::source_chain;
use thiserror::Error;
use uuid::Uuid;

/// Top-level error type of the secure outbound call infrastructure.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Key resolution failed.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// A cryptographic operation failed after the key was resolved.
    ///
    /// Carries the key id and algorithm for audit, never the payload.
    #[error("signing failed for key {kid} with algorithm {algorithm}")]
    SigningFailed {
        /// Key the operation was attempted with.
        kid: Uuid,
        /// Requested algorithm.
        algorithm: SignatureAlgorithm,
        /// Underlying cryptographic failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An outbound client could not be assembled.
    #[error("failed to assemble outbound client: {reason}")]
    ClientBuild {
        /// What went wrong during TLS/pool assembly.
        reason: String,
    },

    /// The call was stopped or failed inside the resilience layer.
    #[error(transparent)]
    CircuitBreaker(#[from] CircuitBreakerError),

    /// A recognized provider-domain failure.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A token-invalid failure that must not count towards circuit
    /// breaking: the consent is broken, not the provider.
    #[error("token invalid, this does not count for circuit-breaking")]
    NonCircuitBreakingTokenInvalid {
        /// The wrapped domain failure.
        #[source]
        source: Box<ProviderError>,
    },
}

/// Provider-domain failures recognized by downstream error handling.
///
/// This is a closed enum on purpose: dispatch is an explicit match with a
/// default arm, not a runtime type-to-handler map.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The stored access token was rejected by the provider.
    #[error("token invalid: {reason}")]
    TokenInvalid {
        /// Provider-safe description.
        reason: String,
    },

    /// The provider answered with a non-success HTTP status.
    #[error("provider returned HTTP {status}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
    },

    /// The provider asked us to back off.
    #[error("back pressure from provider")]
    BackPressure,

    /// The exchange failed at the wire level (connect, read, TLS).
    #[error("provider exchange failed: {reason}")]
    Exchange {
        /// Sanitized description of the wire failure.
        reason: String,
    },

    /// The integration misused the call contract.
    #[error("invalid provider request: {reason}")]
    Misuse {
        /// What was wrong with the request.
        reason: String,
    },
}

/// How a failure should be handled at the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Consent/token is broken; the user has to renew it.
    TokenInvalid,
    /// The provider is temporarily unavailable (breaker open, bulkhead
    /// full, deadline hit).
    ProviderUnavailable,
    /// The provider asked for back-off.
    BackPressure,
    /// Everything else.
    Generic,
}

/// Finds the first recognized provider-domain failure in a cause chain.
///
/// Wrapper errors (the circuit-breaker wrapper, the non-circuit-breaking
/// token wrapper, `anyhow` contexts) are walked outermost-first until a
/// [`ProviderError`] is found or the bounded chain is exhausted.
#[must_use]
pub fn find_domain_error<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a ProviderError> {
    for cause in source_chain(err) {
        if let Some(provider) = cause.downcast_ref::<ProviderError>() {
            return Some(provider);
        }
        if let Some(gateway) = cause.downcast_ref::<GatewayError>() {
            match gateway {
                GatewayError::Provider(provider) => return Some(provider),
                GatewayError::NonCircuitBreakingTokenInvalid { source } => {
                    return Some(source.as_ref());
                }
                _ => {}
            }
        }
    }
    None
}

/// Classifies a failure for edge handling.
///
/// Dispatches on the first recognized domain error in the cause chain; if
/// none is found but the chain contains a circuit-breaker failure, the
/// call never reached (or never finished at) the provider and is reported
/// as temporarily unavailable.
#[must_use]
pub fn classify_failure(err: &(dyn std::error::Error + 'static)) -> FailureClass {
    if let Some(domain) = find_domain_error(err) {
        return match domain {
            ProviderError::TokenInvalid { .. } => FailureClass::TokenInvalid,
            ProviderError::BackPressure => FailureClass::BackPressure,
            ProviderError::HttpStatus { .. }
            | ProviderError::Exchange { .. }
            | ProviderError::Misuse { .. } => FailureClass::Generic,
        };
    }

    let breaker_tripped = source_chain(err).any(|cause| {
        cause.downcast_ref::<CircuitBreakerError>().is_some()
            || matches!(
                cause.downcast_ref::<GatewayError>(),
                Some(GatewayError::CircuitBreaker(_))
            )
    });
    if breaker_tripped {
        FailureClass::ProviderUnavailable
    } else {
        FailureClass::Generic
    }
}
