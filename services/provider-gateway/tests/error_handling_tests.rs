//! Cause-chain unwrapping and handler dispatch.

use provider_gateway::circuit_breaker::CircuitBreakerError;
use provider_gateway::error::{
    FailureClass, GatewayError, ProviderError, classify_failure, find_domain_error,
};
use std::time::Duration;

#[test]
fn test_wrapper_wrapper_domain_chain_selects_domain_handler() {
    // WrapperA (circuit-breaker wrapper) -> WrapperB (non-circuit-breaking
    // wrapper) -> DomainException -> end of chain.
    let domain = ProviderError::TokenInvalid {
        reason: "consent revoked".into(),
    };
    let wrapper_b = GatewayError::NonCircuitBreakingTokenInvalid {
        source: Box::new(domain),
    };
    let wrapper_a = GatewayError::CircuitBreaker(CircuitBreakerError::ServiceUnavailable {
        source: Box::new(wrapper_b),
    });

    let found = find_domain_error(&wrapper_a);
    assert!(matches!(found, Some(ProviderError::TokenInvalid { .. })));
    assert_eq!(classify_failure(&wrapper_a), FailureClass::TokenInvalid);
}

#[test]
fn test_domain_error_without_wrappers_dispatches_directly() {
    let err = GatewayError::Provider(ProviderError::BackPressure);

    assert_eq!(classify_failure(&err), FailureClass::BackPressure);
}

#[test]
fn test_breaker_failures_classify_as_unavailable() {
    for err in [
        GatewayError::CircuitBreaker(CircuitBreakerError::CircuitOpen {
            name: "cb".into(),
            retry_after: Duration::from_secs(60),
        }),
        GatewayError::CircuitBreaker(CircuitBreakerError::BulkheadFull { name: "cb".into() }),
        GatewayError::CircuitBreaker(CircuitBreakerError::CallTimedOut {
            name: "cb".into(),
            deadline: Duration::from_secs(30),
        }),
    ] {
        assert_eq!(classify_failure(&err), FailureClass::ProviderUnavailable);
    }
}

#[test]
fn test_unrecognized_error_falls_back_to_generic() {
    let err = GatewayError::ClientBuild {
        reason: "pool".into(),
    };

    assert!(find_domain_error(&err).is_none());
    assert_eq!(classify_failure(&err), FailureClass::Generic);
}

#[test]
fn test_deep_wrapper_nesting_terminates() {
    // Many layers of the default-fallback wrapper around a breaker
    // failure; the walk must terminate and still classify correctly.
    let mut err = GatewayError::CircuitBreaker(CircuitBreakerError::CircuitOpen {
        name: "cb".into(),
        retry_after: Duration::from_secs(1),
    });
    for _ in 0..10 {
        err = GatewayError::CircuitBreaker(CircuitBreakerError::ServiceUnavailable {
            source: Box::new(err),
        });
    }

    assert_eq!(classify_failure(&err), FailureClass::ProviderUnavailable);
}
