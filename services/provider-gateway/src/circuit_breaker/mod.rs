//! Per-command resilience wrapping for outbound provider calls.
//!
//! Every call runs under bulkhead → time limiter → circuit breaker, in
//! that order: a rejected bulkhead acquisition never touches breaker
//! accounting, a deadline cancels the in-flight call, and the breaker
//! short-circuits while open. Failures surface through the caller's
//! fallback; the default fallback rethrows a circuit-breaker-specific
//! error so callers can tell "never attempted" from "failed while
//! attempted".

mod bulkhead;
mod command;
mod factory;
mod state;

pub use command::ProviderCommand;
pub use factory::{CircuitBreakerFactory, CircuitBreakerIdentity};
pub use state::CircuitState;

use crate::config::ResilienceSettings;
use crate::error::{GatewayError, ProviderError};
use bulkhead::Bulkhead;
use gateway_common::BreakerMetrics;
use parking_lot::Mutex;
use state::{BreakerState, Permission};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Failures produced by the resilience layer itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CircuitBreakerError {
    /// The circuit is open; the call was not attempted.
    #[error("circuit open for {name}, retry after {retry_after:?}")]
    CircuitOpen {
        /// Breaker name.
        name: String,
        /// Remaining open-state cooldown.
        retry_after: Duration,
    },

    /// Bulkhead slots and queue are saturated; the call was not attempted.
    #[error("bulkhead full for {name}")]
    BulkheadFull {
        /// Breaker name.
        name: String,
    },

    /// The hard deadline fired; the in-flight call was cancelled.
    #[error("call timed out after {deadline:?} for {name}")]
    CallTimedOut {
        /// Breaker name.
        name: String,
        /// The deadline that fired.
        deadline: Duration,
    },

    /// Default-fallback wrapper around the triggering failure.
    #[error("Service temporarily unavailable.")]
    ServiceUnavailable {
        /// The failure that triggered the fallback.
        #[source]
        source: Box<GatewayError>,
    },
}

/// One circuit breaker with its settings and metrics.
struct CircuitBreaker {
    name: String,
    settings: ResilienceSettings,
    state: Mutex<BreakerState>,
    metrics: Arc<BreakerMetrics>,
}

impl CircuitBreaker {
    fn new(name: String, settings: ResilienceSettings, metrics: Arc<BreakerMetrics>) -> Self {
        let state = Mutex::new(BreakerState::new(&settings));
        Self {
            name,
            settings,
            state,
            metrics,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn current_state(&self) -> CircuitState {
        self.state.lock().state
    }

    fn try_acquire(&self) -> Result<(), CircuitBreakerError> {
        let (permission, before, after) = {
            let mut state = self.state.lock();
            let before = state.state;
            let permission = state.try_acquire(&self.settings, &self.name);
            (permission, before, state.state)
        };
        self.note_transition(before, after);
        match permission {
            Permission::Allowed => Ok(()),
            Permission::Rejected { retry_after } => {
                self.metrics.record_call(&self.name, "rejected");
                Err(CircuitBreakerError::CircuitOpen {
                    name: self.name.clone(),
                    retry_after,
                })
            }
        }
    }

    fn on_result(&self, elapsed: Duration, failed: bool) {
        let slow = elapsed >= self.settings.slow_call_duration;
        self.record(failed, slow);
        self.metrics
            .record_call(&self.name, if failed { "failure" } else { "success" });
    }

    fn on_timeout(&self) {
        // A cancelled call is both a failure and, by definition, slow.
        self.record(true, true);
        self.metrics.record_call(&self.name, "timeout");
    }

    fn record(&self, failed: bool, slow: bool) {
        let (before, after) = {
            let mut state = self.state.lock();
            let before = state.state;
            state.record(failed, slow, &self.settings, &self.name);
            (before, state.state)
        };
        self.note_transition(before, after);
    }

    fn note_transition(&self, before: CircuitState, after: CircuitState) {
        if before != after {
            self.metrics
                .record_state_change(&self.name, before.as_str(), after.as_str());
        }
    }
}

/// The (circuit breaker, time limiter, bulkhead) triple registered under
/// one identity. Created lazily and idempotently; lives for the process
/// lifetime.
pub(crate) struct BreakerBundle {
    breaker: CircuitBreaker,
    bulkhead: Bulkhead,
    call_timeout: Duration,
}

impl BreakerBundle {
    pub(crate) fn new(
        name: String,
        settings: ResilienceSettings,
        metrics: Arc<BreakerMetrics>,
    ) -> Self {
        let bulkhead = Bulkhead::new(
            name.clone(),
            settings.max_concurrent_calls,
            settings.queue_capacity,
        );
        let call_timeout = settings.call_timeout;
        Self {
            breaker: CircuitBreaker::new(name, settings, metrics),
            bulkhead,
            call_timeout,
        }
    }
}

/// Wraps units of outbound provider work with fallback-on-failure
/// semantics.
///
/// The wrapped call is synchronous to the caller: `run` resolves only
/// once the work completed, timed out, or was rejected.
#[derive(Clone)]
pub struct ProvidersCircuitBreaker {
    bundle: Arc<BreakerBundle>,
}

impl ProvidersCircuitBreaker {
    pub(crate) fn new(bundle: Arc<BreakerBundle>) -> Self {
        Self { bundle }
    }

    /// The breaker name (`provider-redirectId-command`).
    #[must_use]
    pub fn name(&self) -> &str {
        self.bundle.breaker.name()
    }

    /// Current circuit state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.bundle.breaker.current_state()
    }

    /// Whether two wrappers share one breaker bundle.
    #[must_use]
    pub fn shares_bundle_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.bundle, &other.bundle)
    }

    /// Runs `work` with the default fallback: any failure is rethrown as
    /// [`CircuitBreakerError::ServiceUnavailable`] wrapping the trigger.
    ///
    /// # Errors
    ///
    /// Returns the work's successful value, or the default fallback error.
    pub async fn run<T, F>(&self, work: F) -> Result<T, GatewayError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, GatewayError>> + Send + 'static,
    {
        self.run_with_fallback(work, |failure| {
            Err(GatewayError::CircuitBreaker(
                CircuitBreakerError::ServiceUnavailable {
                    source: Box::new(failure),
                },
            ))
        })
        .await
    }

    /// Runs `work` under bulkhead → time limiter → circuit breaker,
    /// invoking `fallback` exactly once with the triggering failure when
    /// the breaker is open, the bulkhead is full, the deadline fires, or
    /// the work itself fails. Work that completes normally bypasses the
    /// fallback entirely.
    ///
    /// When the deadline fires the in-flight call is aborted; a result it
    /// produces afterwards is discarded, never delivered.
    ///
    /// # Errors
    ///
    /// Returns whatever the fallback returns for failed calls.
    pub async fn run_with_fallback<T, F, FB>(&self, work: F, fallback: FB) -> Result<T, GatewayError>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, GatewayError>> + Send + 'static,
        FB: FnOnce(GatewayError) -> Result<T, GatewayError>,
    {
        let bundle = &self.bundle;

        // Bulkhead first: a rejected call never touches breaker accounting.
        let _permit = match bundle.bulkhead.acquire().await {
            Ok(permit) => permit,
            Err(full) => return fallback(full.into()),
        };

        if let Err(open) = bundle.breaker.try_acquire() {
            return fallback(open.into());
        }

        let mut handle = tokio::spawn(work);
        let started = Instant::now();
        match tokio::time::timeout(bundle.call_timeout, &mut handle).await {
            Err(_deadline) => {
                handle.abort();
                bundle.breaker.on_timeout();
                fallback(
                    CircuitBreakerError::CallTimedOut {
                        name: bundle.breaker.name().to_string(),
                        deadline: bundle.call_timeout,
                    }
                    .into(),
                )
            }
            Ok(Ok(Ok(value))) => {
                bundle.breaker.on_result(started.elapsed(), false);
                Ok(value)
            }
            Ok(Ok(Err(work_error))) => {
                if counts_for_breaker(&work_error) {
                    bundle.breaker.on_result(started.elapsed(), true);
                }
                fallback(work_error)
            }
            Ok(Err(join_error)) => {
                bundle.breaker.on_result(started.elapsed(), true);
                fallback(GatewayError::Provider(ProviderError::Exchange {
                    reason: format!("provider call aborted: {join_error}"),
                }))
            }
        }
    }
}

/// Token-invalid failures mean the consent is broken, not the provider:
/// they reach the fallback but never the breaker's accounting.
fn counts_for_breaker(error: &GatewayError) -> bool {
    !matches!(error, GatewayError::NonCircuitBreakingTokenInvalid { .. })
}
