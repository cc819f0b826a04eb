//! Prometheus metric constructors for outbound calls and circuit breakers.
//!
//! Metrics are registered against an injectable [`Registry`] so services
//! and tests control exposition.

use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::time::Duration;

/// Metrics for outbound provider requests.
pub struct OutboundCallMetrics {
    /// Duration of provider operations, labelled by provider, HTTP method
    /// and response status.
    pub request_duration: HistogramVec,
}

impl OutboundCallMetrics {
    /// Creates and registers the outbound call metrics.
    ///
    /// # Errors
    ///
    /// Returns an error when a collector with the same name is already
    /// registered.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "restclient_providers_request_duration_seconds",
                "Timer of provider outbound operations",
            )
            .namespace("provider_gateway"),
            &["provider", "method", "status"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self { request_duration })
    }

    /// Records one completed exchange.
    pub fn record(&self, provider: &str, method: &str, status: &str, elapsed: Duration) {
        self.request_duration
            .with_label_values(&[provider, method, status])
            .observe(elapsed.as_secs_f64());
    }
}

/// Circuit breaker metrics.
pub struct BreakerMetrics {
    /// State changes counter
    pub state_changes: CounterVec,
    /// Current state gauge (0=closed, 1=open, 2=half-open)
    pub current_state: GaugeVec,
    /// Calls counter labelled by outcome
    pub calls: CounterVec,
}

impl BreakerMetrics {
    /// Creates and registers the circuit breaker metrics.
    ///
    /// # Errors
    ///
    /// Returns an error when a collector with the same name is already
    /// registered.
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let state_changes = CounterVec::new(
            Opts::new(
                "circuit_breaker_state_changes_total",
                "Total circuit breaker state changes",
            )
            .namespace("provider_gateway"),
            &["circuit", "from_state", "to_state"],
        )?;
        registry.register(Box::new(state_changes.clone()))?;

        let current_state = GaugeVec::new(
            Opts::new("circuit_breaker_state", "Current circuit breaker state")
                .namespace("provider_gateway"),
            &["circuit"],
        )?;
        registry.register(Box::new(current_state.clone()))?;

        let calls = CounterVec::new(
            Opts::new(
                "circuit_breaker_calls_total",
                "Total calls seen by the circuit breaker",
            )
            .namespace("provider_gateway"),
            &["circuit", "outcome"],
        )?;
        registry.register(Box::new(calls.clone()))?;

        Ok(Self {
            state_changes,
            current_state,
            calls,
        })
    }

    /// Records a state change.
    pub fn record_state_change(&self, circuit: &str, from: &str, to: &str) {
        self.state_changes
            .with_label_values(&[circuit, from, to])
            .inc();

        let state_value = match to {
            "closed" => 0.0,
            "open" => 1.0,
            "half_open" => 2.0,
            _ => -1.0,
        };
        self.current_state
            .with_label_values(&[circuit])
            .set(state_value);
    }

    /// Records a call outcome (`success`, `failure`, `timeout`, `rejected`).
    pub fn record_call(&self, circuit: &str, outcome: &str) {
        self.calls.with_label_values(&[circuit, outcome]).inc();
    }
}
