//! Circuit breaker state management.
//!
//! Accounting is a count-based rolling window of call outcomes: the
//! breaker opens when the failure rate or the slow-call rate over the
//! window crosses its threshold, once enough calls have been recorded.
//! Overlapping calls contribute independently; the window reflects commit
//! order, not start order.

use crate::config::ResilienceSettings;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow through normally.
    Closed,
    /// Requests fail fast.
    Open,
    /// A bounded number of trial requests probe recovery.
    HalfOpen,
}

impl CircuitState {
    /// Metric label of the state.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Outcome {
    failed: bool,
    slow: bool,
}

/// Fixed-size count-based window of call outcomes.
#[derive(Debug)]
pub(crate) struct RollingWindow {
    outcomes: Vec<Option<Outcome>>,
    next: usize,
}

impl RollingWindow {
    pub(crate) fn new(size: usize) -> Self {
        Self {
            outcomes: vec![None; size.max(1)],
            next: 0,
        }
    }

    pub(crate) fn record(&mut self, failed: bool, slow: bool) {
        self.outcomes[self.next] = Some(Outcome { failed, slow });
        self.next = (self.next + 1) % self.outcomes.len();
    }

    pub(crate) fn len(&self) -> usize {
        self.outcomes.iter().flatten().count()
    }

    pub(crate) fn failure_rate(&self) -> f32 {
        self.rate(|outcome| outcome.failed)
    }

    pub(crate) fn slow_rate(&self) -> f32 {
        self.rate(|outcome| outcome.slow)
    }

    pub(crate) fn clear(&mut self) {
        self.outcomes.fill(None);
        self.next = 0;
    }

    fn rate(&self, predicate: impl Fn(&Outcome) -> bool) -> f32 {
        let recorded = self.len();
        if recorded == 0 {
            return 0.0;
        }
        let matching = self.outcomes.iter().flatten().filter(|o| predicate(o)).count();
        #[allow(clippy::cast_precision_loss)]
        {
            matching as f32 * 100.0 / recorded as f32
        }
    }
}

/// Admission decision for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Permission {
    /// The call may proceed.
    Allowed,
    /// The circuit is open; retry after the given wait.
    Rejected {
        /// Remaining open-state cooldown.
        retry_after: Duration,
    },
}

/// Internal state of one circuit breaker.
#[derive(Debug)]
pub(crate) struct BreakerState {
    pub(crate) state: CircuitState,
    window: RollingWindow,
    opened_at: Option<Instant>,
    half_open_issued: usize,
    half_open_successes: usize,
}

impl BreakerState {
    pub(crate) fn new(settings: &ResilienceSettings) -> Self {
        Self {
            state: CircuitState::Closed,
            window: RollingWindow::new(settings.sliding_window_size),
            opened_at: None,
            half_open_issued: 0,
            half_open_successes: 0,
        }
    }

    /// Decides whether a call may proceed, transitioning Open → HalfOpen
    /// when the cooldown has elapsed.
    pub(crate) fn try_acquire(&mut self, settings: &ResilienceSettings, name: &str) -> Permission {
        match self.state {
            CircuitState::Closed => Permission::Allowed,
            CircuitState::Open => {
                let elapsed = self.opened_at.map_or(Duration::ZERO, |at| at.elapsed());
                if elapsed >= settings.wait_in_open {
                    self.transition_to_half_open(name);
                    self.half_open_issued += 1;
                    Permission::Allowed
                } else {
                    Permission::Rejected {
                        retry_after: settings.wait_in_open - elapsed,
                    }
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_issued < settings.half_open_permits {
                    self.half_open_issued += 1;
                    Permission::Allowed
                } else {
                    Permission::Rejected {
                        retry_after: settings.wait_in_open,
                    }
                }
            }
        }
    }

    /// Records a committed call outcome.
    pub(crate) fn record(
        &mut self,
        failed: bool,
        slow: bool,
        settings: &ResilienceSettings,
        name: &str,
    ) {
        match self.state {
            CircuitState::Closed => {
                self.window.record(failed, slow);
                if self.window.len() >= settings.minimum_calls
                    && (self.window.failure_rate() >= settings.failure_rate_threshold
                        || self.window.slow_rate() >= settings.slow_call_rate_threshold)
                {
                    self.transition_to_open(name);
                }
            }
            CircuitState::HalfOpen => {
                if failed {
                    self.transition_to_open(name);
                } else {
                    self.half_open_successes += 1;
                    if self.half_open_successes >= settings.half_open_permits {
                        self.transition_to_closed(name);
                    }
                }
            }
            CircuitState::Open => {
                // A late commit from a call admitted before the circuit
                // opened; the window restarts on the next transition.
            }
        }
    }

    fn transition_to_open(&mut self, name: &str) {
        self.state = CircuitState::Open;
        self.opened_at = Some(Instant::now());
        self.half_open_issued = 0;
        self.half_open_successes = 0;
        warn!(
            circuit = %name,
            failure_rate = self.window.failure_rate(),
            slow_rate = self.window.slow_rate(),
            "circuit opened"
        );
    }

    fn transition_to_half_open(&mut self, name: &str) {
        self.state = CircuitState::HalfOpen;
        self.half_open_issued = 0;
        self.half_open_successes = 0;
        self.window.clear();
        info!(circuit = %name, "circuit transitioning to half-open");
    }

    fn transition_to_closed(&mut self, name: &str) {
        self.state = CircuitState::Closed;
        self.opened_at = None;
        self.half_open_issued = 0;
        self.half_open_successes = 0;
        self.window.clear();
        info!(circuit = %name, "circuit closed after recovery");
    }
}
