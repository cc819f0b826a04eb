//! Keep-alive policy for pooled connections.
//!
//! Peers that do not advertise an explicit `Keep-Alive: timeout=` window
//! get the configured default instead of being reused indefinitely —
//! indefinite reuse is where "read timed out" and "connection reset"
//! errors on stale connections come from.

use std::time::Duration;

/// Default reuse window when the peer advertises nothing.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(180);

const KEEP_ALIVE_TIMEOUT_PARAMETER_NAME: &str = "timeout";

/// Keep-alive policy of one outbound client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlivePolicy {
    default_timeout: Duration,
}

impl KeepAlivePolicy {
    /// Creates a policy with the given default reuse window.
    #[must_use]
    pub fn with_default_timeout(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    /// The default reuse window.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Effective reuse window given the peer's `Keep-Alive` header value.
    #[must_use]
    pub fn effective_timeout(&self, keep_alive_header: Option<&str>) -> Duration {
        keep_alive_header
            .and_then(parse_keep_alive_timeout)
            .unwrap_or(self.default_timeout)
    }
}

impl Default for KeepAlivePolicy {
    fn default() -> Self {
        Self::with_default_timeout(DEFAULT_KEEP_ALIVE)
    }
}

/// Parses the `timeout=` parameter of a `Keep-Alive` header value.
fn parse_keep_alive_timeout(value: &str) -> Option<Duration> {
    value.split(',').find_map(|param| {
        let mut parts = param.trim().splitn(2, '=');
        let name = parts.next()?.trim();
        let value = parts.next()?.trim();
        if name.eq_ignore_ascii_case(KEEP_ALIVE_TIMEOUT_PARAMETER_NAME) {
            value.parse::<u64>().ok().map(Duration::from_secs)
        } else {
            None
        }
    })
}
