//! Centralized HTTP client configuration and building.
//!
//! This module provides a standardized way to configure outbound HTTP
//! clients across the gateway: bounded connection pools, independent
//! connect/read/request timeouts, and TCP keep-alive probing for idle
//! connections.

use reqwest::ClientBuilder;
use std::time::Duration;

/// Outbound HTTP client configuration.
///
/// Provides production defaults with connection pooling and timeouts. The
/// pool idle timeout doubles as the default keep-alive window: idle
/// connections are never reused indefinitely.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Total request timeout (default: 30s)
    pub request_timeout: Duration,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Duration,
    /// Socket read timeout (default: 30s)
    pub read_timeout: Duration,
    /// Pool idle timeout (default: 180s)
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host (default: 10)
    pub pool_max_idle_per_host: usize,
    /// TCP keep-alive probe interval for liveness of idle connections
    /// (default: 30s)
    pub tcp_keepalive: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            pool_idle_timeout: Duration::from_secs(180),
            pool_max_idle_per_host: 10,
            tcp_keepalive: Duration::from_secs(30),
        }
    }
}

impl HttpConfig {
    /// Set the total request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the socket read timeout.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the pool idle timeout and per-host idle bound.
    #[must_use]
    pub fn with_pool_config(mut self, idle_timeout: Duration, max_idle: usize) -> Self {
        self.pool_idle_timeout = idle_timeout;
        self.pool_max_idle_per_host = max_idle;
        self
    }

    /// Set the TCP keep-alive probe interval.
    #[must_use]
    pub fn with_tcp_keepalive(mut self, interval: Duration) -> Self {
        self.tcp_keepalive = interval;
        self
    }
}

/// Apply an [`HttpConfig`] to a `reqwest` client builder.
///
/// TLS and redirect policy are left to the caller; this only wires the
/// pool and timeout knobs.
#[must_use]
pub fn apply_http_config(builder: ClientBuilder, config: &HttpConfig) -> ClientBuilder {
    builder
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .tcp_keepalive(config.tcp_keepalive)
}
