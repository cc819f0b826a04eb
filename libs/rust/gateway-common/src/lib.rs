//! Shared library for cross-cutting concerns in provider-gateway Rust services.
//!
//! This crate provides centralized implementations for:
//! - HTTP client configuration and building
//! - Prometheus metric constructors for outbound calls and circuit breakers
//! - Error cause-chain utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod metrics;

pub use error::source_chain;
pub use http::{HttpConfig, apply_http_config};
pub use metrics::{BreakerMetrics, OutboundCallMetrics};
