//! Cross-cutting concerns attached to every outbound provider call.
//!
//! Interceptors observe the final outcome of an exchange. They run in
//! ascending [`CallInterceptor::order`]: raw-data publication first,
//! metrics last so the metric reflects the final wire outcome.

pub mod metrics;
pub mod raw_data;

pub use metrics::{METRICS_INTERCEPTOR_ORDER, MetricsInterceptor};
pub use raw_data::{
    AuthorizationFlowPublishingInterceptor, ChannelRawDataSink, FetchDataPublishingInterceptor,
    RAW_DATA_INTERCEPTOR_ORDER, RawCallRecord, RawDataSink, RawDataSource,
};

use async_trait::async_trait;
use reqwest::{Method, StatusCode, Url};
use std::time::Duration;

/// Observed outcome of one outbound exchange.
///
/// `status`/`body` are absent when the exchange failed at the wire level.
pub struct Exchange<'a> {
    /// Request method.
    pub method: &'a Method,
    /// Request URL.
    pub url: &'a Url,
    /// Response status, if a response was received.
    pub status: Option<StatusCode>,
    /// Buffered response body, if a response was received.
    pub body: Option<&'a [u8]>,
    /// Wall time of the exchange including body download.
    pub elapsed: Duration,
}

/// A cross-cutting concern attached to an outbound client.
#[async_trait]
pub trait CallInterceptor: Send + Sync {
    /// Position in the chain; lower orders run earlier.
    fn order(&self) -> i32;

    /// Observes a finished exchange. Must not fail the call.
    async fn on_exchange(&self, exchange: &Exchange<'_>);
}
