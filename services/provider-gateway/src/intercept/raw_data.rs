//! Raw-payload publication to the external event stream.
//!
//! Every provider response of interest is published asynchronously with
//! its call metadata. Publication failures are logged and dropped; they
//! must never fail the underlying call.

use super::{CallInterceptor, Exchange};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::error;

/// Chain position of the raw-data publishing interceptors.
pub const RAW_DATA_INTERCEPTOR_ORDER: i32 = 150;

const UNKNOWN_PLACEHOLDER: &str = "UNKNOWN";

/// Where a raw payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RawDataSource {
    /// Account/transaction data fetching.
    #[serde(rename = "FETCH_DATA")]
    FetchData,
    /// Consent and token-exchange traffic.
    #[serde(rename = "AUTHORIZATION_FLOW")]
    AuthorizationFlow,
}

impl RawDataSource {
    /// Wire name of the source.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FetchData => "FETCH_DATA",
            Self::AuthorizationFlow => "AUTHORIZATION_FLOW",
        }
    }
}

/// One raw provider payload plus call metadata.
#[derive(Debug, Clone, Serialize)]
pub struct RawCallRecord {
    /// Source flow.
    pub source: RawDataSource,
    /// Provider the call went to.
    pub provider_key: String,
    /// Tenant subject the call was made for.
    pub subject: String,
    /// HTTP method of the request.
    pub http_method: String,
    /// Request URI.
    pub http_uri: String,
    /// Raw payload; empty for flows that publish metadata only.
    pub payload: String,
}

/// Publishes raw call records asynchronously.
///
/// Implementations are fire-and-forget: a failed publish is the sink's
/// problem, never the caller's.
pub trait RawDataSink: Send + Sync {
    /// Hands a record to the sink.
    fn publish(&self, record: RawCallRecord);
}

/// Bounded-channel sink. A consumer task drains records towards the
/// external event stream.
pub struct ChannelRawDataSink {
    tx: mpsc::Sender<RawCallRecord>,
}

impl ChannelRawDataSink {
    /// Creates the sink and the receiving end for the consumer task.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<RawCallRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl RawDataSink for ChannelRawDataSink {
    fn publish(&self, record: RawCallRecord) {
        if let Err(rejected) = self.tx.try_send(record) {
            let record = rejected.into_inner();
            error!(
                provider = %record.provider_key,
                source = record.source.as_str(),
                "failed to publish raw data"
            );
        }
    }
}

/// Publishes raw data for data-fetch traffic.
///
/// Only successful (200) responses are published, with the full payload.
pub struct FetchDataPublishingInterceptor {
    provider_key: String,
    subject: String,
    sink: Arc<dyn RawDataSink>,
}

impl FetchDataPublishingInterceptor {
    /// Creates the interceptor for one provider/tenant combination.
    #[must_use]
    pub fn new(
        provider_key: impl Into<String>,
        subject: impl Into<String>,
        sink: Arc<dyn RawDataSink>,
    ) -> Self {
        Self {
            provider_key: provider_key.into(),
            subject: subject.into(),
            sink,
        }
    }
}

#[async_trait]
impl CallInterceptor for FetchDataPublishingInterceptor {
    fn order(&self) -> i32 {
        RAW_DATA_INTERCEPTOR_ORDER
    }

    async fn on_exchange(&self, exchange: &Exchange<'_>) {
        if exchange.status != Some(StatusCode::OK) {
            return;
        }
        let payload = exchange
            .body
            .map(|body| String::from_utf8_lossy(body).into_owned())
            .unwrap_or_default();
        self.sink.publish(RawCallRecord {
            source: RawDataSource::FetchData,
            provider_key: self.provider_key.clone(),
            subject: self.subject.clone(),
            http_method: exchange.method.as_str().to_string(),
            http_uri: exchange.url.to_string(),
            payload,
        });
    }
}

/// Publishes call metadata for authorization-flow traffic.
///
/// Authorization payloads carry secrets, so only the metadata is
/// published; the payload stays empty.
pub struct AuthorizationFlowPublishingInterceptor {
    provider_key: String,
    subject: String,
    sink: Arc<dyn RawDataSink>,
}

impl AuthorizationFlowPublishingInterceptor {
    /// Creates the interceptor for one provider/tenant combination.
    #[must_use]
    pub fn new(
        provider_key: impl Into<String>,
        subject: impl Into<String>,
        sink: Arc<dyn RawDataSink>,
    ) -> Self {
        Self {
            provider_key: provider_key.into(),
            subject: subject.into(),
            sink,
        }
    }
}

#[async_trait]
impl CallInterceptor for AuthorizationFlowPublishingInterceptor {
    fn order(&self) -> i32 {
        RAW_DATA_INTERCEPTOR_ORDER
    }

    async fn on_exchange(&self, exchange: &Exchange<'_>) {
        if exchange.status != Some(StatusCode::OK) {
            return;
        }
        self.sink.publish(RawCallRecord {
            source: RawDataSource::AuthorizationFlow,
            provider_key: self.provider_key.clone(),
            subject: self.subject.clone(),
            http_method: exchange.method.as_str().to_string(),
            http_uri: exchange.url.to_string(),
            payload: String::new(),
        });
    }
}
