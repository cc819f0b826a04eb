//! Latency metrics for outbound provider calls.

use super::{CallInterceptor, Exchange};
use async_trait::async_trait;
use gateway_common::OutboundCallMetrics;
use std::sync::Arc;

/// Chain position of the metrics interceptor. Runs last so the recorded
/// outcome is the final wire outcome.
pub const METRICS_INTERCEPTOR_ORDER: i32 = 300;

/// Status label used when the exchange failed before a status was read.
const IO_ERROR_STATUS: &str = "IO_ERROR";

/// Records a duration sample for every exchange, successful or not.
pub struct MetricsInterceptor {
    provider_key: String,
    metrics: Arc<OutboundCallMetrics>,
}

impl MetricsInterceptor {
    /// Creates the interceptor for one provider.
    #[must_use]
    pub fn new(provider_key: impl Into<String>, metrics: Arc<OutboundCallMetrics>) -> Self {
        Self {
            provider_key: provider_key.into(),
            metrics,
        }
    }
}

#[async_trait]
impl CallInterceptor for MetricsInterceptor {
    fn order(&self) -> i32 {
        METRICS_INTERCEPTOR_ORDER
    }

    async fn on_exchange(&self, exchange: &Exchange<'_>) {
        let status = exchange
            .status
            .map_or_else(|| IO_ERROR_STATUS.to_string(), |s| s.as_u16().to_string());
        self.metrics.record(
            &self.provider_key,
            exchange.method.as_str(),
            &status,
            exchange.elapsed,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;
    use reqwest::{Method, StatusCode, Url};
    use std::time::Duration;

    #[tokio::test]
    async fn test_records_final_status() {
        let registry = Registry::new();
        let metrics = Arc::new(OutboundCallMetrics::new(&registry).unwrap());
        let interceptor = MetricsInterceptor::new("PROVIDER_X", metrics);

        let method = Method::GET;
        let url = Url::parse("https://api.bank.example/accounts").unwrap();
        interceptor
            .on_exchange(&Exchange {
                method: &method,
                url: &url,
                status: Some(StatusCode::OK),
                body: Some(b"{}"),
                elapsed: Duration::from_millis(42),
            })
            .await;

        let families = registry.gather();
        let family = families
            .iter()
            .find(|f| f.get_name().contains("request_duration"))
            .unwrap();
        assert_eq!(family.get_metric()[0].get_histogram().get_sample_count(), 1);
    }

    #[tokio::test]
    async fn test_wire_failure_recorded_as_io_error() {
        let registry = Registry::new();
        let metrics = Arc::new(OutboundCallMetrics::new(&registry).unwrap());
        let interceptor = MetricsInterceptor::new("PROVIDER_X", metrics);

        let method = Method::GET;
        let url = Url::parse("https://api.bank.example/accounts").unwrap();
        interceptor
            .on_exchange(&Exchange {
                method: &method,
                url: &url,
                status: None,
                body: None,
                elapsed: Duration::from_millis(7),
            })
            .await;

        let families = registry.gather();
        let family = families
            .iter()
            .find(|f| f.get_name().contains("request_duration"))
            .unwrap();
        let label_values: Vec<_> = family.get_metric()[0]
            .get_label()
            .iter()
            .map(|l| l.get_value().to_string())
            .collect();
        assert!(label_values.contains(&IO_ERROR_STATUS.to_string()));
    }
}
