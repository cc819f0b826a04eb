//! End-to-end: cached client through the breaker against a mock provider.

mod common;

use common::test_gateway;
use gateway_common::BreakerMetrics;
use prometheus::Registry;
use provider_gateway::circuit_breaker::{CircuitBreakerFactory, ProviderCommand};
use provider_gateway::config::ResilienceConfigRegistry;
use provider_gateway::error::GatewayError;
use provider_gateway::intercept::RawDataSource;
use provider_gateway::tenant::{CallFlow, ProviderVersion, ServiceKind, TenantIdentity};
use provider_gateway::transport::ClientConfiguration;
use reqwest::Method;
use reqwest::Url;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROVIDER: &str = "PROVIDER_X";

#[tokio::test]
async fn test_data_fetch_call_publishes_raw_data_and_metrics() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"accounts\":[]}"))
        .mount(&server)
        .await;

    let mut gateway = test_gateway();
    let tenant = TenantIdentity::client(Uuid::new_v4(), Uuid::new_v4(), true);

    // Same manager and client on repeated lookups (end-to-end identity).
    let manager = gateway
        .cache
        .for_tenant_provider(
            &tenant,
            ServiceKind::Ais,
            PROVIDER,
            CallFlow::DataFetch,
            ProviderVersion(1),
        )
        .await;
    let client = manager.manage(ClientConfiguration::plain()).await.unwrap();
    let again = manager.manage(ClientConfiguration::plain()).await.unwrap();
    assert!(Arc::ptr_eq(&client, &again));

    // A second tenant gets its own client for the same provider/flow.
    let other_tenant = TenantIdentity::client(Uuid::new_v4(), Uuid::new_v4(), true);
    let other_client = gateway
        .cache
        .for_tenant_provider(
            &other_tenant,
            ServiceKind::Ais,
            PROVIDER,
            CallFlow::DataFetch,
            ProviderVersion(1),
        )
        .await
        .manage(ClientConfiguration::plain())
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&client, &other_client));

    // Run the fetch through the breaker wrapper.
    let breaker_factory = CircuitBreakerFactory::new(
        ResilienceConfigRegistry::default(),
        Arc::new(BreakerMetrics::new(&gateway.registry).unwrap()),
    );
    let breaker = breaker_factory.create(
        &tenant,
        PROVIDER,
        ProviderCommand::AisFetchData,
        Uuid::new_v4(),
    );

    let url = Url::parse(&format!("{}/accounts", server.uri())).unwrap();
    let call_client = client.clone();
    let response = breaker
        .run(async move {
            let request = call_client.request(Method::GET, url);
            call_client.send(request).await
        })
        .await
        .unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.text(), "{\"accounts\":[]}");

    // The raw-data interceptor published the payload.
    let record = gateway.raw_data_rx.recv().await.unwrap();
    assert_eq!(record.source, RawDataSource::FetchData);
    assert_eq!(record.provider_key, PROVIDER);
    assert_eq!(record.http_method, "GET");
    assert_eq!(record.payload, "{\"accounts\":[]}");

    // The metrics interceptor recorded the exchange.
    let families = gateway.registry.gather();
    let family = families
        .iter()
        .find(|f| f.get_name().contains("request_duration"))
        .unwrap();
    assert_eq!(family.get_metric()[0].get_histogram().get_sample_count(), 1);
}

#[tokio::test]
async fn test_authorization_flow_does_not_follow_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/authorize"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "https://rogue.example/"),
        )
        .mount(&server)
        .await;

    let gateway = test_gateway();
    let tenant = TenantIdentity::client(Uuid::new_v4(), Uuid::new_v4(), true);
    let manager = gateway
        .cache
        .for_tenant_provider(
            &tenant,
            ServiceKind::Ais,
            PROVIDER,
            CallFlow::Authorization,
            ProviderVersion(1),
        )
        .await;
    let client = manager
        .manage(ClientConfiguration::plain().with_disabled_redirects())
        .await
        .unwrap();

    let url = Url::parse(&format!("{}/authorize", server.uri())).unwrap();
    let response = client
        .send(client.request(Method::GET, url))
        .await
        .unwrap();

    // The redirect is handed back for inspection, not followed.
    assert_eq!(response.status.as_u16(), 302);
    assert_eq!(
        response
            .headers
            .get("location")
            .and_then(|v| v.to_str().ok()),
        Some("https://rogue.example/")
    );
}

#[tokio::test]
async fn test_builder_customizer_shapes_the_cached_client() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/balances"))
        .and(header("x-client-profile", "psd2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let gateway = test_gateway();
    let tenant = TenantIdentity::client(Uuid::new_v4(), Uuid::new_v4(), true);
    let manager = gateway
        .cache
        .for_tenant_provider(
            &tenant,
            ServiceKind::Ais,
            PROVIDER,
            CallFlow::DataFetch,
            ProviderVersion(1),
        )
        .await;

    let client = manager
        .manage(ClientConfiguration::plain().with_customizer(|builder| {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-client-profile", "psd2".parse().unwrap());
            builder.default_headers(headers)
        }))
        .await
        .unwrap();

    let url = Url::parse(&format!("{}/balances", server.uri())).unwrap();
    let response = client.send(client.request(Method::GET, url)).await.unwrap();

    // 200 only when the customized default header reached the provider.
    assert_eq!(response.status.as_u16(), 200);
}

#[tokio::test]
async fn test_wire_failure_surfaces_as_provider_error_through_fallback() {
    let gateway = test_gateway();
    let tenant = TenantIdentity::client(Uuid::new_v4(), Uuid::new_v4(), true);
    let manager = gateway
        .cache
        .for_tenant_provider(
            &tenant,
            ServiceKind::Ais,
            PROVIDER,
            CallFlow::DataFetch,
            ProviderVersion(1),
        )
        .await;
    let client = manager.manage(ClientConfiguration::plain()).await.unwrap();

    let breaker_factory = CircuitBreakerFactory::new(
        ResilienceConfigRegistry::default(),
        Arc::new(BreakerMetrics::new(&Registry::new()).unwrap()),
    );
    let breaker = breaker_factory.create(
        &tenant,
        PROVIDER,
        ProviderCommand::AisFetchData,
        Uuid::new_v4(),
    );

    // Nothing listens on this port.
    let url = Url::parse("http://127.0.0.1:9/void").unwrap();
    let result = breaker
        .run(async move {
            let request = client.request(Method::GET, url);
            client.send(request).await
        })
        .await;

    match result {
        Err(GatewayError::CircuitBreaker(_)) => {}
        other => panic!("expected the default circuit-breaker fallback, got {other:?}"),
    }
}
