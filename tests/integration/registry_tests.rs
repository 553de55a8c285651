//! Registry health probing against live and dead endpoints

use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use moot_gateway::{ProviderRegistry, ProviderStatus};

use crate::common::provider_at;

#[tokio::test]
async fn test_probe_restores_down_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let registry = ProviderRegistry::new(
        vec![provider_at("primary", &format!("{}/v1/chat/completions", server.uri()), 0)],
        3,
    );
    for _ in 0..3 {
        registry.mark_failed("primary");
    }
    assert_eq!(registry.statuses()[0].status, ProviderStatus::Down);
    assert!(registry.select_primary().is_none());

    // A 404 still proves the endpoint is alive
    registry.perform_health_check().await;

    let statuses = registry.statuses();
    let status = &statuses[0];
    assert_eq!(status.status, ProviderStatus::Healthy);
    assert_eq!(status.consecutive_failures, 0);
    assert!(status.last_probe.is_some());
    assert_eq!(registry.select_primary().unwrap().id, "primary");
}

#[tokio::test]
async fn test_probe_against_server_error_demotes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let registry = ProviderRegistry::new(
        vec![provider_at("primary", &format!("{}/v1/chat/completions", server.uri()), 0)],
        3,
    );
    registry.perform_health_check().await;
    assert_eq!(registry.statuses()[0].status, ProviderStatus::Degraded);
}

#[tokio::test]
async fn test_probe_against_unreachable_endpoint_demotes() {
    // Nothing listens on this port
    let registry = ProviderRegistry::new(
        vec![provider_at("primary", "http://127.0.0.1:9/v1/chat/completions", 0)],
        3,
    );
    registry.perform_health_check().await;
    assert_eq!(registry.statuses()[0].status, ProviderStatus::Degraded);
}

#[tokio::test]
async fn test_health_loop_probes_periodically() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let registry = std::sync::Arc::new(ProviderRegistry::new(
        vec![provider_at("primary", &format!("{}/v1/chat/completions", server.uri()), 0)],
        3,
    ));
    for _ in 0..3 {
        registry.mark_failed("primary");
    }

    let handle = registry.clone().spawn_health_loop(std::time::Duration::from_millis(50));
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert_eq!(registry.statuses()[0].status, ProviderStatus::Healthy);

    // The loop holds only a weak handle; dropping the registry ends it
    drop(registry);
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert!(handle.is_finished());
}
