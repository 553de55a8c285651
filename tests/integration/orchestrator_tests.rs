//! End-to-end orchestration against wiremock provider doubles

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use moot_gateway::{ChatMessage, GatewayError, RequestContext};

use crate::common::{completion_body, dialogue, gateway, provider_at};

async fn completions_server(status: u16, body: serde_json::Value, expected: u64) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .expect(expected)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_healthy_primary_single_upstream_call() {
    let server = completions_server(
        200,
        completion_body("What bargained-for exchange do you see?", 100, 50),
        1,
    )
    .await;
    let orchestrator = gateway(vec![provider_at(
        "primary",
        &format!("{}/v1/chat/completions", server.uri()),
        0,
    )]);

    let generation = orchestrator.generate(&dialogue()).await.unwrap();

    assert_eq!(generation.provider, "primary");
    assert!(!generation.fallback);
    assert!(!generation.stub);
    assert_eq!(generation.usage.input_tokens, 100);
    assert_eq!(generation.usage.output_tokens, 50);
    // gpt-4 pricing: 100 in at $0.03/1K plus 50 out at $0.06/1K
    assert!((generation.cost - 0.006).abs() < 1e-9);

    let totals = orchestrator.monitor().metrics().totals;
    assert_eq!(totals.total_requests, 1);
    assert_eq!(totals.successful_requests, 1);
    assert!((totals.total_cost - 0.006).abs() < 1e-9);
    assert!(orchestrator.monitor().alerts(false).is_empty());
}

#[tokio::test]
async fn test_request_carries_wire_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4",
            "stream": false,
            "messages": [
                {"role": "system", "content": "You are a Socratic law tutor."},
                {"role": "user", "content": "Was there valid consideration in Hamer v. Sidway?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Yes.", 10, 2)))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = gateway(vec![provider_at(
        "primary",
        &format!("{}/v1/chat/completions", server.uri()),
        0,
    )]);
    orchestrator.generate(&dialogue()).await.unwrap();
}

#[tokio::test]
async fn test_primary_failure_recovers_on_fallback() {
    let failing = completions_server(500, serde_json::json!({"error": "boom"}), 1).await;
    let healthy =
        completions_server(200, completion_body("Consider the uncle's promise.", 80, 40), 1).await;

    let orchestrator = gateway(vec![
        provider_at("primary", &format!("{}/v1/chat/completions", failing.uri()), 0),
        provider_at("secondary", &format!("{}/v1/chat/completions", healthy.uri()), 1),
    ]);

    let generation = orchestrator.generate(&dialogue()).await.unwrap();
    assert_eq!(generation.provider, "secondary");
    assert!(generation.fallback);
    assert!(!generation.stub);

    let totals = orchestrator.monitor().metrics().totals;
    assert_eq!(totals.total_requests, 2);
    assert_eq!(totals.failed_requests, 1);
    assert_eq!(totals.fallback_count, 1);

    let records = orchestrator.monitor().recent_records(10);
    assert_eq!(records.len(), 2);
    assert!(
        records
            .iter()
            .any(|r| r.provider == "primary" && !r.success && r.error == Some("server"))
    );
    assert!(records.iter().any(|r| r.provider == "secondary" && r.success));
}

#[tokio::test]
async fn test_exhausted_providers_degrade_to_stub() {
    let auth_failing = completions_server(401, serde_json::json!({"error": "bad key"}), 1).await;
    let rate_limited = completions_server(429, serde_json::json!({"error": "slow down"}), 1).await;

    let orchestrator = gateway(vec![
        provider_at("primary", &format!("{}/v1/chat/completions", auth_failing.uri()), 0),
        provider_at("secondary", &format!("{}/v1/chat/completions", rate_limited.uri()), 1),
    ]);

    let generation = orchestrator.generate(&dialogue()).await.unwrap();
    assert!(generation.stub);
    assert!(generation.fallback);
    assert_eq!(generation.provider, "local");
    assert_eq!(generation.cost, 0.0);
    assert!(!generation.content.is_empty());

    let records = orchestrator.monitor().recent_records(10);
    assert_eq!(records.len(), 3);
    assert!(records.iter().any(|r| r.error == Some("auth")));
    assert!(records.iter().any(|r| r.error == Some("rate_limited")));
    assert!(records.iter().any(|r| r.provider == "local" && r.success));
}

#[tokio::test]
async fn test_stub_disabled_returns_exhaustion_error() {
    let failing = completions_server(503, serde_json::json!({"error": "down"}), 1).await;
    let orchestrator = gateway(vec![provider_at(
        "primary",
        &format!("{}/v1/chat/completions", failing.uri()),
        0,
    )]);

    let context = RequestContext::builder("classroom-7")
        .message(ChatMessage::user("Define adverse possession."))
        .without_local_fallback()
        .build()
        .unwrap();

    let error = orchestrator.generate(&context).await.unwrap_err();
    assert!(matches!(error, GatewayError::AllProvidersExhausted));
    assert_eq!(error.code(), "all_providers_exhausted");
}

#[tokio::test]
async fn test_over_budget_makes_no_network_call() {
    // expect(0): the mock verifies no request arrives
    let server = completions_server(200, completion_body("unreachable", 1, 1), 0).await;
    let orchestrator = gateway(vec![provider_at(
        "primary",
        &format!("{}/v1/chat/completions", server.uri()),
        0,
    )]);

    // ~70K characters of history against gpt-4 pricing blows the $0.50 default
    let context = RequestContext::builder("classroom-7")
        .message(ChatMessage::user("x".repeat(70_000)))
        .build()
        .unwrap();

    let error = orchestrator.generate(&context).await.unwrap_err();
    match error {
        GatewayError::BudgetExceeded { estimated, ceiling } => {
            assert!(estimated > ceiling);
            assert!((ceiling - 0.50).abs() < 1e-9);
        }
        other => panic!("expected BudgetExceeded, got {other:?}"),
    }
    // Pre-flight rejection: nothing recorded
    assert_eq!(orchestrator.monitor().metrics().totals.total_requests, 0);
}

#[tokio::test]
async fn test_malformed_body_classified_and_recovered() {
    let malformed = completions_server(200, serde_json::json!({"choices": []}), 1).await;
    let orchestrator = gateway(vec![provider_at(
        "primary",
        &format!("{}/v1/chat/completions", malformed.uri()),
        0,
    )]);

    let generation = orchestrator.generate(&dialogue()).await.unwrap();
    assert!(generation.stub);

    let records = orchestrator.monitor().recent_records(10);
    assert!(records.iter().any(|r| r.error == Some("malformed")));
}

#[tokio::test]
async fn test_slow_provider_times_out_and_degrades() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("late", 1, 1))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut slow = provider_at("primary", &format!("{}/v1/chat/completions", server.uri()), 0);
    slow.timeout_secs = 1;
    let orchestrator = gateway(vec![slow]);

    let generation = orchestrator.generate(&dialogue()).await.unwrap();
    assert!(generation.stub);
    let records = orchestrator.monitor().recent_records(10);
    assert!(records.iter().any(|r| r.error == Some("timeout")));
}
