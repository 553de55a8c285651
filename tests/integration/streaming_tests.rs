//! Streaming orchestration against wiremock SSE doubles

use futures::StreamExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{dialogue, gateway, provider_at, sse_body};

async fn sse_server(tokens: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(tokens), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_stream_delivers_tokens_in_order() {
    let server = sse_server(&["What ", "would ", "the ", "dissent ", "argue?"]).await;
    let orchestrator = gateway(vec![provider_at(
        "primary",
        &format!("{}/v1/chat/completions", server.uri()),
        0,
    )]);

    let stream = tokio_test::assert_ok!(orchestrator.generate_stream(&dialogue()).await);
    assert_eq!(stream.provider(), "primary");
    assert!(!stream.is_fallback());

    let tokens: Vec<String> = stream.map(|t| t.unwrap()).collect().await;
    assert_eq!(tokens.join(""), "What would the dissent argue?");

    // Terminal outcome recorded once the stream finished
    let totals = orchestrator.monitor().metrics().totals;
    assert_eq!(totals.total_requests, 1);
    assert_eq!(totals.successful_requests, 1);
}

#[tokio::test]
async fn test_stream_open_failure_falls_back() {
    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&failing)
        .await;
    let healthy = sse_server(&["Socratic ", "fallback"]).await;

    let orchestrator = gateway(vec![
        provider_at("primary", &format!("{}/v1/chat/completions", failing.uri()), 0),
        provider_at("secondary", &format!("{}/v1/chat/completions", healthy.uri()), 1),
    ]);

    let stream = orchestrator.generate_stream(&dialogue()).await.unwrap();
    assert!(stream.is_fallback());
    assert_eq!(stream.provider(), "secondary");

    let tokens: Vec<String> = stream.map(|t| t.unwrap()).collect().await;
    assert_eq!(tokens.join(""), "Socratic fallback");

    let totals = orchestrator.monitor().metrics().totals;
    assert_eq!(totals.total_requests, 2);
    assert_eq!(totals.failed_requests, 1);
    assert_eq!(totals.fallback_count, 1);
}

#[tokio::test]
async fn test_stream_stub_when_no_provider_usable() {
    let orchestrator = gateway(vec![]);
    let context = dialogue();

    let stream = orchestrator.generate_stream(&context).await.unwrap();
    assert!(stream.is_stub());
    assert_eq!(stream.provider(), "local");

    let tokens: Vec<String> = stream.map(|t| t.unwrap()).collect().await;
    let text = tokens.join("");
    assert!(text.contains("consideration"), "stub weaves the topic in: {text}");

    let records = orchestrator.monitor().recent_records(10);
    assert_eq!(records.len(), 1);
    assert!(records[0].success);
    assert!(records[0].fallback);
}

#[tokio::test]
async fn test_dropping_stream_stops_consumption() {
    let server = sse_server(&["first ", "second ", "third"]).await;
    let orchestrator = gateway(vec![provider_at(
        "primary",
        &format!("{}/v1/chat/completions", server.uri()),
        0,
    )]);

    let mut stream = orchestrator.generate_stream(&dialogue()).await.unwrap();
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first, "first ");
    drop(stream);

    // The abandoned stream never reached its terminal outcome, so nothing
    // was recorded for it
    assert_eq!(orchestrator.monitor().metrics().totals.total_requests, 0);
}
