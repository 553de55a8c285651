//! Shared test fixtures

use std::sync::Arc;

use moot_gateway::{
    AlertThresholds, ChatMessage, HttpProviderClient, Orchestrator, PerformanceMonitor,
    ProviderConfig, ProviderRegistry, RequestContext, TokenBudgetEstimator,
};

/// Provider config pointed at a mock server
pub fn provider_at(id: &str, endpoint: &str, priority: u8) -> ProviderConfig {
    ProviderConfig {
        id: id.to_string(),
        name: format!("{id} (test)"),
        endpoint: endpoint.to_string(),
        api_key: "test-key".to_string(),
        model: "gpt-4".to_string(),
        priority,
        timeout_secs: 5,
        temperature: 0.7,
    }
}

/// Route test logs through tracing when RUST_LOG asks for them
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Orchestrator wired to the real HTTP client and fresh registry/monitor
pub fn gateway(providers: Vec<ProviderConfig>) -> Orchestrator {
    init_tracing();
    Orchestrator::new(
        Arc::new(ProviderRegistry::new(providers, 3)),
        Arc::new(PerformanceMonitor::new(AlertThresholds::default())),
        Arc::new(HttpProviderClient::new().expect("http client")),
        TokenBudgetEstimator::new(200),
    )
}

/// A short Socratic dialogue context
pub fn dialogue() -> RequestContext {
    RequestContext::builder("classroom-7")
        .message(ChatMessage::system("You are a Socratic law tutor."))
        .message(ChatMessage::user(
            "Was there valid consideration in Hamer v. Sidway?",
        ))
        .topic("consideration")
        .build()
        .expect("valid context")
}

/// Canned OpenAI-compatible completion body
pub fn completion_body(
    content: &str,
    prompt_tokens: u32,
    completion_tokens: u32,
) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens
        }
    })
}

/// Canned SSE body streaming `tokens` then the done sentinel
pub fn sse_body(tokens: &[&str]) -> String {
    let mut body = String::new();
    for token in tokens {
        let frame = serde_json::json!({
            "choices": [{"index": 0, "delta": {"content": token}}]
        });
        body.push_str(&format!("data: {frame}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    body
}
