//! HTTP provider client

use std::pin::Pin;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::Stream;
use tracing::debug;

use super::ProviderError;
use super::streaming::sse_text_stream;
use super::wire::{ChatCompletionRequest, ChatCompletionResponse};
use crate::config::ProviderConfig;
use crate::core::types::{RequestContext, TokenUsage};
use crate::utils::tokens::TokenEstimate;

/// Result of one successful provider call
#[derive(Debug, Clone)]
pub struct ProviderSuccess {
    pub content: String,
    pub usage: TokenUsage,
    pub latency_ms: u64,
}

/// Pull-based token stream from one provider connection
pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Seam between the orchestrator and provider transports
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Execute one call against a single provider
    async fn complete(
        &self,
        provider: &ProviderConfig,
        context: &RequestContext,
        budget: &TokenEstimate,
    ) -> Result<ProviderSuccess, ProviderError>;

    /// Open one streaming call against a single provider
    async fn open_stream(
        &self,
        provider: &ProviderConfig,
        context: &RequestContext,
        budget: &TokenEstimate,
    ) -> Result<ProviderStream, ProviderError>;
}

/// Provider client speaking the OpenAI-compatible chat-completions protocol
#[derive(Debug, Clone)]
pub struct HttpProviderClient {
    http: reqwest::Client,
}

impl HttpProviderClient {
    pub fn new() -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Send the request and surface a classified error on any non-2xx status
    ///
    /// The timeout covers connection and response headers; streaming bodies
    /// are read after this returns and are paced by the consumer.
    async fn send(
        &self,
        provider: &ProviderConfig,
        body: &ChatCompletionRequest,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = tokio::time::timeout(
            Duration::from_secs(provider.timeout_secs),
            self.http
                .post(&provider.endpoint)
                .bearer_auth(&provider.api_key)
                .json(body)
                .send(),
        )
        .await
        .map_err(|_| ProviderError::Timeout {
            seconds: provider.timeout_secs,
        })?
        .map_err(|e| classify_transport(e, provider.timeout_secs))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unreadable error body".to_string());

        Err(match status.as_u16() {
            401 | 403 => ProviderError::Auth { message },
            429 => ProviderError::RateLimited { retry_after },
            s if s >= 500 => ProviderError::Server { status: s, message },
            s => ProviderError::unknown(format!("unexpected status {s}: {message}")),
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpProviderClient {
    async fn complete(
        &self,
        provider: &ProviderConfig,
        context: &RequestContext,
        budget: &TokenEstimate,
    ) -> Result<ProviderSuccess, ProviderError> {
        let body = ChatCompletionRequest::from_context(
            context,
            &provider.model,
            provider.temperature,
            budget.output_tokens,
            false,
        );

        let started = Instant::now();
        let response = self.send(provider, &body).await?;
        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::malformed(format!("body did not match schema: {e}")))?;
        let content = parsed.primary_content()?.to_string();
        let latency_ms = started.elapsed().as_millis() as u64;

        let usage = match parsed.usage {
            Some(usage) => TokenUsage::new(usage.prompt_tokens, usage.completion_tokens),
            // Provider omitted usage; fall back to our own accounting
            None => TokenUsage::new(budget.input_tokens, approximate_tokens(&content)),
        };

        debug!(
            provider = %provider.id,
            model = %provider.model,
            latency_ms,
            total_tokens = usage.total_tokens,
            "provider call completed"
        );

        Ok(ProviderSuccess {
            content,
            usage,
            latency_ms,
        })
    }

    async fn open_stream(
        &self,
        provider: &ProviderConfig,
        context: &RequestContext,
        budget: &TokenEstimate,
    ) -> Result<ProviderStream, ProviderError> {
        let body = ChatCompletionRequest::from_context(
            context,
            &provider.model,
            provider.temperature,
            budget.output_tokens,
            true,
        );

        let response = self.send(provider, &body).await?;
        debug!(provider = %provider.id, "stream opened");
        Ok(Box::pin(sse_text_stream(response.bytes_stream())))
    }
}

fn classify_transport(error: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout {
            seconds: timeout_secs,
        }
    } else if error.is_connect() || error.is_request() {
        ProviderError::network(error.to_string())
    } else {
        ProviderError::unknown(error.to_string())
    }
}

/// Coarse token approximation for content whose usage the provider omitted
pub(crate) fn approximate_tokens(text: &str) -> u32 {
    (text.chars().count() as f64 / 4.0).ceil() as u32
}
