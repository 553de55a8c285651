//! Request orchestration
//!
//! The public entry point of the gateway. A request runs through an ordered
//! list of attempt stages (primary provider, fallback provider, local
//! Socratic stub), short-circuiting on the first success. Cost is estimated
//! and checked before any network call; every terminal attempt is recorded
//! into the performance monitor exactly once.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::{Stream, StreamExt};
use pin_project_lite::pin_project;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{GatewayConfig, ProviderConfig};
use crate::core::providers::{
    CompletionBackend, HttpProviderClient, ProviderError, ProviderStream, approximate_tokens,
};
use crate::core::registry::ProviderRegistry;
use crate::core::stub::{STUB_MODEL, STUB_PROVIDER_ID, socratic_stub};
use crate::core::types::{Generation, RequestContext, TokenUsage};
use crate::monitoring::{PerformanceMonitor, UsageRecord};
use crate::utils::cost::CostGuard;
use crate::utils::error::{GatewayError, Result};
use crate::utils::tokens::{TokenBudgetEstimator, TokenEstimate};

pin_project! {
    /// Pull-based token stream returned by [`Orchestrator::generate_stream`]
    ///
    /// Dropping the stream closes the provider connection; no further
    /// tokens are produced after cancellation.
    pub struct GenerationStream {
        #[pin]
        inner: Pin<Box<dyn Stream<Item = Result<String>> + Send>>,
        provider: String,
        fallback: bool,
        stub: bool,
    }
}

impl GenerationStream {
    /// Provider serving this stream ("local" for the stub)
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn is_stub(&self) -> bool {
        self.stub
    }
}

impl Stream for GenerationStream {
    type Item = Result<String>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }
}

/// Sequences token budgeting, cost guarding, provider calls, failover, and
/// the local last-resort response
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    monitor: Arc<PerformanceMonitor>,
    backend: Arc<dyn CompletionBackend>,
    estimator: TokenBudgetEstimator,
    guard: CostGuard,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        monitor: Arc<PerformanceMonitor>,
        backend: Arc<dyn CompletionBackend>,
        estimator: TokenBudgetEstimator,
    ) -> Self {
        Self {
            registry,
            monitor,
            backend,
            estimator,
            guard: CostGuard::new(),
        }
    }

    /// Wire up a gateway from configuration with the HTTP provider client
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let registry = Arc::new(ProviderRegistry::new(
            config.providers.clone(),
            config.failure_threshold,
        ));
        let monitor = Arc::new(PerformanceMonitor::new(config.thresholds.clone()));
        let backend = HttpProviderClient::new().map_err(|e| e.into_gateway("gateway"))?;
        Ok(Self::new(
            registry,
            monitor,
            Arc::new(backend),
            TokenBudgetEstimator::new(config.reserve_tokens),
        ))
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.monitor
    }

    /// Produce one complete response for the dialogue
    pub async fn generate(&self, context: &RequestContext) -> Result<Generation> {
        validate(context)?;
        let request_id = Uuid::new_v4().to_string();

        if let Some(primary) = self.registry.select_primary() {
            let estimate = self.estimator.estimate(context, &primary);
            self.preflight(&primary, context, &estimate)?;

            if let Ok(generation) = self
                .attempt(&primary, context, &estimate, false, &request_id)
                .await
            {
                return Ok(generation);
            }

            if let Some(fallback) = self.registry.select_fallback(&[primary.id.as_str()]) {
                let estimate = self.estimator.estimate(context, &fallback);
                if self.fallback_affordable(&fallback, context, &estimate) {
                    if let Ok(generation) = self
                        .attempt(&fallback, context, &estimate, true, &request_id)
                        .await
                    {
                        return Ok(generation);
                    }
                }
            }
        } else {
            debug!(session = %context.session_id, "no provider selectable");
        }

        if context.allow_local_fallback {
            Ok(self.local_generation(context, &request_id))
        } else {
            Err(GatewayError::AllProvidersExhausted)
        }
    }

    /// Open a streaming response for the dialogue
    ///
    /// Selection and cost guarding follow [`Self::generate`]; a stream that
    /// fails to open triggers the same fallback sequence. The terminal
    /// outcome of an opened stream is recorded when it finishes.
    pub async fn generate_stream(&self, context: &RequestContext) -> Result<GenerationStream> {
        validate(context)?;

        if let Some(primary) = self.registry.select_primary() {
            let estimate = self.estimator.estimate(context, &primary);
            self.preflight(&primary, context, &estimate)?;

            if let Ok(stream) = self
                .open_stream_attempt(&primary, context, &estimate, false)
                .await
            {
                return Ok(stream);
            }

            if let Some(fallback) = self.registry.select_fallback(&[primary.id.as_str()]) {
                let estimate = self.estimator.estimate(context, &fallback);
                if self.fallback_affordable(&fallback, context, &estimate) {
                    if let Ok(stream) = self
                        .open_stream_attempt(&fallback, context, &estimate, true)
                        .await
                    {
                        return Ok(stream);
                    }
                }
            }
        }

        if context.allow_local_fallback {
            Ok(self.local_stream(context))
        } else {
            Err(GatewayError::AllProvidersExhausted)
        }
    }

    /// Budget check for the primary stage; rejects before any network call
    fn preflight(
        &self,
        provider: &ProviderConfig,
        context: &RequestContext,
        estimate: &TokenEstimate,
    ) -> Result<()> {
        let cost = self.guard.estimate(
            estimate.input_tokens,
            estimate.output_tokens,
            &provider.model,
            context.cost_ceiling,
        );
        if !cost.within_budget {
            debug!(
                provider = %provider.id,
                estimated = cost.total_cost,
                ceiling = context.cost_ceiling,
                "request rejected by cost guard"
            );
            return Err(GatewayError::BudgetExceeded {
                estimated: cost.total_cost,
                ceiling: context.cost_ceiling,
            });
        }
        if let Some(suggestion) = &estimate.suggestion {
            debug!(provider = %provider.id, %suggestion, "token budget not optimal");
        }
        Ok(())
    }

    /// An over-budget fallback is skipped rather than surfaced
    fn fallback_affordable(
        &self,
        provider: &ProviderConfig,
        context: &RequestContext,
        estimate: &TokenEstimate,
    ) -> bool {
        let cost = self.guard.estimate(
            estimate.input_tokens,
            estimate.output_tokens,
            &provider.model,
            context.cost_ceiling,
        );
        if !cost.within_budget {
            debug!(provider = %provider.id, "fallback skipped: over budget");
        }
        cost.within_budget
    }

    async fn attempt(
        &self,
        provider: &ProviderConfig,
        context: &RequestContext,
        estimate: &TokenEstimate,
        fallback: bool,
        request_id: &str,
    ) -> std::result::Result<Generation, ProviderError> {
        let started = Instant::now();
        match self.backend.complete(provider, context, estimate).await {
            Ok(success) => {
                let cost = self.guard.actual_cost(
                    success.usage.input_tokens,
                    success.usage.output_tokens,
                    &provider.model,
                );
                self.registry.mark_succeeded(&provider.id);
                self.monitor.record(UsageRecord::success(
                    &provider.id,
                    success.latency_ms,
                    success.usage.input_tokens,
                    success.usage.output_tokens,
                    cost,
                    fallback,
                ));
                info!(
                    provider = %provider.id,
                    fallback,
                    latency_ms = success.latency_ms,
                    cost,
                    "generation completed"
                );
                Ok(Generation {
                    request_id: request_id.to_string(),
                    content: success.content,
                    provider: provider.id.clone(),
                    model: provider.model.clone(),
                    usage: success.usage,
                    cost,
                    latency_ms: success.latency_ms,
                    fallback,
                    stub: false,
                })
            }
            Err(error) => {
                warn!(
                    provider = %provider.id,
                    code = error.code(),
                    %error,
                    "provider attempt failed"
                );
                self.registry.mark_failed(&provider.id);
                self.monitor.record(UsageRecord::failure(
                    &provider.id,
                    started.elapsed().as_millis() as u64,
                    error.code(),
                    fallback,
                ));
                Err(error)
            }
        }
    }

    async fn open_stream_attempt(
        &self,
        provider: &ProviderConfig,
        context: &RequestContext,
        estimate: &TokenEstimate,
        fallback: bool,
    ) -> std::result::Result<GenerationStream, ProviderError> {
        let started = Instant::now();
        match self.backend.open_stream(provider, context, estimate).await {
            Ok(inner) => {
                Ok(self.recorded_stream(provider, inner, estimate.input_tokens, fallback, started))
            }
            Err(error) => {
                warn!(
                    provider = %provider.id,
                    code = error.code(),
                    %error,
                    "stream open failed"
                );
                self.registry.mark_failed(&provider.id);
                self.monitor.record(UsageRecord::failure(
                    &provider.id,
                    started.elapsed().as_millis() as u64,
                    error.code(),
                    fallback,
                ));
                Err(error)
            }
        }
    }

    /// Wrap a provider stream so its terminal outcome lands in the monitor
    fn recorded_stream(
        &self,
        provider: &ProviderConfig,
        mut inner: ProviderStream,
        input_tokens: u32,
        fallback: bool,
        started: Instant,
    ) -> GenerationStream {
        let registry = Arc::clone(&self.registry);
        let monitor = Arc::clone(&self.monitor);
        let guard = self.guard.clone();
        let provider_id = provider.id.clone();
        let model = provider.model.clone();

        let stream = async_stream::stream! {
            let mut produced = String::new();
            while let Some(item) = inner.next().await {
                match item {
                    Ok(token) => {
                        produced.push_str(&token);
                        yield Ok(token);
                    }
                    Err(error) => {
                        warn!(provider = %provider_id, code = error.code(), "stream failed mid-flight");
                        registry.mark_failed(&provider_id);
                        monitor.record(UsageRecord::failure(
                            &provider_id,
                            started.elapsed().as_millis() as u64,
                            error.code(),
                            fallback,
                        ));
                        yield Err(error.into_gateway(&provider_id));
                        return;
                    }
                }
            }
            let output_tokens = approximate_tokens(&produced);
            let cost = guard.actual_cost(input_tokens, output_tokens, &model);
            registry.mark_succeeded(&provider_id);
            monitor.record(UsageRecord::success(
                &provider_id,
                started.elapsed().as_millis() as u64,
                input_tokens,
                output_tokens,
                cost,
                fallback,
            ));
        };

        GenerationStream {
            inner: Box::pin(stream),
            provider: provider.id.clone(),
            fallback,
            stub: false,
        }
    }

    fn local_generation(&self, context: &RequestContext, request_id: &str) -> Generation {
        let content = socratic_stub(context);
        let usage = TokenUsage::new(0, approximate_tokens(&content));
        self.monitor.record(UsageRecord::success(
            STUB_PROVIDER_ID,
            0,
            usage.input_tokens,
            usage.output_tokens,
            0.0,
            true,
        ));
        info!(session = %context.session_id, "serving rule-based fallback response");
        Generation {
            request_id: request_id.to_string(),
            content,
            provider: STUB_PROVIDER_ID.to_string(),
            model: STUB_MODEL.to_string(),
            usage,
            cost: 0.0,
            latency_ms: 0,
            fallback: true,
            stub: true,
        }
    }

    fn local_stream(&self, context: &RequestContext) -> GenerationStream {
        let content = socratic_stub(context);
        self.monitor.record(UsageRecord::success(
            STUB_PROVIDER_ID,
            0,
            0,
            approximate_tokens(&content),
            0.0,
            true,
        ));
        info!(session = %context.session_id, "serving rule-based fallback stream");
        let chunks: Vec<Result<String>> = content
            .split_inclusive(' ')
            .map(|word| Ok(word.to_string()))
            .collect();
        GenerationStream {
            inner: Box::pin(futures::stream::iter(chunks)),
            provider: STUB_PROVIDER_ID.to_string(),
            fallback: true,
            stub: true,
        }
    }
}

fn validate(context: &RequestContext) -> Result<()> {
    if context.messages.is_empty() {
        return Err(GatewayError::invalid_input(
            "message history must not be empty",
        ));
    }
    if context.cost_ceiling <= 0.0 {
        return Err(GatewayError::invalid_input("cost ceiling must be positive"));
    }
    Ok(())
}
