//! # moot-gateway
//!
//! Resilient AI provider gateway for the moot courtroom platform. Turns a
//! logical "generate a Socratic response" request into a governed,
//! observable, fault-tolerant call (or token stream) against a set of
//! OpenAI-compatible providers:
//!
//! - **Cost guarded**: token budget and monetary cost are estimated and
//!   checked before any network call.
//! - **Fault tolerant**: priority-ordered failover between providers, with
//!   a deterministic rule-based Socratic response as the last resort, so a
//!   classroom never sees a raw upstream failure.
//! - **Observable**: every terminal attempt lands in rolling metrics with
//!   per-provider health scores and deduplicated threshold alerts.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use moot_gateway::{ChatMessage, GatewayConfig, Orchestrator, RequestContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::from_env()?;
//!     let orchestrator = Orchestrator::from_config(&config)?;
//!
//!     let context = RequestContext::builder("classroom-7")
//!         .message(ChatMessage::system("You are a Socratic law tutor."))
//!         .message(ChatMessage::user("Is a promise to keep an offer open binding?"))
//!         .topic("option contracts")
//!         .build()?;
//!
//!     let generation = orchestrator.generate(&context).await?;
//!     println!("[{}] {}", generation.provider, generation.content);
//!     Ok(())
//! }
//! ```
//!
//! Streaming uses the same selection and guard path and returns a pull-based
//! token stream; dropping the stream cancels the upstream connection.

#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod monitoring;
pub mod utils;

pub use crate::config::{AlertThresholds, ConfigError, GatewayConfig, ProviderConfig};
pub use crate::core::orchestrator::{GenerationStream, Orchestrator};
pub use crate::core::providers::{
    CompletionBackend, HttpProviderClient, ProviderError, ProviderSuccess,
};
pub use crate::core::registry::{ProviderRegistry, ProviderStatus, ProviderStatusView};
pub use crate::core::types::{ChatMessage, Generation, MessageRole, RequestContext, TokenUsage};
pub use crate::monitoring::{
    Alert, AlertKind, AlertSeverity, MetricsSnapshot, PerformanceMonitor, UsageRecord, UsageReport,
};
pub use crate::utils::cost::{CostEstimate, CostGuard};
pub use crate::utils::error::{GatewayError, Result};
pub use crate::utils::tokens::{TokenBudgetEstimator, TokenEstimate};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
