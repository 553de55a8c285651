//! Core orchestration: domain types, provider clients, registry, and the
//! fallback pipeline

pub mod orchestrator;
pub mod providers;
pub mod registry;
pub mod stub;
pub mod types;

pub use orchestrator::{GenerationStream, Orchestrator};
pub use registry::{ProviderRegistry, ProviderStatus, ProviderStatusView};
pub use types::{ChatMessage, Generation, MessageRole, RequestContext, TokenUsage};
