//! Upstream provider clients
//!
//! One call or one stream against a single configured provider, speaking the
//! OpenAI-compatible chat-completions wire format. Transport failures are
//! classified into [`ProviderError`] at this boundary; raw reqwest errors
//! never escape the module.

mod client;
mod streaming;
mod wire;

pub use client::{CompletionBackend, HttpProviderClient, ProviderStream, ProviderSuccess};
pub(crate) use client::approximate_tokens;
pub use streaming::sse_text_stream;
pub use wire::{ChatCompletionRequest, ChatCompletionResponse, WireMessage, WireUsage};

use crate::utils::error::GatewayError;

/// Classified failure of one provider attempt
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("authentication rejected: {message}")]
    Auth { message: String },

    #[error("rate limited")]
    RateLimited { retry_after: Option<u64> },

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("malformed response: {message}")]
    Malformed { message: String },

    #[error("unexpected provider failure: {message}")]
    Unknown { message: String },
}

impl ProviderError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Classification code recorded into usage history
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Auth { .. } => "auth",
            Self::RateLimited { .. } => "rate_limited",
            Self::Server { .. } => "server",
            Self::Network { .. } => "network",
            Self::Malformed { .. } => "malformed",
            Self::Unknown { .. } => "unknown",
        }
    }

    /// Lift into the caller-facing taxonomy, attributed to `provider`
    pub fn into_gateway(self, provider: &str) -> GatewayError {
        let provider = provider.to_string();
        match self {
            Self::Timeout { seconds } => GatewayError::Timeout { provider, seconds },
            Self::Auth { message } => GatewayError::Auth { provider, message },
            Self::RateLimited { retry_after } => GatewayError::RateLimited {
                provider,
                retry_after,
            },
            Self::Network { message } => GatewayError::Network { provider, message },
            Self::Server { status, message } => GatewayError::UnknownProvider {
                provider,
                message: format!("upstream status {status}: {message}"),
            },
            Self::Malformed { message } | Self::Unknown { message } => {
                GatewayError::UnknownProvider { provider, message }
            }
        }
    }
}
