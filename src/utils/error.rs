//! Caller-facing error types for the gateway
//!
//! Failures against an individual provider are recovered internally by the
//! orchestrator (fallback, then the local Socratic stub); only a small set of
//! variants ever reaches callers. Every variant carries a stable machine
//! code so the HTTP layer can map errors without string matching.

/// Top-level error type for the moot gateway
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed request from the caller
    #[error("invalid request: {0}")]
    InvalidInput(String),

    /// Pre-flight cost check failed; no network call was made
    #[error("estimated cost ${estimated:.4} exceeds ceiling ${ceiling:.4}")]
    BudgetExceeded { estimated: f64, ceiling: f64 },

    /// No healthy provider was selectable
    #[error("no provider available: {0}")]
    ProviderUnavailable(String),

    /// A provider call exceeded its deadline
    #[error("provider {provider} timed out after {seconds}s")]
    Timeout { provider: String, seconds: u64 },

    /// Provider rejected the request with 429
    #[error("provider {provider} rate limited the request")]
    RateLimited {
        provider: String,
        retry_after: Option<u64>,
    },

    /// Provider rejected the configured credentials
    #[error("provider {provider} rejected credentials: {message}")]
    Auth { provider: String, message: String },

    /// Transport-level failure reaching the provider
    #[error("network error calling {provider}: {message}")]
    Network { provider: String, message: String },

    /// Provider returned something the gateway could not interpret
    #[error("unexpected response from {provider}: {message}")]
    UnknownProvider { provider: String, message: String },

    /// Every provider failed and the local fallback was disabled
    #[error("all providers exhausted and local fallback disabled")]
    AllProvidersExhausted,
}

impl GatewayError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn provider_unavailable(message: impl Into<String>) -> Self {
        Self::ProviderUnavailable(message.into())
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::ProviderUnavailable(_) => "provider_unavailable",
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::Auth { .. } => "auth_error",
            Self::Network { .. } => "network_error",
            Self::UnknownProvider { .. } => "unknown_provider_error",
            Self::AllProvidersExhausted => "all_providers_exhausted",
        }
    }

    /// Whether the orchestrator may recover by trying another provider
    pub fn is_provider_fault(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::RateLimited { .. }
                | Self::Auth { .. }
                | Self::Network { .. }
                | Self::UnknownProvider { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            GatewayError::invalid_input("empty history").code(),
            "invalid_input"
        );
        assert_eq!(
            GatewayError::BudgetExceeded {
                estimated: 0.62,
                ceiling: 0.50
            }
            .code(),
            "budget_exceeded"
        );
        assert_eq!(
            GatewayError::AllProvidersExhausted.code(),
            "all_providers_exhausted"
        );
    }

    #[test]
    fn test_budget_exceeded_display() {
        let err = GatewayError::BudgetExceeded {
            estimated: 0.62,
            ceiling: 0.50,
        };
        let message = err.to_string();
        assert!(message.contains("0.6200"));
        assert!(message.contains("0.5000"));
    }

    #[test]
    fn test_provider_faults_are_recoverable() {
        let recoverable = GatewayError::Timeout {
            provider: "primary".to_string(),
            seconds: 30,
        };
        assert!(recoverable.is_provider_fault());

        let terminal = GatewayError::invalid_input("bad request");
        assert!(!terminal.is_provider_fault());
        assert!(!GatewayError::AllProvidersExhausted.is_provider_fault());
    }
}
