//! Gateway configuration
//!
//! `GatewayConfig` deserializes from any serde source and can also be
//! assembled from the process environment (`MOOT_PRIMARY_*` /
//! `MOOT_FALLBACK_*` provider pairs plus global knobs). Every field carries
//! a serde default so partial documents stay valid.

use serde::{Deserialize, Serialize};

/// Configuration loading/validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingEnv(String),

    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },

    #[error("configuration invalid: {0}")]
    Invalid(String),
}

/// One configured upstream provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Stable identifier used in health tracking and metrics
    pub id: String,
    /// Display name
    pub name: String,
    /// Chat-completions endpoint URL
    pub endpoint: String,
    /// API key sent as a bearer credential
    pub api_key: String,
    /// Model name requested from this provider
    pub model: String,
    /// Lower is preferred
    #[serde(default)]
    pub priority: u8,
    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Sampling temperature for Socratic question generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Thresholds evaluated by the performance monitor after every record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Daily spend ceiling in USD
    #[serde(default = "default_daily_cost")]
    pub daily_cost: f64,
    /// Hourly spend ceiling in USD
    #[serde(default = "default_hourly_cost")]
    pub hourly_cost: f64,
    /// Ceiling on the running average latency
    #[serde(default = "default_max_avg_latency_ms")]
    pub max_avg_latency_ms: f64,
    /// Success-rate floor, 0.0–1.0
    #[serde(default = "default_min_success_rate")]
    pub min_success_rate: f64,
    /// Error-rate ceiling, 0.0–1.0
    #[serde(default = "default_max_error_rate")]
    pub max_error_rate: f64,
    /// Token ceiling over the trailing hour
    #[serde(default = "default_hourly_tokens")]
    pub hourly_tokens: u64,
    /// Request ceiling over the trailing minute
    #[serde(default = "default_per_minute_requests")]
    pub per_minute_requests: u64,
    /// Minimum recorded attempts before rate-based rules fire
    #[serde(default = "default_min_samples")]
    pub min_samples: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            daily_cost: default_daily_cost(),
            hourly_cost: default_hourly_cost(),
            max_avg_latency_ms: default_max_avg_latency_ms(),
            min_success_rate: default_min_success_rate(),
            max_error_rate: default_max_error_rate(),
            hourly_tokens: default_hourly_tokens(),
            per_minute_requests: default_per_minute_requests(),
            min_samples: default_min_samples(),
        }
    }
}

/// Top-level gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Configured providers, any order; selection uses `priority`
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Default per-request cost ceiling in USD
    #[serde(default = "default_cost_ceiling")]
    pub cost_ceiling: f64,
    /// Default context window granted to requests
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: u32,
    /// Tokens held back from the output budget
    #[serde(default = "default_reserve_tokens")]
    pub reserve_tokens: u32,
    /// Consecutive failures before a provider is marked down
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds between registry health probes
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    /// Alerting thresholds
    #[serde(default)]
    pub thresholds: AlertThresholds,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            cost_ceiling: default_cost_ceiling(),
            max_context_tokens: default_max_context_tokens(),
            reserve_tokens: default_reserve_tokens(),
            failure_threshold: default_failure_threshold(),
            probe_interval_secs: default_probe_interval_secs(),
            thresholds: AlertThresholds::default(),
        }
    }
}

impl GatewayConfig {
    /// Assemble configuration from `MOOT_*` environment variables
    ///
    /// `MOOT_PRIMARY_{ENDPOINT,API_KEY,MODEL}` are required; the matching
    /// `MOOT_FALLBACK_*` set is optional and registers a second provider at
    /// the next priority.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut providers = Vec::new();

        providers.push(provider_from_env("PRIMARY", 0)?);
        if std::env::var("MOOT_FALLBACK_ENDPOINT").is_ok() {
            providers.push(provider_from_env("FALLBACK", 1)?);
        }

        let mut config = Self {
            providers,
            ..Self::default()
        };
        if let Some(ceiling) = parse_env("MOOT_COST_CEILING")? {
            config.cost_ceiling = ceiling;
        }
        if let Some(window) = parse_env("MOOT_MAX_CONTEXT_TOKENS")? {
            config.max_context_tokens = window;
        }
        if let Some(reserve) = parse_env("MOOT_RESERVE_TOKENS")? {
            config.reserve_tokens = reserve;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            if provider.endpoint.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "provider '{}' has an empty endpoint",
                    provider.id
                )));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate provider id '{}'",
                    provider.id
                )));
            }
        }
        if self.cost_ceiling <= 0.0 {
            return Err(ConfigError::Invalid(
                "cost_ceiling must be positive".to_string(),
            ));
        }
        if self.max_context_tokens <= self.reserve_tokens {
            return Err(ConfigError::Invalid(
                "max_context_tokens must exceed reserve_tokens".to_string(),
            ));
        }
        Ok(())
    }
}

fn provider_from_env(prefix: &str, priority: u8) -> Result<ProviderConfig, ConfigError> {
    let var = |suffix: &str| {
        let name = format!("MOOT_{prefix}_{suffix}");
        std::env::var(&name).map_err(|_| ConfigError::MissingEnv(name))
    };
    Ok(ProviderConfig {
        id: prefix.to_lowercase(),
        name: format!("{prefix} provider"),
        endpoint: var("ENDPOINT")?,
        api_key: var("API_KEY")?,
        model: var("MODEL")?,
        priority,
        timeout_secs: std::env::var(format!("MOOT_{prefix}_TIMEOUT_SECS"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_timeout_secs),
        temperature: default_temperature(),
    })
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                message: format!("could not parse '{raw}'"),
            }),
        Err(_) => Ok(None),
    }
}

fn default_timeout_secs() -> u64 {
    45
}

fn default_temperature() -> f32 {
    0.7
}

fn default_cost_ceiling() -> f64 {
    0.50
}

fn default_max_context_tokens() -> u32 {
    8000
}

fn default_reserve_tokens() -> u32 {
    200
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_probe_interval_secs() -> u64 {
    60
}

fn default_daily_cost() -> f64 {
    25.0
}

fn default_hourly_cost() -> f64 {
    5.0
}

fn default_max_avg_latency_ms() -> f64 {
    10_000.0
}

fn default_min_success_rate() -> f64 {
    0.85
}

fn default_max_error_rate() -> f64 {
    0.20
}

fn default_hourly_tokens() -> u64 {
    500_000
}

fn default_per_minute_requests() -> u64 {
    120
}

fn default_min_samples() -> u64 {
    10
}
