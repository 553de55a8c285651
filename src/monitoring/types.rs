//! Monitoring data types

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One terminal attempt, successful or not
#[derive(Debug, Clone, Serialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub latency_ms: u64,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub cost: f64,
    pub success: bool,
    /// Failure classification code when `success` is false
    pub error: Option<&'static str>,
    /// True when this attempt was not against the primary provider
    pub fallback: bool,
}

impl UsageRecord {
    pub fn success(
        provider: impl Into<String>,
        latency_ms: u64,
        input_tokens: u32,
        output_tokens: u32,
        cost: f64,
        fallback: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            provider: provider.into(),
            latency_ms,
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            cost,
            success: true,
            error: None,
            fallback,
        }
    }

    pub fn failure(
        provider: impl Into<String>,
        latency_ms: u64,
        error: &'static str,
        fallback: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            provider: provider.into(),
            latency_ms,
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            cost: 0.0,
            success: false,
            error: Some(error),
            fallback,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Alert category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Cost,
    Performance,
    Usage,
    Error,
}

/// Alert severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// A raised threshold alert
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
}

/// Rolling per-provider health accounting
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub provider_id: String,
    pub requests: u64,
    pub successes: u64,
    pub consecutive_failures: u32,
    pub avg_latency_ms: f64,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub last_used: DateTime<Utc>,
}

/// Latency above this floor starts eroding the health score
const LATENCY_FLOOR_MS: f64 = 2000.0;
/// Per-consecutive-failure decay applied to the composite score
const FAILURE_DECAY: f64 = 0.85;

impl ProviderHealth {
    pub fn new(provider_id: impl Into<String>, first_seen: DateTime<Utc>) -> Self {
        Self {
            provider_id: provider_id.into(),
            requests: 0,
            successes: 0,
            consecutive_failures: 0,
            avg_latency_ms: 0.0,
            total_cost: 0.0,
            total_tokens: 0,
            last_used: first_seen,
        }
    }

    pub fn apply(&mut self, record: &UsageRecord) {
        self.requests += 1;
        if record.success {
            self.successes += 1;
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
        }
        let n = self.requests as f64;
        self.avg_latency_ms += (record.latency_ms as f64 - self.avg_latency_ms) / n;
        self.total_cost += record.cost;
        self.total_tokens += u64::from(record.total_tokens);
        self.last_used = record.timestamp;
    }

    pub fn success_rate(&self) -> f64 {
        if self.requests == 0 {
            return 1.0;
        }
        self.successes as f64 / self.requests as f64
    }

    /// Composite 0–100 health score
    ///
    /// Success rate dominates; sustained latency above the floor and a day
    /// of disuse erode the remainder, and each consecutive failure decays
    /// the whole score toward zero.
    pub fn health_score(&self, now: DateTime<Utc>) -> f64 {
        if self.requests == 0 {
            return 100.0;
        }
        let success = self.success_rate() * 60.0;
        let latency = if self.avg_latency_ms <= LATENCY_FLOOR_MS {
            25.0
        } else {
            25.0 * (LATENCY_FLOOR_MS / self.avg_latency_ms)
        };
        let recency = if now - self.last_used < chrono::Duration::hours(24) {
            15.0
        } else {
            5.0
        };
        let decay = FAILURE_DECAY.powi(self.consecutive_failures as i32);
        ((success + latency + recency) * decay).clamp(0.0, 100.0)
    }
}

/// Per-provider entry in a metrics snapshot, with the score materialized
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealthView {
    #[serde(flatten)]
    pub health: ProviderHealth,
    pub success_rate: f64,
    pub health_score: f64,
}

/// Gateway-wide running aggregates
#[derive(Debug, Clone, Default, Serialize)]
pub struct TotalMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Terminal attempts that did not run against the primary provider
    pub fallback_count: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost: f64,
    pub avg_latency_ms: f64,
}

/// One day's usage bucket
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DailyUsage {
    pub requests: u64,
    pub tokens: u64,
    pub cost: f64,
}

/// Point-in-time aggregate view
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub totals: TotalMetrics,
    pub providers: Vec<ProviderHealthView>,
    pub daily: Vec<(NaiveDate, DailyUsage)>,
}

/// Aggregates over an explicit time window
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub fallbacks: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub avg_latency_ms: f64,
    pub requests_by_provider: std::collections::HashMap<String, u64>,
}
