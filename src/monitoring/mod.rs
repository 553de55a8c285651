//! Rolling metrics, per-provider health scoring, and threshold alerting

mod monitor;
pub mod types;

pub use monitor::PerformanceMonitor;
pub use types::{
    Alert, AlertKind, AlertSeverity, DailyUsage, MetricsSnapshot, ProviderHealth,
    ProviderHealthView, TotalMetrics, UsageRecord, UsageReport,
};
