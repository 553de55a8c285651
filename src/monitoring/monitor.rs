//! Performance monitor: rolling metrics, provider health, threshold alerts
//!
//! All state sits behind one mutex; `record` is the single write path. Rule
//! evaluation and pruning run on the recording thread using the record's
//! own timestamp, so behavior is deterministic under test.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{
    Alert, AlertKind, AlertSeverity, DailyUsage, MetricsSnapshot, ProviderHealth,
    ProviderHealthView, TotalMetrics, UsageRecord, UsageReport,
};
use crate::config::AlertThresholds;

const HISTORY_CAP: usize = 10_000;
const DEDUP_WINDOW_MINUTES: i64 = 5;
const PRUNE_INTERVAL_MINUTES: i64 = 60;
const HISTORY_RETENTION_DAYS: i64 = 7;
const ACKNOWLEDGED_RETENTION_HOURS: i64 = 24;

#[derive(Debug)]
struct MonitorState {
    history: VecDeque<UsageRecord>,
    totals: TotalMetrics,
    providers: HashMap<String, ProviderHealth>,
    daily: BTreeMap<NaiveDate, DailyUsage>,
    alerts: Vec<Alert>,
    last_prune: DateTime<Utc>,
}

/// Records terminal attempts and raises deduplicated threshold alerts
#[derive(Debug)]
pub struct PerformanceMonitor {
    state: Mutex<MonitorState>,
    thresholds: AlertThresholds,
}

impl PerformanceMonitor {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                history: VecDeque::new(),
                totals: TotalMetrics::default(),
                providers: HashMap::new(),
                daily: BTreeMap::new(),
                alerts: Vec::new(),
                last_prune: Utc::now() - Duration::minutes(PRUNE_INTERVAL_MINUTES),
            }),
            thresholds,
        }
    }

    /// Fold one terminal attempt into the rolling state
    pub fn record(&self, record: UsageRecord) {
        let now = record.timestamp;
        let mut state = self.state.lock();

        state.totals.total_requests += 1;
        if record.success {
            state.totals.successful_requests += 1;
        } else {
            state.totals.failed_requests += 1;
        }
        if record.fallback {
            state.totals.fallback_count += 1;
        }
        state.totals.total_input_tokens += u64::from(record.input_tokens);
        state.totals.total_output_tokens += u64::from(record.output_tokens);
        state.totals.total_cost += record.cost;
        let n = state.totals.total_requests as f64;
        state.totals.avg_latency_ms += (record.latency_ms as f64 - state.totals.avg_latency_ms) / n;

        state
            .providers
            .entry(record.provider.clone())
            .or_insert_with(|| ProviderHealth::new(record.provider.clone(), now))
            .apply(&record);

        let day = state.daily.entry(now.date_naive()).or_default();
        day.requests += 1;
        day.tokens += u64::from(record.total_tokens);
        day.cost += record.cost;

        debug!(
            provider = %record.provider,
            success = record.success,
            cost = record.cost,
            latency_ms = record.latency_ms,
            fallback = record.fallback,
            "usage recorded"
        );

        state.history.push_back(record);
        if state.history.len() > HISTORY_CAP {
            state.history.pop_front();
        }

        self.evaluate_rules(&mut state, now);
        self.maybe_prune(&mut state, now);
    }

    /// Aggregate snapshot for dashboards
    pub fn metrics(&self) -> MetricsSnapshot {
        let state = self.state.lock();
        let now = Utc::now();
        let mut providers: Vec<ProviderHealthView> = state
            .providers
            .values()
            .map(|health| ProviderHealthView {
                success_rate: health.success_rate(),
                health_score: health.health_score(now),
                health: health.clone(),
            })
            .collect();
        providers.sort_by(|a, b| a.health.provider_id.cmp(&b.health.provider_id));
        MetricsSnapshot {
            generated_at: now,
            totals: state.totals.clone(),
            providers,
            daily: state.daily.iter().map(|(d, u)| (*d, *u)).collect(),
        }
    }

    /// Health accounting for one provider, if it has been seen
    pub fn provider_health(&self, provider_id: &str) -> Option<ProviderHealth> {
        self.state.lock().providers.get(provider_id).cloned()
    }

    /// Most recent records, newest first
    pub fn recent_records(&self, limit: usize) -> Vec<UsageRecord> {
        self.state
            .lock()
            .history
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Raised alerts, newest first
    pub fn alerts(&self, include_acknowledged: bool) -> Vec<Alert> {
        let state = self.state.lock();
        let mut alerts: Vec<Alert> = state
            .alerts
            .iter()
            .filter(|a| include_acknowledged || !a.acknowledged)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        alerts
    }

    /// Mark an alert acknowledged; false when the id is unknown
    pub fn acknowledge(&self, alert_id: Uuid) -> bool {
        let mut state = self.state.lock();
        match state.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Windowed aggregate over `[from, to)`
    pub fn report(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> UsageReport {
        let state = self.state.lock();
        let mut report = UsageReport {
            from,
            to,
            requests: 0,
            successes: 0,
            failures: 0,
            fallbacks: 0,
            input_tokens: 0,
            output_tokens: 0,
            cost: 0.0,
            avg_latency_ms: 0.0,
            requests_by_provider: HashMap::new(),
        };
        let mut latency_sum = 0.0;
        for record in state
            .history
            .iter()
            .filter(|r| r.timestamp >= from && r.timestamp < to)
        {
            report.requests += 1;
            if record.success {
                report.successes += 1;
            } else {
                report.failures += 1;
            }
            if record.fallback {
                report.fallbacks += 1;
            }
            report.input_tokens += u64::from(record.input_tokens);
            report.output_tokens += u64::from(record.output_tokens);
            report.cost += record.cost;
            latency_sum += record.latency_ms as f64;
            *report
                .requests_by_provider
                .entry(record.provider.clone())
                .or_insert(0) += 1;
        }
        if report.requests > 0 {
            report.avg_latency_ms = latency_sum / report.requests as f64;
        }
        report
    }

    fn evaluate_rules(&self, state: &mut MonitorState, now: DateTime<Utc>) {
        let t = &self.thresholds;
        let mut raised: Vec<(AlertKind, AlertSeverity, String, String)> = Vec::new();

        let today = state
            .daily
            .get(&now.date_naive())
            .copied()
            .unwrap_or_default();
        if today.cost > t.daily_cost {
            raised.push((
                AlertKind::Cost,
                AlertSeverity::Critical,
                "Daily cost limit exceeded".to_string(),
                format!("spent ${:.2} today against a ${:.2} limit", today.cost, t.daily_cost),
            ));
        }

        let hour_ago = now - Duration::hours(1);
        let (hour_cost, hour_tokens) = state
            .history
            .iter()
            .rev()
            .take_while(|r| r.timestamp >= hour_ago)
            .fold((0.0, 0u64), |(cost, tokens), r| {
                (cost + r.cost, tokens + u64::from(r.total_tokens))
            });
        if hour_cost > t.hourly_cost {
            raised.push((
                AlertKind::Cost,
                AlertSeverity::Warning,
                "Hourly cost limit exceeded".to_string(),
                format!("spent ${hour_cost:.2} in the last hour against a ${:.2} limit", t.hourly_cost),
            ));
        }
        if hour_tokens > t.hourly_tokens {
            raised.push((
                AlertKind::Usage,
                AlertSeverity::Warning,
                "Hourly token ceiling exceeded".to_string(),
                format!("{hour_tokens} tokens in the last hour against a {} ceiling", t.hourly_tokens),
            ));
        }

        let minute_ago = now - Duration::minutes(1);
        let minute_requests = state
            .history
            .iter()
            .rev()
            .take_while(|r| r.timestamp >= minute_ago)
            .count() as u64;
        if minute_requests > t.per_minute_requests {
            raised.push((
                AlertKind::Usage,
                AlertSeverity::Info,
                "Request rate spike".to_string(),
                format!("{minute_requests} requests in the last minute against a {} ceiling", t.per_minute_requests),
            ));
        }

        if state.totals.total_requests >= t.min_samples {
            if state.totals.avg_latency_ms > t.max_avg_latency_ms {
                raised.push((
                    AlertKind::Performance,
                    AlertSeverity::Warning,
                    "Average latency above threshold".to_string(),
                    format!(
                        "running average {:.0}ms exceeds {:.0}ms",
                        state.totals.avg_latency_ms, t.max_avg_latency_ms
                    ),
                ));
            }
            let success_rate =
                state.totals.successful_requests as f64 / state.totals.total_requests as f64;
            if success_rate < t.min_success_rate {
                raised.push((
                    AlertKind::Error,
                    AlertSeverity::Critical,
                    "Success rate below threshold".to_string(),
                    format!(
                        "success rate {:.1}% below the {:.1}% floor",
                        success_rate * 100.0,
                        t.min_success_rate * 100.0
                    ),
                ));
            }
            let error_rate =
                state.totals.failed_requests as f64 / state.totals.total_requests as f64;
            if error_rate > t.max_error_rate {
                raised.push((
                    AlertKind::Error,
                    AlertSeverity::Warning,
                    "Error rate above threshold".to_string(),
                    format!(
                        "error rate {:.1}% above the {:.1}% ceiling",
                        error_rate * 100.0,
                        t.max_error_rate * 100.0
                    ),
                ));
            }
        }

        let dedup_window = Duration::minutes(DEDUP_WINDOW_MINUTES);
        for (kind, severity, title, message) in raised {
            let duplicate = state.alerts.iter().any(|a| {
                !a.acknowledged && a.kind == kind && a.title == title
                    && now - a.created_at < dedup_window
            });
            if duplicate {
                continue;
            }
            warn!(?kind, ?severity, %title, %message, "alert raised");
            state.alerts.push(Alert {
                id: Uuid::new_v4(),
                kind,
                severity,
                title,
                message,
                created_at: now,
                acknowledged: false,
            });
        }
    }

    fn maybe_prune(&self, state: &mut MonitorState, now: DateTime<Utc>) {
        if now - state.last_prune < Duration::minutes(PRUNE_INTERVAL_MINUTES) {
            return;
        }
        let history_cutoff = now - Duration::days(HISTORY_RETENTION_DAYS);
        let before = state.history.len();
        state.history.retain(|r| r.timestamp >= history_cutoff);
        let alert_cutoff = now - Duration::hours(ACKNOWLEDGED_RETENTION_HOURS);
        state
            .alerts
            .retain(|a| !(a.acknowledged && a.created_at < alert_cutoff));
        state.daily.retain(|day, _| *day >= history_cutoff.date_naive());
        state.last_prune = now;
        debug!(dropped = before - state.history.len(), "history pruned");
    }
}
