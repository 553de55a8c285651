//! Provider registry: priority-ordered selection and live health state
//!
//! Per-provider state machine: `Healthy ⇄ Degraded → Down`. Ordinary traffic
//! demotes (`mark_failed`) and promotes `Degraded → Healthy`
//! (`mark_succeeded`); `Down → Healthy` is only reachable through a
//! successful health probe. Providers are never removed at runtime.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Live status of one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Healthy,
    Degraded,
    Down,
}

#[derive(Debug)]
struct ProviderEntry {
    config: ProviderConfig,
    status: ProviderStatus,
    consecutive_failures: u32,
    last_probe: Option<DateTime<Utc>>,
}

/// Point-in-time view of one provider's registry state
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatusView {
    pub id: String,
    pub status: ProviderStatus,
    pub consecutive_failures: u32,
    pub last_probe: Option<DateTime<Utc>>,
}

/// Holds the configured providers and their health state
pub struct ProviderRegistry {
    entries: RwLock<Vec<ProviderEntry>>,
    failure_threshold: u32,
    probe_client: reqwest::Client,
}

impl ProviderRegistry {
    /// Build a registry from configuration; providers start `Healthy`
    pub fn new(mut providers: Vec<ProviderConfig>, failure_threshold: u32) -> Self {
        providers.sort_by_key(|p| p.priority);
        let entries = providers
            .into_iter()
            .map(|config| ProviderEntry {
                config,
                status: ProviderStatus::Healthy,
                consecutive_failures: 0,
                last_probe: None,
            })
            .collect();
        Self {
            entries: RwLock::new(entries),
            failure_threshold: failure_threshold.max(1),
            probe_client: reqwest::Client::new(),
        }
    }

    /// Highest-priority provider not currently down
    pub fn select_primary(&self) -> Option<ProviderConfig> {
        self.entries
            .read()
            .iter()
            .find(|e| e.status != ProviderStatus::Down)
            .map(|e| e.config.clone())
    }

    /// Highest-priority usable provider outside `exclude`
    pub fn select_fallback(&self, exclude: &[&str]) -> Option<ProviderConfig> {
        self.entries
            .read()
            .iter()
            .find(|e| {
                e.status != ProviderStatus::Down && !exclude.contains(&e.config.id.as_str())
            })
            .map(|e| e.config.clone())
    }

    /// Demote a provider after a failed attempt
    pub fn mark_failed(&self, id: &str) {
        let mut entries = self.entries.write();
        let Some(entry) = entries.iter_mut().find(|e| e.config.id == id) else {
            return;
        };
        entry.consecutive_failures += 1;
        let next = match entry.status {
            ProviderStatus::Healthy => ProviderStatus::Degraded,
            ProviderStatus::Degraded if entry.consecutive_failures >= self.failure_threshold => {
                ProviderStatus::Down
            }
            current => current,
        };
        if next != entry.status {
            warn!(
                provider = id,
                from = ?entry.status,
                to = ?next,
                consecutive_failures = entry.consecutive_failures,
                "provider demoted"
            );
            entry.status = next;
        }
    }

    /// Reset failure accounting after a successful attempt
    ///
    /// Promotes `Degraded → Healthy`. A `Down` provider stays down until a
    /// probe succeeds, even while other providers serve traffic.
    pub fn mark_succeeded(&self, id: &str) {
        let mut entries = self.entries.write();
        let Some(entry) = entries.iter_mut().find(|e| e.config.id == id) else {
            return;
        };
        entry.consecutive_failures = 0;
        if entry.status == ProviderStatus::Degraded {
            info!(provider = id, "provider recovered");
            entry.status = ProviderStatus::Healthy;
        }
    }

    /// Probe every provider and promote the reachable ones to `Healthy`
    ///
    /// Any response below 500 counts as reachable; an auth rejection still
    /// proves the endpoint is alive.
    pub async fn perform_health_check(&self) {
        let targets: Vec<(String, String)> = self
            .entries
            .read()
            .iter()
            .map(|e| (e.config.id.clone(), e.config.endpoint.clone()))
            .collect();

        for (id, endpoint) in targets {
            let reachable = match self
                .probe_client
                .get(&endpoint)
                .timeout(PROBE_TIMEOUT)
                .send()
                .await
            {
                Ok(response) => response.status().as_u16() < 500,
                Err(error) => {
                    debug!(provider = %id, %error, "health probe failed");
                    false
                }
            };
            self.apply_probe(&id, reachable);
        }
    }

    fn apply_probe(&self, id: &str, reachable: bool) {
        let mut entries = self.entries.write();
        let Some(entry) = entries.iter_mut().find(|e| e.config.id == id) else {
            return;
        };
        entry.last_probe = Some(Utc::now());
        if reachable {
            if entry.status != ProviderStatus::Healthy {
                info!(provider = id, "health probe succeeded; provider restored");
            }
            entry.status = ProviderStatus::Healthy;
            entry.consecutive_failures = 0;
        } else {
            entry.consecutive_failures += 1;
            entry.status = match entry.status {
                ProviderStatus::Healthy => ProviderStatus::Degraded,
                ProviderStatus::Degraded
                    if entry.consecutive_failures >= self.failure_threshold =>
                {
                    ProviderStatus::Down
                }
                current => current,
            };
        }
    }

    /// Snapshot of all provider states, in priority order
    pub fn statuses(&self) -> Vec<ProviderStatusView> {
        self.entries
            .read()
            .iter()
            .map(|e| ProviderStatusView {
                id: e.config.id.clone(),
                status: e.status,
                consecutive_failures: e.consecutive_failures,
                last_probe: e.last_probe,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Run `perform_health_check` on an interval until the registry is dropped
    pub fn spawn_health_loop(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let registry = Arc::downgrade(&self);
        drop(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.perform_health_check().await;
            }
        })
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.statuses())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str, priority: u8) -> ProviderConfig {
        ProviderConfig {
            id: id.to_string(),
            name: id.to_string(),
            endpoint: format!("http://{id}.invalid/v1/chat/completions"),
            api_key: "key".to_string(),
            model: "gpt-4".to_string(),
            priority,
            timeout_secs: 30,
            temperature: 0.7,
        }
    }

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(vec![provider("primary", 0), provider("secondary", 1)], 3)
    }

    #[test]
    fn test_selection_is_priority_ordered() {
        // Deliberately constructed out of order
        let registry =
            ProviderRegistry::new(vec![provider("secondary", 1), provider("primary", 0)], 3);
        assert_eq!(registry.select_primary().unwrap().id, "primary");
        assert_eq!(
            registry.select_fallback(&["primary"]).unwrap().id,
            "secondary"
        );
    }

    #[test]
    fn test_fallback_excludes_requested_ids() {
        let registry = registry();
        assert!(
            registry
                .select_fallback(&["primary", "secondary"])
                .is_none()
        );
    }

    #[test]
    fn test_first_failure_degrades() {
        let registry = registry();
        registry.mark_failed("primary");
        let statuses = registry.statuses();
        assert_eq!(statuses[0].status, ProviderStatus::Degraded);
        // Degraded providers still take traffic
        assert_eq!(registry.select_primary().unwrap().id, "primary");
    }

    #[test]
    fn test_repeated_failures_take_provider_down() {
        let registry = registry();
        for _ in 0..3 {
            registry.mark_failed("primary");
        }
        assert_eq!(registry.statuses()[0].status, ProviderStatus::Down);
        // Selection skips the down provider
        assert_eq!(registry.select_primary().unwrap().id, "secondary");
    }

    #[test]
    fn test_success_promotes_degraded_but_not_down() {
        let registry = registry();
        registry.mark_failed("primary");
        registry.mark_succeeded("primary");
        assert_eq!(registry.statuses()[0].status, ProviderStatus::Healthy);

        for _ in 0..3 {
            registry.mark_failed("primary");
        }
        registry.mark_succeeded("primary");
        // Ordinary traffic cannot resurrect a down provider
        assert_eq!(registry.statuses()[0].status, ProviderStatus::Down);
    }

    #[test]
    fn test_probe_restores_down_provider() {
        let registry = registry();
        for _ in 0..3 {
            registry.mark_failed("primary");
        }
        registry.apply_probe("primary", true);
        assert_eq!(registry.statuses()[0].status, ProviderStatus::Healthy);
        assert_eq!(registry.statuses()[0].consecutive_failures, 0);
        assert!(registry.statuses()[0].last_probe.is_some());
    }

    #[test]
    fn test_failed_probe_demotes() {
        let registry = registry();
        registry.apply_probe("primary", false);
        assert_eq!(registry.statuses()[0].status, ProviderStatus::Degraded);
    }

    #[test]
    fn test_empty_registry_selects_nothing() {
        let registry = ProviderRegistry::new(vec![], 3);
        assert!(registry.is_empty());
        assert!(registry.select_primary().is_none());
        assert!(registry.select_fallback(&[]).is_none());
    }

    #[test]
    fn test_unknown_id_is_ignored() {
        let registry = registry();
        registry.mark_failed("ghost");
        registry.mark_succeeded("ghost");
        assert_eq!(registry.statuses().len(), 2);
    }
}
