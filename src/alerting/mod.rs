//! Background metric monitoring: a single poller task samples the host and
//! evaluates the enabled alert rules edge-triggered, so a rule fires once
//! when its condition becomes true and re-arms only after a false sample.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::entities::alert_rule;
use crate::db::services::alert_service;
use crate::metrics::{HostSample, SystemMetricsCollector};
use crate::notifications::NotificationService;

/// Remembers, per rule id, whether the condition held on the previous
/// sample. `observe` returns true only on the false-to-true transition.
#[derive(Debug, Default)]
pub struct RuleTracker {
    active: HashMap<String, bool>,
}

impl RuleTracker {
    pub fn observe(&mut self, rule_id: &str, condition: bool) -> bool {
        let was_active = self
            .active
            .insert(rule_id.to_string(), condition)
            .unwrap_or(false);
        condition && !was_active
    }

    /// Drops state for rules that no longer exist or were disabled, so a
    /// rule toggled off and on starts re-armed.
    pub fn retain_rules(&mut self, ids: &HashSet<String>) {
        self.active.retain(|id, _| ids.contains(id));
    }
}

fn metric_value(metric: &str, sample: &HostSample) -> Option<f64> {
    match metric {
        "cpu" => Some(sample.cpu_percent),
        "ram" => Some(sample.ram_percent),
        "disk" => Some(sample.storage_percent),
        _ => None,
    }
}

fn condition_met(rule: &alert_rule::Model, value: f64) -> bool {
    match rule.comparison.as_str() {
        "gt" => value > rule.threshold,
        "lt" => value < rule.threshold,
        _ => false,
    }
}

/// Evaluates every rule against one sample, returning the rules that fired
/// on this cycle together with the observed metric value.
fn evaluate_rules<'a>(
    rules: &'a [alert_rule::Model],
    sample: &HostSample,
    tracker: &mut RuleTracker,
) -> Vec<(&'a alert_rule::Model, f64)> {
    let ids: HashSet<String> = rules.iter().map(|r| r.id.clone()).collect();
    tracker.retain_rules(&ids);

    let mut fired = Vec::new();
    for rule in rules {
        let Some(value) = metric_value(&rule.metric, sample) else {
            continue;
        };
        if tracker.observe(&rule.id, condition_met(rule, value)) {
            fired.push((rule, value));
        }
    }
    fired
}

/// Owns the poller task. Start is a no-op while a task is running; stop
/// halts future evaluations without retracting emitted notifications.
pub struct MonitorService {
    db: DatabaseConnection,
    metrics: Arc<SystemMetricsCollector>,
    notifications: Arc<NotificationService>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MonitorService {
    pub fn new(
        db: DatabaseConnection,
        metrics: Arc<SystemMetricsCollector>,
        notifications: Arc<NotificationService>,
        interval: Duration,
    ) -> Self {
        Self {
            db,
            metrics,
            notifications,
            interval,
            task: Mutex::new(None),
        }
    }

    /// Returns false when the poller was already running.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock().await;
        if let Some(handle) = task.as_ref() {
            if !handle.is_finished() {
                return false;
            }
        }

        let db = self.db.clone();
        let metrics = self.metrics.clone();
        let notifications = self.notifications.clone();
        let interval = self.interval;
        *task = Some(tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Alert monitoring started.");
            let mut tracker = RuleTracker::default();
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = run_cycle(&db, &metrics, &notifications, &mut tracker).await {
                    warn!(error = %e, "Alert evaluation cycle failed.");
                }
            }
        }));
        true
    }

    /// Returns false when no poller was running.
    pub async fn stop(&self) -> bool {
        let mut task = self.task.lock().await;
        match task.take() {
            Some(handle) => {
                handle.abort();
                info!("Alert monitoring stopped.");
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self) -> bool {
        let task = self.task.lock().await;
        task.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }
}

/// One evaluation cycle: re-read the enabled rules, sample once, fire the
/// edge-triggered rules and record each trigger.
async fn run_cycle(
    db: &DatabaseConnection,
    metrics: &SystemMetricsCollector,
    notifications: &NotificationService,
    tracker: &mut RuleTracker,
) -> Result<(), crate::web::error::AppError> {
    let rules = alert_service::list_enabled_rules(db).await?;
    if rules.is_empty() {
        return Ok(());
    }
    let sample = metrics.sample().await;

    for (rule, value) in evaluate_rules(&rules, &sample, tracker) {
        debug!(rule = %rule.name, metric = %rule.metric, value, "Alert rule fired.");
        notifications
            .notify(
                "warning",
                &format!("Alert: {}", rule.name),
                &format!(
                    "{} is at {value:.1}% ({} {}%)",
                    rule.metric, rule.comparison, rule.threshold
                ),
            )
            .await?;
        alert_service::touch_last_triggered(db, &rule.id).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(id: &str, metric: &str, comparison: &str, threshold: f64) -> alert_rule::Model {
        alert_rule::Model {
            id: id.to_string(),
            name: format!("{metric} {comparison} {threshold}"),
            metric: metric.to_string(),
            comparison: comparison.to_string(),
            threshold,
            enabled: true,
            last_triggered_at: None,
            created_at: Utc::now(),
        }
    }

    fn sample_with_cpu(cpu: f64) -> HostSample {
        HostSample {
            cpu_percent: cpu,
            cpu_count: 4,
            ram_total: 8 * 1024 * 1024 * 1024,
            ram_used: 2 * 1024 * 1024 * 1024,
            ram_percent: 25.0,
            storage_total: 100,
            storage_used: 50,
            storage_percent: 50.0,
        }
    }

    #[test]
    fn sustained_breach_fires_once() {
        let rules = vec![rule("r1", "cpu", "gt", 80.0)];
        let mut tracker = RuleTracker::default();

        let mut fires = 0;
        for cpu in [85.0, 90.0] {
            fires += evaluate_rules(&rules, &sample_with_cpu(cpu), &mut tracker).len();
        }
        assert_eq!(fires, 1);
    }

    #[test]
    fn recovery_rearms_the_rule() {
        let rules = vec![rule("r1", "cpu", "gt", 80.0)];
        let mut tracker = RuleTracker::default();

        let mut fires = 0;
        for cpu in [85.0, 70.0, 85.0] {
            fires += evaluate_rules(&rules, &sample_with_cpu(cpu), &mut tracker).len();
        }
        assert_eq!(fires, 2);
    }

    #[test]
    fn lt_comparison_fires_below_threshold() {
        let rules = vec![rule("r1", "disk", "lt", 60.0)];
        let mut tracker = RuleTracker::default();
        let fired = evaluate_rules(&rules, &sample_with_cpu(0.0), &mut tracker);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1, 50.0);
    }

    #[test]
    fn deleted_rules_drop_their_armed_state() {
        let rules = vec![rule("r1", "cpu", "gt", 80.0)];
        let mut tracker = RuleTracker::default();
        assert_eq!(
            evaluate_rules(&rules, &sample_with_cpu(90.0), &mut tracker).len(),
            1
        );

        // Rule disappears, then comes back while the condition still holds:
        // it must fire again because its state was dropped.
        evaluate_rules(&[], &sample_with_cpu(90.0), &mut tracker);
        assert_eq!(
            evaluate_rules(&rules, &sample_with_cpu(90.0), &mut tracker).len(),
            1
        );
    }

    #[test]
    fn unknown_metric_never_fires() {
        let rules = vec![rule("r1", "gpu", "gt", 1.0)];
        let mut tracker = RuleTracker::default();
        assert!(evaluate_rules(&rules, &sample_with_cpu(99.0), &mut tracker).is_empty());
    }
}
