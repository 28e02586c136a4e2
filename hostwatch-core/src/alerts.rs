use crate::metrics::Sample;
use crate::store::BoundedBuffer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Cpu,
    Disk,
    Network,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertEvent {
    #[serde(rename = "type")]
    pub severity: Severity,
    pub category: AlertCategory,
    pub message: String,
    pub timestamp: i64,
}

impl AlertEvent {
    pub fn new(severity: Severity, category: AlertCategory, message: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Persisted alert history (device discovery and similar events).
/// Bounded; the oldest event is dropped first.
pub struct AlertLog {
    events: BoundedBuffer<AlertEvent>,
}

impl AlertLog {
    pub const DEFAULT_CAPACITY: usize = 20;

    pub fn new(capacity: usize) -> Self {
        Self {
            events: BoundedBuffer::new(capacity),
        }
    }

    pub fn append(&self, event: AlertEvent) {
        self.events.push(event);
    }

    /// Newest `n` events, newest first.
    pub fn recent(&self, n: usize) -> Vec<AlertEvent> {
        self.events.recent(n)
    }

    /// All retained events, oldest first.
    pub fn read_all(&self) -> Vec<AlertEvent> {
        self.events.snapshot()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for AlertLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub cpu_warning_percent: f64,
    pub disk_critical_percent: f64,
    pub recent_limit: usize,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            cpu_warning_percent: 80.0,
            disk_critical_percent: 90.0,
            recent_limit: 10,
        }
    }
}

/// Builds the alert list served to the dashboard: live threshold breaches on
/// the latest sample followed by recent logged events.
pub struct AlertEvaluator {
    thresholds: AlertThresholds,
    log: Arc<AlertLog>,
}

impl AlertEvaluator {
    pub fn new(thresholds: AlertThresholds, log: Arc<AlertLog>) -> Self {
        Self { thresholds, log }
    }

    pub fn evaluate(&self, latest: Option<&Sample>) -> Vec<AlertEvent> {
        let Some(sample) = latest else {
            return Vec::new();
        };

        let mut alerts = self.live_alerts(sample);
        alerts.extend(self.log.recent(self.thresholds.recent_limit));
        alerts
    }

    fn live_alerts(&self, sample: &Sample) -> Vec<AlertEvent> {
        let mut alerts = Vec::new();

        if sample.cpu_usage_percent > self.thresholds.cpu_warning_percent {
            alerts.push(AlertEvent::new(
                Severity::Warning,
                AlertCategory::Cpu,
                format!("High CPU usage: {:.1}%", sample.cpu_usage_percent),
            ));
        }

        if sample.disk_used_percent > self.thresholds.disk_critical_percent {
            alerts.push(AlertEvent::new(
                Severity::Critical,
                AlertCategory::Disk,
                format!("Disk almost full: {:.1}% used", sample.disk_used_percent),
            ));
        }

        alerts
    }
}
