pub mod alerts;
pub mod collector;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod probe;
pub mod process;
pub mod scanner;
pub mod store;

#[cfg(test)]
mod tests;

pub use alerts::{AlertCategory, AlertEvaluator, AlertEvent, AlertLog, AlertThresholds, Severity};
pub use collector::{CpuUsageTracker, SampleCollector, TickOutcome};
pub use config::HostwatchConfig;
pub use discovery::{DiscoveryProbe, NetworkDevice, NmapDiscovery};
pub use error::{MonitorError, Result};
pub use metrics::*;
pub use monitor::SystemMonitor;
pub use probe::MetricsProbe;
pub use process::{ProcessInfo, ProcessLister, SortKey};
pub use scanner::{NetworkScanCache, NetworkScanner};
pub use store::TimeSeriesStore;
