use crate::collector::{SampleCollector, TickOutcome};
use crate::error::{MonitorError, Result};
use crate::metrics::{CpuTicks, HostInfo, InterfaceCounters, RawSnapshot, Volume};
use crate::monitor::SystemMonitor;
use crate::probe::MetricsProbe;
use crate::store::TimeSeriesStore;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Probe replaying a script of readings; `None` entries fail.
struct ScriptedProbe {
    readings: Mutex<VecDeque<Option<RawSnapshot>>>,
}

impl ScriptedProbe {
    fn new(readings: Vec<Option<RawSnapshot>>) -> Self {
        Self {
            readings: Mutex::new(readings.into()),
        }
    }
}

impl MetricsProbe for ScriptedProbe {
    fn snapshot(&self) -> Result<RawSnapshot> {
        match self.readings.lock().pop_front() {
            Some(Some(raw)) => Ok(raw),
            _ => Err(MonitorError::probe("cpu ticks", "scripted failure")),
        }
    }

    fn volumes(&self) -> Result<Vec<Volume>> {
        Ok(Vec::new())
    }

    fn interfaces(&self) -> Result<Vec<InterfaceCounters>> {
        Ok(Vec::new())
    }
}

fn reading(total: u64, idle: u64) -> Option<RawSnapshot> {
    Some(RawSnapshot {
        host: HostInfo {
            hostname: "box".to_string(),
            platform: "linux-x86_64".to_string(),
            os_name: "Linux".to_string(),
            uptime_seconds: 60,
        },
        cpu: CpuTicks { total, idle },
        cpu_core_count: 4,
        memory_total_bytes: 8_000,
        memory_used_bytes: 2_000,
        disk_total_bytes: 1_000,
        disk_used_bytes: 950,
        ..RawSnapshot::default()
    })
}

fn collector(readings: Vec<Option<RawSnapshot>>, capacity: usize) -> (SampleCollector, Arc<TimeSeriesStore>) {
    let store = Arc::new(TimeSeriesStore::new(capacity));
    let probe = Arc::new(ScriptedProbe::new(readings));
    (SampleCollector::new(probe, Arc::clone(&store)), store)
}

#[test]
fn tick_appends_sample_with_cpu_delta() {
    let (collector, store) = collector(vec![reading(100, 80), reading(150, 100)], 10);
    collector.prime().unwrap();

    assert_eq!(collector.tick().unwrap(), TickOutcome::Appended);

    let samples = store.read_all();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].cpu_usage_percent, 60.0);
    assert_eq!(samples[0].memory_used_percent, 25.0);
    assert_eq!(samples[0].disk_used_percent, 95.0);
    assert_eq!(samples[0].cpu_core_count, 4);
    assert_eq!(samples[0].hostname, "box");
}

#[test]
fn failed_tick_appends_nothing_and_keeps_baseline() {
    let (collector, store) = collector(vec![reading(100, 80), None, reading(150, 100)], 10);
    collector.prime().unwrap();

    assert!(collector.tick().is_err());
    assert!(store.is_empty());

    // delta is still measured against the primed baseline
    collector.tick().unwrap();
    assert_eq!(store.latest().unwrap().cpu_usage_percent, 60.0);
}

#[test]
fn collector_respects_store_capacity() {
    let readings = (0..10).map(|i| reading(100 * (i + 1), 50 * (i + 1))).collect();
    let (collector, store) = collector(readings, 3);
    for _ in 0..10 {
        collector.tick().unwrap();
    }
    assert_eq!(store.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn collector_loop_keeps_running_after_failed_tick() {
    // baseline, then ticks at 3s, 6s and 9s; the 6s reading fails
    let (collector, store) = collector(
        vec![reading(100, 80), reading(150, 100), None, reading(250, 200)],
        10,
    );
    let task = tokio::spawn(Arc::new(collector).run(Duration::from_secs(3)));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(store.is_empty());

    tokio::time::sleep(Duration::from_secs(8)).await;
    task.abort();

    let usage: Vec<f64> = store.read_all().iter().map(|s| s.cpu_usage_percent).collect();
    assert_eq!(usage, vec![60.0, 0.0]);
}

#[test]
fn system_monitor_reads_live_host() {
    let monitor = SystemMonitor::new();
    let raw = monitor.snapshot().unwrap();

    assert!(raw.cpu_core_count > 0);
    assert!(raw.cpu.total >= raw.cpu.idle);
    assert!(raw.memory_total_bytes > 0);
    assert!(raw.memory_used_bytes <= raw.memory_total_bytes);
    assert!(raw.disk_used_bytes <= raw.disk_total_bytes);
    assert!(!raw.host.platform.is_empty());

    // two readings advance the tick counters monotonically
    std::thread::sleep(std::time::Duration::from_millis(50));
    let next = monitor.snapshot().unwrap();
    assert!(next.cpu.total >= raw.cpu.total);
}
