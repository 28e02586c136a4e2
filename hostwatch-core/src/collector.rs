use crate::error::Result;
use crate::metrics::{CpuTicks, Sample};
use crate::probe::MetricsProbe;
use crate::store::TimeSeriesStore;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Turns cumulative CPU tick counters into a usage percentage.
#[derive(Debug, Default)]
pub struct CpuUsageTracker {
    previous: Option<CpuTicks>,
}

impl CpuUsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(baseline: CpuTicks) -> Self {
        Self {
            previous: Some(baseline),
        }
    }

    /// Usage since the previous reading, in percent.
    ///
    /// Returns 0 when there is no baseline yet or the total did not advance.
    /// The baseline is replaced on every call.
    pub fn update(&mut self, current: CpuTicks) -> f64 {
        let usage = match self.previous {
            Some(previous) => usage_between(previous, current),
            None => 0.0,
        };
        self.previous = Some(current);
        usage
    }

    pub fn baseline(&self) -> Option<CpuTicks> {
        self.previous
    }
}

pub fn usage_between(previous: CpuTicks, current: CpuTicks) -> f64 {
    let total = current.total.saturating_sub(previous.total);
    if total == 0 {
        return 0.0;
    }
    let idle = current.idle.saturating_sub(previous.idle);
    let busy = total.saturating_sub(idle);
    (busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Periodically probes the host and appends a [`Sample`] to the store.
pub struct SampleCollector {
    probe: Arc<dyn MetricsProbe>,
    store: Arc<TimeSeriesStore>,
    cpu: Mutex<CpuUsageTracker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Appended,
    /// Another tick was still running.
    Skipped,
}

impl SampleCollector {
    pub fn new(probe: Arc<dyn MetricsProbe>, store: Arc<TimeSeriesStore>) -> Self {
        Self {
            probe,
            store,
            cpu: Mutex::new(CpuUsageTracker::new()),
        }
    }

    /// Records a CPU baseline so the first tick reports a real delta.
    pub fn prime(&self) -> Result<()> {
        let raw = self.probe.snapshot()?;
        self.cpu.lock().update(raw.cpu);
        Ok(())
    }

    /// One collection cycle. On error nothing is appended and the CPU
    /// baseline is left untouched.
    pub fn tick(&self) -> Result<TickOutcome> {
        let Some(mut cpu) = self.cpu.try_lock() else {
            debug!("previous collection tick still running, skipping");
            return Ok(TickOutcome::Skipped);
        };

        let raw = self.probe.snapshot()?;
        let usage = cpu.update(raw.cpu);
        drop(cpu);

        let sample = Sample::from_snapshot(&raw, usage, chrono::Utc::now().timestamp());
        self.store.append(sample);
        Ok(TickOutcome::Appended)
    }

    /// Collects forever on a fixed cadence. Failed ticks are logged and
    /// skipped.
    pub async fn run(self: Arc<Self>, period: Duration) {
        let collector = Arc::clone(&self);
        match tokio::task::spawn_blocking(move || collector.prime()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("could not record initial CPU baseline: {}", e),
            Err(e) => error!("CPU baseline task panicked: {}", e),
        }

        info!("sample collector started, interval {:?}", period);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let collector = Arc::clone(&self);
            match tokio::task::spawn_blocking(move || collector.tick()).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("collection tick failed: {}", e),
                Err(e) => error!("collection tick panicked: {}", e),
            }
        }
    }
}
