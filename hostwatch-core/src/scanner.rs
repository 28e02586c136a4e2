use crate::alerts::{AlertCategory, AlertEvent, AlertLog, Severity};
use crate::discovery::{DiscoveryProbe, NetworkDevice, UNKNOWN_HOSTNAME};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Result of the most recent completed scan.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkScanCache {
    pub devices: Vec<NetworkDevice>,
    pub captured_at: i64,
    #[serde(skip)]
    captured: Instant,
}

/// Discovers devices on the local subnet, caches the result and raises an
/// alert for every MAC address it has not seen before.
pub struct NetworkScanner {
    discovery: Arc<dyn DiscoveryProbe>,
    alerts: Arc<AlertLog>,
    ttl: Duration,
    cache: Mutex<Option<NetworkScanCache>>,
    known_macs: Mutex<HashSet<String>>,
    scan_lock: tokio::sync::Mutex<()>,
}

impl NetworkScanner {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

    pub fn new(discovery: Arc<dyn DiscoveryProbe>, alerts: Arc<AlertLog>, ttl: Duration) -> Self {
        Self {
            discovery,
            alerts,
            ttl,
            cache: Mutex::new(None),
            known_macs: Mutex::new(HashSet::new()),
            scan_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn local_ip(&self) -> Option<IpAddr> {
        self.discovery.local_ip()
    }

    /// Latest cached scan, never probes.
    pub fn latest(&self) -> Option<NetworkScanCache> {
        self.cache.lock().clone()
    }

    fn fresh_cached(&self) -> Option<Vec<NetworkDevice>> {
        self.cache
            .lock()
            .as_ref()
            .filter(|cache| cache.captured.elapsed() < self.ttl)
            .map(|cache| cache.devices.clone())
    }

    /// Current devices on the network. Reuses the cached scan while it is
    /// younger than the TTL; concurrent callers share one probe.
    ///
    /// Never returns an empty list: when discovery is unavailable or fails
    /// the local host alone is reported.
    pub async fn scan(&self) -> Vec<NetworkDevice> {
        if let Some(devices) = self.fresh_cached() {
            return devices;
        }

        let _guard = self.scan_lock.lock().await;
        if let Some(devices) = self.fresh_cached() {
            return devices;
        }

        let devices = self.discover().await;
        *self.cache.lock() = Some(NetworkScanCache {
            devices: devices.clone(),
            captured_at: chrono::Utc::now().timestamp(),
            captured: Instant::now(),
        });
        devices
    }

    async fn discover(&self) -> Vec<NetworkDevice> {
        let hostname = self.discovery.local_hostname();
        let Some(local_ip) = self.discovery.local_ip() else {
            warn!("local IP unavailable, reporting only this host");
            return vec![NetworkDevice::local(None, &hostname)];
        };

        let mut devices = match self.discovery.discover(local_ip).await {
            Ok(devices) => devices,
            Err(e) => {
                warn!("network discovery failed: {}", e);
                Vec::new()
            }
        };

        let local_ip_str = local_ip.to_string();
        let mut found_local = false;
        for device in devices.iter_mut().filter(|d| d.ip == local_ip_str) {
            let local = NetworkDevice::local(Some(local_ip), &hostname);
            device.is_local = true;
            device.mac = local.mac;
            if device.hostname == UNKNOWN_HOSTNAME {
                device.hostname = local.hostname;
            }
            found_local = true;
        }
        if !found_local {
            devices.push(NetworkDevice::local(Some(local_ip), &hostname));
        }

        debug!("discovered {} devices", devices.len());
        devices
    }

    /// Compares a scan with the known MAC set and logs an alert per new
    /// device. The first scan only seeds the set. Returns the number of
    /// alerts raised.
    pub fn detect_new_devices(&self, devices: &[NetworkDevice]) -> usize {
        let current: HashSet<&str> = devices.iter().filter_map(|d| d.hardware_mac()).collect();

        let mut known = self.known_macs.lock();
        if known.is_empty() {
            known.extend(current.iter().map(|mac| mac.to_string()));
            info!("seeded known device set with {} devices", known.len());
            return 0;
        }

        let mut raised = 0;
        for device in devices {
            let Some(mac) = device.hardware_mac() else {
                continue;
            };
            if known.contains(mac) {
                continue;
            }
            let message = format!(
                "New Device: {} ({})",
                device.display_name(),
                device.vendor.as_deref().unwrap_or("Unknown")
            );
            info!("{} [{}]", message, mac);
            self.alerts
                .append(AlertEvent::new(Severity::Info, AlertCategory::Network, message));
            known.insert(mac.to_string());
            raised += 1;
        }
        raised
    }

    pub fn known_macs(&self) -> HashSet<String> {
        self.known_macs.lock().clone()
    }

    /// Scans forever: waits `warmup`, then scans and diffs every `period`.
    pub async fn run(self: Arc<Self>, period: Duration, warmup: Duration) {
        sleep(warmup).await;
        info!("network scanner started, interval {:?}", period);

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let devices = self.scan().await;
            self.detect_new_devices(&devices);
        }
    }
}
