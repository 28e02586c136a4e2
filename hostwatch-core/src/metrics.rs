use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One timestamped system-metrics record, as served by `/api/system`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub hostname: String,
    pub platform: String,
    pub os_name: String,
    pub cpu_core_count: usize,
    pub cpu_usage_percent: f64,
    pub cpu_temperature_celsius: Option<f64>,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub memory_used_percent: f64,
    pub disk_total_bytes: u64,
    pub disk_used_bytes: u64,
    pub disk_used_percent: f64,
    pub network_sent_bytes_cumulative: u64,
    pub network_recv_bytes_cumulative: u64,
    pub uptime_seconds: u64,
}

/// Aggregate CPU tick counters summed over all cores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub total: u64,
    pub idle: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostInfo {
    pub hostname: String,
    pub platform: String,
    pub os_name: String,
    pub uptime_seconds: u64,
}

/// Raw counters returned by one probe call. Nothing here is derived from a
/// previous reading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSnapshot {
    pub host: HostInfo,
    pub cpu: CpuTicks,
    pub cpu_core_count: usize,
    pub cpu_temperature_celsius: Option<f64>,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub disk_total_bytes: u64,
    pub disk_used_bytes: u64,
    pub network_sent_bytes: u64,
    pub network_recv_bytes: u64,
}

/// A mounted filesystem as reported by the probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub device: String,
    pub mountpoint: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    #[serde(rename = "type")]
    pub fs_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    pub interface: String,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRate {
    pub timestamp: i64,
    pub sent_bytes_per_sec: f64,
    pub recv_bytes_per_sec: f64,
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round1(part as f64 / whole as f64 * 100.0)
}

impl Sample {
    pub fn from_snapshot(raw: &RawSnapshot, cpu_usage_percent: f64, timestamp: i64) -> Self {
        Self {
            timestamp,
            hostname: raw.host.hostname.clone(),
            platform: raw.host.platform.clone(),
            os_name: raw.host.os_name.clone(),
            cpu_core_count: raw.cpu_core_count,
            cpu_usage_percent: round1(cpu_usage_percent.clamp(0.0, 100.0)),
            cpu_temperature_celsius: raw.cpu_temperature_celsius.map(round1),
            memory_total_bytes: raw.memory_total_bytes,
            memory_used_bytes: raw.memory_used_bytes,
            memory_used_percent: percent(raw.memory_used_bytes, raw.memory_total_bytes),
            disk_total_bytes: raw.disk_total_bytes,
            disk_used_bytes: raw.disk_used_bytes,
            disk_used_percent: percent(raw.disk_used_bytes, raw.disk_total_bytes),
            network_sent_bytes_cumulative: raw.network_sent_bytes,
            network_recv_bytes_cumulative: raw.network_recv_bytes,
            uptime_seconds: raw.host.uptime_seconds,
        }
    }
}

/// Per-second network throughput between adjacent samples.
///
/// Counters that went backwards (reboot, wrap) yield zero instead of a
/// negative rate. Pairs without a positive time delta are skipped.
pub fn network_rates(samples: &[Sample]) -> Vec<NetworkRate> {
    samples
        .windows(2)
        .filter_map(|pair| {
            let (prev, curr) = (&pair[0], &pair[1]);
            let elapsed = curr.timestamp - prev.timestamp;
            if elapsed <= 0 {
                return None;
            }
            let elapsed = elapsed as f64;
            let sent = curr
                .network_sent_bytes_cumulative
                .saturating_sub(prev.network_sent_bytes_cumulative);
            let recv = curr
                .network_recv_bytes_cumulative
                .saturating_sub(prev.network_recv_bytes_cumulative);
            Some(NetworkRate {
                timestamp: curr.timestamp,
                sent_bytes_per_sec: round1(sent as f64 / elapsed),
                recv_bytes_per_sec: round1(recv as f64 / elapsed),
            })
        })
        .collect()
}

/// Volumes worth showing on the dashboard: real filesystems, one entry per
/// mount point, at least `min_bytes` large.
pub fn filter_volumes(volumes: Vec<Volume>, min_bytes: u64, ignored_fs_types: &[String]) -> Vec<Volume> {
    let mut seen = HashSet::new();
    volumes
        .into_iter()
        .filter(|v| !ignored_fs_types.iter().any(|t| t == &v.fs_type))
        .filter(|v| v.total_bytes >= min_bytes)
        .filter(|v| seen.insert(v.mountpoint.clone()))
        .collect()
}

/// `lo`, `lo0`, `lo1`... but not `lowpan0`.
pub fn is_loopback(interface: &str) -> bool {
    interface
        .strip_prefix("lo")
        .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
}

/// Interfaces excluding loopback and ones that never carried traffic.
pub fn filter_interfaces(interfaces: Vec<InterfaceCounters>) -> Vec<InterfaceCounters> {
    interfaces
        .into_iter()
        .filter(|i| !is_loopback(&i.interface))
        .filter(|i| i.bytes_sent > 0 || i.bytes_recv > 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(timestamp: i64, sent: u64, recv: u64) -> Sample {
        let raw = RawSnapshot {
            network_sent_bytes: sent,
            network_recv_bytes: recv,
            ..RawSnapshot::default()
        };
        Sample::from_snapshot(&raw, 0.0, timestamp)
    }

    fn volume(mountpoint: &str, fs_type: &str, total_bytes: u64) -> Volume {
        Volume {
            device: "/dev/sda1".to_string(),
            mountpoint: mountpoint.to_string(),
            total_bytes,
            used_bytes: total_bytes / 2,
            fs_type: fs_type.to_string(),
        }
    }

    #[test]
    fn sample_rounds_percentages_to_one_decimal() {
        let raw = RawSnapshot {
            memory_total_bytes: 3,
            memory_used_bytes: 1,
            disk_total_bytes: 0,
            disk_used_bytes: 0,
            ..RawSnapshot::default()
        };
        let sample = Sample::from_snapshot(&raw, 42.06, 10);
        assert_eq!(sample.cpu_usage_percent, 42.1);
        assert_eq!(sample.memory_used_percent, 33.3);
        assert_eq!(sample.disk_used_percent, 0.0);
    }

    #[test]
    fn sample_serializes_with_dashboard_field_names() {
        let sample = sample_at(1_700_000_000, 5, 7);
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["timestamp"], 1_700_000_000);
        assert_eq!(json["network_sent_bytes_cumulative"], 5);
        assert_eq!(json["network_recv_bytes_cumulative"], 7);
        assert!(json["cpu_temperature_celsius"].is_null());
        assert!(json.get("cpu_usage_percent").is_some());
    }

    #[test]
    fn rates_are_per_second_and_clamped() {
        let samples = vec![
            sample_at(100, 1_000, 2_000),
            sample_at(102, 3_000, 2_500),
            // counter reset after reboot
            sample_at(104, 10, 20),
            // duplicate timestamp is skipped
            sample_at(104, 50, 60),
        ];
        let rates = network_rates(&samples);
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].sent_bytes_per_sec, 1_000.0);
        assert_eq!(rates[0].recv_bytes_per_sec, 250.0);
        assert_eq!(rates[1].sent_bytes_per_sec, 0.0);
        assert_eq!(rates[1].recv_bytes_per_sec, 0.0);
    }

    #[test]
    fn volumes_filtered_by_type_size_and_mountpoint() {
        let ignored = vec!["tmpfs".to_string(), "squashfs".to_string()];
        let volumes = vec![
            volume("/", "ext4", 500 << 20),
            volume("/", "ext4", 500 << 20),
            volume("/run", "tmpfs", 500 << 20),
            volume("/boot/efi", "vfat", 50 << 20),
            volume("/home", "btrfs", 1 << 30),
        ];
        let kept = filter_volumes(volumes, 100 << 20, &ignored);
        let mounts: Vec<_> = kept.iter().map(|v| v.mountpoint.as_str()).collect();
        assert_eq!(mounts, vec!["/", "/home"]);
    }

    #[test]
    fn interfaces_skip_loopback_and_idle() {
        let iface = |name: &str, sent: u64, recv: u64| InterfaceCounters {
            interface: name.to_string(),
            bytes_sent: sent,
            bytes_recv: recv,
            packets_sent: 0,
            packets_recv: 0,
        };
        let kept = filter_interfaces(vec![
            iface("lo", 10, 10),
            iface("eth0", 10, 0),
            iface("docker0", 0, 0),
            iface("wlan0", 0, 3),
        ]);
        let names: Vec<_> = kept.iter().map(|i| i.interface.as_str()).collect();
        assert_eq!(names, vec!["eth0", "wlan0"]);
    }

    #[test]
    fn loopback_matches_lo_with_optional_index() {
        assert!(is_loopback("lo"));
        assert!(is_loopback("lo0"));
        assert!(is_loopback("lo12"));
        assert!(!is_loopback("lowpan0"));
        assert!(!is_loopback("local-br"));
        assert!(!is_loopback("eth0"));

        let kept = filter_interfaces(vec![InterfaceCounters {
            interface: "lowpan0".to_string(),
            bytes_sent: 1,
            bytes_recv: 1,
            packets_sent: 1,
            packets_recv: 1,
        }]);
        assert_eq!(kept.len(), 1);
    }
}
