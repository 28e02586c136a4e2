use crate::error::{MonitorError, Result};
use crate::metrics::{is_loopback, CpuTicks, HostInfo, InterfaceCounters, RawSnapshot, Volume};
use crate::probe::MetricsProbe;
use parking_lot::Mutex;
use procfs::prelude::*;
use procfs::KernelStats;
use std::fs;
use sysinfo::{Disks, Networks, System};

/// Linux probe backed by `/proc`, sysfs and sysinfo.
pub struct SystemMonitor {
    system: Mutex<System>,
    networks: Mutex<Networks>,
    disks: Mutex<Disks>,
    root_mount: String,
}

impl SystemMonitor {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            networks: Mutex::new(Networks::new_with_refreshed_list()),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
            root_mount: "/".to_string(),
        }
    }

    fn host_info(&self) -> HostInfo {
        HostInfo {
            hostname: System::host_name().unwrap_or_else(|| "unknown".into()),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            os_name: System::long_os_version()
                .or_else(System::name)
                .unwrap_or_else(|| std::env::consts::OS.to_string()),
            uptime_seconds: System::uptime(),
        }
    }

    fn cpu_ticks(&self) -> Result<(CpuTicks, usize)> {
        let stats = KernelStats::current().map_err(|e| MonitorError::probe("cpu ticks", e))?;

        if stats.cpu_time.is_empty() {
            return Err(MonitorError::probe("cpu ticks", "no per-core entries in /proc/stat"));
        }

        let mut ticks = CpuTicks::default();
        for cpu in &stats.cpu_time {
            let iowait = cpu.iowait.unwrap_or(0);
            ticks.total += cpu.user
                + cpu.nice
                + cpu.system
                + cpu.idle
                + iowait
                + cpu.irq.unwrap_or(0)
                + cpu.softirq.unwrap_or(0)
                + cpu.steal.unwrap_or(0);
            ticks.idle += cpu.idle + iowait;
        }

        Ok((ticks, stats.cpu_time.len()))
    }

    fn memory(&self) -> Result<(u64, u64)> {
        let mut system = self.system.lock();
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return Err(MonitorError::probe("memory", "total memory reported as zero"));
        }
        Ok((total, system.used_memory()))
    }

    fn root_disk(&self) -> Result<(u64, u64)> {
        let stat = nix::sys::statvfs::statvfs(self.root_mount.as_str())
            .map_err(|e| MonitorError::probe("root filesystem", e))?;

        let block_size = stat.fragment_size() as u64;
        let total = stat.blocks() as u64 * block_size;
        let free = stat.blocks_free() as u64 * block_size;
        Ok((total, total.saturating_sub(free)))
    }

    fn network_totals(&self) -> (u64, u64) {
        let mut networks = self.networks.lock();
        networks.refresh();

        let mut sent = 0u64;
        let mut recv = 0u64;
        for (name, data) in networks.iter() {
            if is_loopback(name) {
                continue;
            }
            sent = sent.saturating_add(data.total_transmitted());
            recv = recv.saturating_add(data.total_received());
        }
        (sent, recv)
    }

    fn read_cpu_temperature(&self) -> Option<f64> {
        // Try to read from common thermal zones
        for i in 0..10 {
            let temp_path = format!("/sys/class/thermal/thermal_zone{}/temp", i);
            if let Some(temp) = read_millidegrees(&temp_path) {
                return Some(temp);
            }
        }

        if let Ok(entries) = fs::read_dir("/sys/class/hwmon") {
            for entry in entries.flatten() {
                let temp_path = entry.path().join("temp1_input");
                if let Some(temp) = read_millidegrees(&temp_path.to_string_lossy()) {
                    return Some(temp);
                }
            }
        }

        None
    }
}

fn read_millidegrees(path: &str) -> Option<f64> {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .map(|t| t / 1000.0)
}

impl MetricsProbe for SystemMonitor {
    fn snapshot(&self) -> Result<RawSnapshot> {
        let (cpu, cpu_core_count) = self.cpu_ticks()?;
        let (memory_total_bytes, memory_used_bytes) = self.memory()?;
        let (disk_total_bytes, disk_used_bytes) = self.root_disk()?;
        let (network_sent_bytes, network_recv_bytes) = self.network_totals();

        Ok(RawSnapshot {
            host: self.host_info(),
            cpu,
            cpu_core_count,
            cpu_temperature_celsius: self.read_cpu_temperature(),
            memory_total_bytes,
            memory_used_bytes,
            disk_total_bytes,
            disk_used_bytes,
            network_sent_bytes,
            network_recv_bytes,
        })
    }

    fn volumes(&self) -> Result<Vec<Volume>> {
        let mut disks = self.disks.lock();
        disks.refresh_list();

        Ok(disks
            .iter()
            .map(|disk| {
                let total = disk.total_space();
                Volume {
                    device: disk.name().to_string_lossy().to_string(),
                    mountpoint: disk.mount_point().to_string_lossy().to_string(),
                    total_bytes: total,
                    used_bytes: total.saturating_sub(disk.available_space()),
                    fs_type: disk.file_system().to_string_lossy().to_string(),
                }
            })
            .collect())
    }

    fn interfaces(&self) -> Result<Vec<InterfaceCounters>> {
        let mut networks = self.networks.lock();
        networks.refresh();

        let mut result: Vec<InterfaceCounters> = networks
            .iter()
            .map(|(interface_name, data)| InterfaceCounters {
                interface: interface_name.to_string(),
                bytes_sent: data.total_transmitted(),
                bytes_recv: data.total_received(),
                packets_sent: data.total_packets_transmitted(),
                packets_recv: data.total_packets_received(),
            })
            .collect();
        result.sort_by(|a, b| a.interface.cmp(&b.interface));

        Ok(result)
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}
