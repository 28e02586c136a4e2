//! Local-subnet host discovery.
//!
//! The scanner only talks to [`DiscoveryProbe`]; [`NmapDiscovery`] is the
//! production implementation and shells out to `nmap -sn`.

use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracing::debug;

/// MAC placeholder for the host running the scan.
pub const LOCAL_DEVICE_MAC: &str = "THIS-DEVICE";
/// MAC placeholder for a device whose hardware address is unknown.
pub const UNKNOWN_MAC: &str = "--";
pub const UNKNOWN_HOSTNAME: &str = "Unknown";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Up,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkDevice {
    pub ip: String,
    pub hostname: String,
    pub mac: Option<String>,
    pub vendor: Option<String>,
    pub is_local: bool,
    pub status: DeviceStatus,
}

impl NetworkDevice {
    pub fn local(ip: Option<IpAddr>, hostname: &str) -> Self {
        Self {
            ip: ip.map(|ip| ip.to_string()).unwrap_or_else(|| "127.0.0.1".to_string()),
            hostname: hostname.to_string(),
            mac: Some(LOCAL_DEVICE_MAC.to_string()),
            vendor: None,
            is_local: true,
            status: DeviceStatus::Up,
        }
    }

    /// A real hardware address, or `None` for sentinels and missing MACs.
    pub fn hardware_mac(&self) -> Option<&str> {
        match self.mac.as_deref() {
            Some(LOCAL_DEVICE_MAC) | Some(UNKNOWN_MAC) | None => None,
            Some(mac) => Some(mac),
        }
    }

    /// Hostname when it resolved, otherwise the IP.
    pub fn display_name(&self) -> &str {
        if self.hostname.is_empty() || self.hostname == UNKNOWN_HOSTNAME {
            &self.ip
        } else {
            &self.hostname
        }
    }
}

#[async_trait]
pub trait DiscoveryProbe: Send + Sync {
    fn local_ip(&self) -> Option<IpAddr>;

    fn local_hostname(&self) -> String;

    /// Devices currently answering on the local subnet of `local_ip`.
    async fn discover(&self, local_ip: IpAddr) -> Result<Vec<NetworkDevice>>;
}

/// Ping-sweeps the local /24 with nmap.
pub struct NmapDiscovery {
    command: String,
    timeout: Duration,
}

impl NmapDiscovery {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

pub fn subnet_of(ip: IpAddr) -> Option<String> {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            Some(format!("{}/24", Ipv4Addr::new(a, b, c, 0)))
        }
        IpAddr::V6(_) => None,
    }
}

#[async_trait]
impl DiscoveryProbe for NmapDiscovery {
    fn local_ip(&self) -> Option<IpAddr> {
        local_ip_address::local_ip().ok()
    }

    fn local_hostname(&self) -> String {
        sysinfo::System::host_name().unwrap_or_else(|| UNKNOWN_HOSTNAME.to_string())
    }

    async fn discover(&self, local_ip: IpAddr) -> Result<Vec<NetworkDevice>> {
        let subnet = subnet_of(local_ip).ok_or_else(|| {
            MonitorError::DiscoveryUnavailable(format!("no IPv4 subnet for {}", local_ip))
        })?;

        debug!("scanning {} with {}", subnet, self.command);
        let run = tokio::process::Command::new(&self.command)
            .args(["-sn", subnet.as_str()])
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(MonitorError::DiscoveryUnavailable(format!(
                    "{} is not installed",
                    self.command
                )));
            }
            Ok(Err(e)) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(MonitorError::DiscoveryUnavailable(format!(
                    "permission denied running {}",
                    self.command
                )));
            }
            Ok(Err(e)) => return Err(MonitorError::Io(e)),
            Err(_) => {
                return Err(MonitorError::Discovery(format!(
                    "{} timed out after {:?}",
                    self.command, self.timeout
                )));
            }
        };

        if !output.status.success() {
            return Err(MonitorError::Discovery(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(parse_nmap_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses the human-readable output of `nmap -sn`.
pub fn parse_nmap_output(output: &str) -> Vec<NetworkDevice> {
    let mut devices: Vec<NetworkDevice> = Vec::new();

    for line in output.lines() {
        let line = line.trim();

        if let Some(target) = line.strip_prefix("Nmap scan report for ") {
            let (hostname, ip) = match target.rsplit_once(" (") {
                Some((name, ip)) if ip.ends_with(')') => {
                    (name.to_string(), ip.trim_end_matches(')').to_string())
                }
                _ => (UNKNOWN_HOSTNAME.to_string(), target.to_string()),
            };
            devices.push(NetworkDevice {
                ip,
                hostname,
                mac: Some(UNKNOWN_MAC.to_string()),
                vendor: None,
                is_local: false,
                status: DeviceStatus::Up,
            });
        } else if let Some(rest) = line.strip_prefix("MAC Address: ") {
            let Some(device) = devices.last_mut() else {
                continue;
            };
            let (mac, vendor) = match rest.split_once(" (") {
                Some((mac, vendor)) => (mac, Some(vendor.trim_end_matches(')'))),
                None => (rest, None),
            };
            device.mac = Some(mac.trim().to_uppercase());
            device.vendor = vendor
                .filter(|v| !v.is_empty() && *v != "Unknown")
                .map(str::to_string);
        }
    }

    devices
}
