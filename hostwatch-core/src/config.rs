use crate::alerts::AlertThresholds;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const CONFIG_ENV_VAR: &str = "HOSTWATCH_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostwatchConfig {
    pub server: ServerConfig,
    pub collector: CollectorConfig,
    pub scanner: ScannerConfig,
    pub alerts: AlertConfig,
    pub disks: DiskConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Directory holding the dashboard's static files, served at `/`.
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub interval_secs: u64,
    pub history_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub interval_secs: u64,
    pub warmup_secs: u64,
    pub cache_ttl_secs: u64,
    pub command: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub log_capacity: usize,
    pub recent_limit: usize,
    pub cpu_warning_percent: f64,
    pub disk_critical_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskConfig {
    pub min_volume_bytes: u64,
    pub ignored_fs_types: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            static_dir: None,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3,
            history_capacity: 3600,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            warmup_secs: 5,
            cache_ttl_secs: 5,
            command: "nmap".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            log_capacity: 20,
            recent_limit: 10,
            cpu_warning_percent: 80.0,
            disk_critical_percent: 90.0,
        }
    }
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            min_volume_bytes: 100 * 1024 * 1024,
            ignored_fs_types: ["tmpfs", "devtmpfs", "proc", "sysfs", "squashfs", "devfs", "autofs"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

fn secs(value: u64) -> Duration {
    Duration::from_secs(value.max(1))
}

impl CollectorConfig {
    pub fn interval(&self) -> Duration {
        secs(self.interval_secs)
    }
}

impl ScannerConfig {
    pub fn interval(&self) -> Duration {
        secs(self.interval_secs)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        secs(self.cache_ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }
}

impl AlertConfig {
    pub fn thresholds(&self) -> AlertThresholds {
        AlertThresholds {
            cpu_warning_percent: self.cpu_warning_percent,
            disk_critical_percent: self.disk_critical_percent,
            recent_limit: self.recent_limit,
        }
    }
}

impl HostwatchConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Resolves the configuration: an explicit path must load, a path from
    /// `HOSTWATCH_CONFIG` is used when the file exists, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("loading configuration from {}", path.display());
            return Self::from_file(path);
        }

        match std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from) {
            Some(path) if path.exists() => {
                info!("loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            Some(path) => {
                info!("{} not found, using default configuration", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }
}
