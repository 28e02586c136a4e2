use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to read {what}: {reason}")]
    Probe { what: &'static str, reason: String },

    #[error("network discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    #[error("network discovery failed: {0}")]
    Discovery(String),

    #[error("invalid pid {0}")]
    InvalidPid(u32),

    #[error("failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: nix::errno::Errno,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MonitorError {
    pub fn probe(what: &'static str, reason: impl ToString) -> Self {
        MonitorError::Probe {
            what,
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
