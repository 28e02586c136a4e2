use crate::error::{MonitorError, Result};
use nix::sys::signal::{self, Signal};
use nix::unistd::{Pid as NixPid, Uid, User};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use sysinfo::{MemoryRefreshKind, Process, ProcessRefreshKind, RefreshKind, System};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub user: String,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub command: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Cpu,
    Mem,
}

impl SortKey {
    /// Unknown keys sort by CPU.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "mem" | "memory" => SortKey::Mem,
            _ => SortKey::Cpu,
        }
    }
}

/// On-demand view of the process table.
///
/// Keeps one sysinfo handle so per-process CPU usage is measured between
/// successive calls.
pub struct ProcessLister {
    system: Mutex<System>,
}

impl ProcessLister {
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MAX_LIMIT: usize = 1000;

    /// Reads the process table once so the first listing already has a
    /// CPU baseline to measure against.
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_with_specifics(process_refresh())),
        }
    }

    pub fn list(&self, sort: SortKey, limit: usize) -> Vec<ProcessInfo> {
        let mut system = self.system.lock();
        system.refresh_specifics(process_refresh());

        let total_memory = system.total_memory();
        // sysinfo lists threads alongside processes on Linux
        let processes: Vec<ProcessInfo> = system
            .processes()
            .iter()
            .filter(|(_, process)| process.thread_kind().is_none())
            .map(|(pid, process)| to_info(pid.as_u32(), process, total_memory))
            .collect();
        drop(system);

        sort_and_truncate(processes, sort, limit.min(Self::MAX_LIMIT))
    }

    /// Asks a process to terminate. Failures are logged and reported as
    /// `false`.
    pub fn kill(&self, pid: u32) -> bool {
        match terminate(pid) {
            Ok(()) => {
                info!("sent SIGTERM to process {}", pid);
                true
            }
            Err(e) => {
                warn!("kill {} failed: {}", pid, e);
                false
            }
        }
    }
}

impl Default for ProcessLister {
    fn default() -> Self {
        Self::new()
    }
}

fn process_refresh() -> RefreshKind {
    RefreshKind::new()
        .with_processes(ProcessRefreshKind::everything())
        .with_memory(MemoryRefreshKind::everything())
}

fn terminate(pid: u32) -> Result<()> {
    let raw = i32::try_from(pid).map_err(|_| MonitorError::InvalidPid(pid))?;
    if raw <= 0 {
        return Err(MonitorError::InvalidPid(pid));
    }
    signal::kill(NixPid::from_raw(raw), Signal::SIGTERM)
        .map_err(|source| MonitorError::Signal { pid, source })
}

fn to_info(pid: u32, process: &Process, total_memory: u64) -> ProcessInfo {
    let command = process
        .cmd()
        .iter()
        .map(|s| s.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let command = if command.trim().is_empty() {
        process.name().to_string_lossy().to_string()
    } else {
        command
    };

    let mem_percent = if total_memory == 0 {
        0.0
    } else {
        process.memory() as f64 / total_memory as f64 * 100.0
    };

    ProcessInfo {
        pid,
        user: process
            .user_id()
            .map(|uid| username(**uid))
            .unwrap_or_else(|| "unknown".to_string()),
        cpu_percent: crate::metrics::round1(process.cpu_usage() as f64),
        mem_percent: crate::metrics::round1(mem_percent),
        command,
    }
}

fn username(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        _ => format!("uid:{}", uid),
    }
}

/// Sorts descending by `sort`, ties broken by pid, and keeps `limit`
/// entries.
pub fn sort_and_truncate(mut processes: Vec<ProcessInfo>, sort: SortKey, limit: usize) -> Vec<ProcessInfo> {
    let key = |p: &ProcessInfo| match sort {
        SortKey::Cpu => p.cpu_percent,
        SortKey::Mem => p.mem_percent,
    };
    processes.sort_by(|a, b| {
        key(b)
            .partial_cmp(&key(a))
            .unwrap_or(Ordering::Equal)
            .then(a.pid.cmp(&b.pid))
    });
    processes.truncate(limit);
    processes
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::gettid;
    use std::sync::{mpsc, Arc, Barrier};

    fn proc_info(pid: u32, cpu: f64, mem: f64) -> ProcessInfo {
        ProcessInfo {
            pid,
            user: "root".to_string(),
            cpu_percent: cpu,
            mem_percent: mem,
            command: format!("cmd-{}", pid),
        }
    }

    #[test]
    fn sorts_by_requested_key_descending() {
        let processes = vec![proc_info(1, 5.0, 50.0), proc_info(2, 90.0, 1.0), proc_info(3, 20.0, 10.0)];

        let by_cpu: Vec<u32> = sort_and_truncate(processes.clone(), SortKey::Cpu, 10)
            .iter()
            .map(|p| p.pid)
            .collect();
        assert_eq!(by_cpu, vec![2, 3, 1]);

        let by_mem: Vec<u32> = sort_and_truncate(processes, SortKey::Mem, 2)
            .iter()
            .map(|p| p.pid)
            .collect();
        assert_eq!(by_mem, vec![1, 3]);
    }

    #[test]
    fn sort_key_parsing_defaults_to_cpu() {
        assert_eq!(SortKey::parse("mem"), SortKey::Mem);
        assert_eq!(SortKey::parse("MEM"), SortKey::Mem);
        assert_eq!(SortKey::parse("cpu"), SortKey::Cpu);
        assert_eq!(SortKey::parse("bogus"), SortKey::Cpu);
    }

    #[test]
    fn lists_live_processes_within_limit() {
        let lister = ProcessLister::new();
        let processes = lister.list(SortKey::Mem, 5);
        assert!(!processes.is_empty());
        assert!(processes.len() <= 5);
        assert!(processes.windows(2).all(|w| w[0].mem_percent >= w[1].mem_percent));

        let own_pid = std::process::id();
        let all = lister.list(SortKey::Cpu, ProcessLister::MAX_LIMIT);
        assert!(all.iter().any(|p| p.pid == own_pid) || all.len() == ProcessLister::MAX_LIMIT);
    }

    #[test]
    fn threads_are_not_listed_as_processes() {
        let (tid_tx, tid_rx) = mpsc::channel();
        let release = Arc::new(Barrier::new(9));
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let tid_tx = tid_tx.clone();
                let release = Arc::clone(&release);
                std::thread::spawn(move || {
                    tid_tx.send(gettid().as_raw() as u32).unwrap();
                    release.wait();
                })
            })
            .collect();
        let tids: Vec<u32> = (0..8).map(|_| tid_rx.recv().unwrap()).collect();

        let listed = ProcessLister::new().list(SortKey::Cpu, ProcessLister::MAX_LIMIT);
        release.wait();
        for worker in workers {
            worker.join().unwrap();
        }

        let own_pid = std::process::id();
        assert_eq!(listed.iter().filter(|p| p.pid == own_pid).count(), 1);
        assert!(listed.iter().all(|p| !tids.contains(&p.pid)));
    }

    #[test]
    fn new_lister_starts_with_a_process_baseline() {
        let lister = ProcessLister::new();
        assert!(lister
            .system
            .lock()
            .processes()
            .contains_key(&sysinfo::Pid::from_u32(std::process::id())));
    }

    #[test]
    fn kill_rejects_invalid_pids() {
        let lister = ProcessLister::new();
        assert!(!lister.kill(0));
        assert!(!lister.kill(u32::MAX));
        // far above pid_max, no such process
        assert!(!lister.kill(i32::MAX as u32));
    }
}
