//! 行程資源統計：/diagnostic 回報與爬取流程各階段的日誌。

use serde::Serialize;
use std::time::Instant;

#[cfg(feature = "monitor")]
use std::sync::Mutex;
#[cfg(feature = "monitor")]
use sysinfo::{Pid, ProcessesToUpdate, System};

#[derive(Debug, Clone, Serialize)]
pub struct ProcessStats {
    pub cpu_usage: f32,
    pub memory_mb: u64,
    pub memory_percent: f32,
    pub peak_memory_mb: u64,
    pub total_memory_mb: u64,
    pub uptime_secs: u64,
}

#[cfg(feature = "monitor")]
struct Probe {
    system: System,
    pid: Pid,
    peak_memory_mb: u64,
}

pub struct SystemMonitor {
    started: Instant,
    #[cfg(feature = "monitor")]
    probe: Option<Mutex<Probe>>,
}

impl SystemMonitor {
    /// `enabled = false` 時不取樣，只保留啟動時間
    #[cfg(feature = "monitor")]
    pub fn new(enabled: bool) -> Self {
        let probe = enabled
            .then(|| sysinfo::get_current_pid().ok())
            .flatten()
            .map(|pid| {
                Mutex::new(Probe {
                    system: System::new(),
                    pid,
                    peak_memory_mb: 0,
                })
            });

        Self {
            started: Instant::now(),
            probe,
        }
    }

    #[cfg(not(feature = "monitor"))]
    pub fn new(_enabled: bool) -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    #[cfg(feature = "monitor")]
    pub fn stats(&self) -> Option<ProcessStats> {
        let mut probe = self.probe.as_ref()?.lock().ok()?;
        let pid = probe.pid;
        probe.system.refresh_memory();
        probe
            .system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let (cpu_usage, memory_mb) = {
            let process = probe.system.process(pid)?;
            (process.cpu_usage(), process.memory() / 1024 / 1024)
        };
        let total_memory_mb = probe.system.total_memory() / 1024 / 1024;
        probe.peak_memory_mb = probe.peak_memory_mb.max(memory_mb);

        Some(ProcessStats {
            cpu_usage,
            memory_mb,
            memory_percent: if total_memory_mb > 0 {
                memory_mb as f32 / total_memory_mb as f32 * 100.0
            } else {
                0.0
            },
            peak_memory_mb: probe.peak_memory_mb,
            total_memory_mb,
            uptime_secs: self.uptime_secs(),
        })
    }

    #[cfg(not(feature = "monitor"))]
    pub fn stats(&self) -> Option<ProcessStats> {
        None
    }

    pub fn log_phase(&self, phase: &str) {
        if let Some(stats) = self.stats() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB ({:.1}%), Peak: {}MB",
                phase,
                stats.cpu_usage,
                stats.memory_mb,
                stats.memory_percent,
                stats.peak_memory_mb
            );
        }
    }
}
