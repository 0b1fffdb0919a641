use std::time::{Duration, Instant};

#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub phase: String,
    pub phase_time: Duration,
    pub total_time: Duration,
    pub memory_usage_mb: Option<u64>,
    pub cpu_usage: Option<f32>,
}

/// 記錄更新流程各階段 (下載、備份、暫存、合併) 的耗時與資源使用
pub struct SystemMonitor {
    enabled: bool,
    start_time: Instant,
    last_phase: Instant,
    peak_memory_mb: u64,
    #[cfg(feature = "cli")]
    system: Option<(System, Pid)>,
}

impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        #[cfg(feature = "cli")]
        let system = if enabled {
            sysinfo::get_current_pid()
                .ok()
                .map(|pid| (System::new(), pid))
        } else {
            None
        };

        Self {
            enabled,
            start_time: Instant::now(),
            last_phase: Instant::now(),
            peak_memory_mb: 0,
            #[cfg(feature = "cli")]
            system,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 結束一個階段並回傳統計；停用時回傳 `None`
    pub fn finish_phase(&mut self, phase: &str) -> Option<PhaseStats> {
        if !self.enabled {
            return None;
        }

        let now = Instant::now();
        let phase_time = now.duration_since(self.last_phase);
        self.last_phase = now;

        let (memory_usage_mb, cpu_usage) = self.sample();
        if let Some(memory) = memory_usage_mb {
            self.peak_memory_mb = self.peak_memory_mb.max(memory);
        }

        Some(PhaseStats {
            phase: phase.to_string(),
            phase_time,
            total_time: now.duration_since(self.start_time),
            memory_usage_mb,
            cpu_usage,
        })
    }

    #[cfg(feature = "cli")]
    fn sample(&mut self) -> (Option<u64>, Option<f32>) {
        let Some((system, pid)) = self.system.as_mut() else {
            return (None, None);
        };
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[*pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );
        match system.process(*pid) {
            Some(process) => (
                Some(process.memory() / 1024 / 1024),
                Some(process.cpu_usage()),
            ),
            None => (None, None),
        }
    }

    #[cfg(not(feature = "cli"))]
    fn sample(&mut self) -> (Option<u64>, Option<f32>) {
        (None, None)
    }

    pub fn log_phase(&mut self, phase: &str) {
        if let Some(stats) = self.finish_phase(phase) {
            match (stats.memory_usage_mb, stats.cpu_usage) {
                (Some(memory), Some(cpu)) => tracing::info!(
                    "📊 {} - took {:?}, CPU: {:.1}%, Memory: {}MB",
                    stats.phase,
                    stats.phase_time,
                    cpu,
                    memory
                ),
                _ => tracing::info!("📊 {} - took {:?}", stats.phase, stats.phase_time),
            }
        }
    }

    pub fn log_final_stats(&self) {
        if self.enabled {
            tracing::info!(
                "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB",
                self.start_time.elapsed(),
                self.peak_memory_mb
            );
        }
    }
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}
